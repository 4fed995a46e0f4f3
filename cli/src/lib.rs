//! Beacon CLI library: send a signed event to the beacon API and optionally follow its log
//! stream over a web socket.
//!
//! Used by the `beacon` binary. The pieces, leaves first:
//! - [`EventPayload`]: the event file's bytes, validated as JSON, read once.
//! - [`CredentialProvider`]: endpoint + API token ([`EnvCredentialProvider`] by default).
//! - [`sign`]: `sha1=<hex>` HMAC over the exact body bytes.
//! - [`EventSubmitter`]: one signed `POST /v1/event`, classified into a [`ResponseOutcome`].
//! - [`StreamRelay`]: renders follow-up messages until close, termination, or cancellation.

pub mod console;
pub mod credentials;
pub mod error;
pub mod payload;
pub mod relay;
pub mod send_event;
pub mod signer;
pub mod submit;

pub use console::{Console, LogLevel, SharedBuffer};
pub use credentials::{CredentialProvider, Credentials, EnvCredentialProvider, SecretToken};
pub use error::{CredentialError, PayloadError, SendEventError, SignError, StreamError};
pub use payload::EventPayload;
pub use relay::{Relay, RelayEnd, StreamRelay};
pub use send_event::{send_event, SendEventOptions, MOCKING_NOTICE};
pub use signer::{sign, verify_signature, Signature};
pub use submit::{EventSubmitter, ResponseOutcome, SignedRequest, SubmitConfig};
