//! `beacon send event`: read the event file, fetch credentials, submit, optionally follow.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::console::{Console, LogLevel};
use crate::credentials::CredentialProvider;
use crate::error::{Result, SendEventError};
use crate::payload::EventPayload;
use crate::relay::Relay;
use crate::submit::{event_url, EventSubmitter};

/// Printed instead of sending when mocking is on.
pub const MOCKING_NOTICE: &str = "Skipping send-event due to mocking flag set to true";

#[derive(Debug, Clone)]
pub struct SendEventOptions {
    /// Path to the JSON event document.
    pub file: PathBuf,
    /// Follow the event's log stream after a successful submission.
    pub open_web_socket: bool,
    /// Dry run: everything up to the network call, then stop.
    pub mocking: bool,
}

/// Runs the command.
///
/// Order: the payload is read and validated first, then credentials are fetched; both happen
/// before any network activity. The payload is read once and the same bytes are signed and sent.
pub async fn send_event(
    opts: &SendEventOptions,
    provider: &dyn CredentialProvider,
    submitter: &EventSubmitter,
    relay: &dyn Relay,
    console: &mut Console,
    cancel: CancellationToken,
) -> Result<()> {
    let payload = EventPayload::from_file(&opts.file)?;
    let credentials = provider.credentials().await.map_err(SendEventError::auth)?;

    console.print_log("Starting to send an event", LogLevel::Info)?;
    let url = event_url(&credentials.endpoint);
    console.print_log(&format!("Connecting to server {}", url), LogLevel::Verbose)?;

    if opts.mocking {
        console.println(MOCKING_NOTICE)?;
        return Ok(());
    }

    submitter
        .submit(&payload, &credentials, opts.open_web_socket, relay, console, cancel)
        .await
}
