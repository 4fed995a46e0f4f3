//! Beacon CLI binary.
//!
//! `beacon send event --file=./event.json [--open-web-socket]` signs the file's bytes with the
//! API token, posts them to `<endpoint>/v1/event`, and with `--open-web-socket` follows the
//! event's log stream until it ends or Ctrl-C.

mod logging;

use clap::{ArgAction, Parser, Subcommand};
use cli::{
    send_event, Console, EnvCredentialProvider, EventSubmitter, LogLevel, SendEventOptions,
    StreamRelay, SubmitConfig,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

const APP_NAME: &str = "beacon";
const MOCKING_ENV: &str = "BEACON_MOCKING";

#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(about = "Beacon: send events to the beacon API and follow their logs")]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Verbose output (e.g. the target URL); repeat (-vv) to also show debug log events
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only print errors and streamed output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Dry run: do everything except the network call (also BEACON_MOCKING=true)
    #[arg(long, global = true)]
    mock: bool,
}

impl Args {
    fn verbosity(&self) -> LogLevel {
        if self.quiet {
            return LogLevel::Quiet;
        }
        match self.verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Verbose,
            _ => LogLevel::Debug,
        }
    }

    fn mocking(&self) -> bool {
        self.mock || config::env_flag(MOCKING_ENV).unwrap_or(false)
    }
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Send something to the beacon API
    Send(SendArgs),
}

#[derive(clap::Args, Debug, Clone)]
struct SendArgs {
    /// Open a web socket to receive follow-up messages (applies to every send subcommand)
    #[arg(short = 'w', long, global = true)]
    open_web_socket: bool,

    #[command(subcommand)]
    sub: SendCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum SendCommand {
    /// Send an arbitrary event defined in a JSON file.
    ///
    /// Example: beacon send event --file=./new_artifact_event.json --open-web-socket
    Event(EventArgs),
}

#[derive(clap::Args, Debug, Clone)]
struct EventArgs {
    /// The file containing the event as JSON
    #[arg(short, long, value_name = "FILEPATH")]
    file: PathBuf,
}

/// Cancels `token` on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    tracing::warn!("failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("received Ctrl-C"),
            _ = terminate => tracing::info!("received SIGTERM"),
        }
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = config::load_and_apply(APP_NAME, None::<&std::path::Path>) {
        eprintln!("{}: config: {}", APP_NAME, e);
    }
    logging::init()?;

    let args = Args::parse();
    let mut console = Console::stdout(args.verbosity());
    let mocking = args.mocking();

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let Command::Send(send) = &args.cmd;
    let result = match &send.sub {
        SendCommand::Event(ev) => {
            let opts = SendEventOptions {
                file: ev.file.clone(),
                open_web_socket: send.open_web_socket,
                mocking,
            };
            let submit_config = SubmitConfig::from_env();
            tracing::debug!(?submit_config, mocking, "send event");
            match EventSubmitter::new(submit_config.clone()) {
                Ok(submitter) => {
                    let relay = StreamRelay::new(&submit_config);
                    send_event(
                        &opts,
                        &EnvCredentialProvider::default(),
                        &submitter,
                        &relay,
                        &mut console,
                        cancel,
                    )
                    .await
                }
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        tracing::error!(preflight = e.is_preflight(), "send event failed: {}", e);
        eprintln!("{}: {}", APP_NAME, e);
        if e.is_preflight() {
            eprintln!("{}: nothing was sent", APP_NAME);
        }
        std::process::exit(1);
    }
    Ok(())
}
