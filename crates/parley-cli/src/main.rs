//! Parley terminal chat client.
//!
//! Registers a display name with the hub, joins the chat over WebSocket and
//! relays stdin lines as messages until `/quit`, end of input or Ctrl-C.

#![deny(unsafe_code)]

mod console;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parley_client::{Notice, RenderingSink, SessionController, SessionEvent};
use parley_core::ReconnectPolicy;
use parley_logging::LogFormat;
use parley_settings::ClientSettings;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info};

use console::ConsoleSink;

/// Shown when the name prompt gets a blank answer.
const EMPTY_FIELD: &str = "This field cannot be empty";

/// Parley chat client.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "Terminal client for a Parley chat hub")]
struct Cli {
    /// Hub base URL for registration (default `http://localhost:3000`).
    #[arg(long)]
    server: Option<String>,

    /// WebSocket URL; derived from `--server` when omitted.
    #[arg(long)]
    ws_url: Option<String>,

    /// Display name; skips the prompt.
    #[arg(long)]
    name: Option<String>,

    /// Log level or `RUST_LOG`-style filter.
    #[arg(long)]
    log_level: Option<String>,

    /// Settings file (default `~/.parley/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    /// Load layered settings and apply flag overrides on top.
    fn load_settings(&self) -> Result<ClientSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(parley_settings::settings_path);
        let mut settings = parley_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply_overrides(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    fn apply_overrides(&self, settings: &mut ClientSettings) {
        if let Some(server) = &self.server {
            settings.hub.http_url.clone_from(server);
            settings.hub.ws_url = None;
        }
        if let Some(ws_url) = &self.ws_url {
            settings.hub.ws_url = Some(ws_url.clone());
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

/// A line typed in the chat loop.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Connect,
    Message(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim() {
            "/quit" => Self::Quit,
            "/connect" => Self::Connect,
            _ => Self::Message(line),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    parley_logging::init_subscriber(
        &settings.logging.level,
        LogFormat::from_flag(settings.logging.json),
    );
    info!(
        hub = %settings.hub.http_url,
        ws = %settings.hub.websocket_url(),
        "starting parley"
    );

    let sink = Arc::new(ConsoleSink::stdout());
    let mut session = SessionController::from_settings(&settings, sink.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if !register(&mut session, &mut lines, args.name.clone()).await? {
        session.teardown();
        return Ok(());
    }
    session
        .reconnect(&settings.reconnect)
        .await
        .context("Failed to connect to hub")?;
    println!("joined the chat, /quit to leave");

    chat(&mut session, &mut lines, sink.as_ref(), &settings.reconnect).await
}

/// Prompt until a non-blank name is entered and return it trimmed.
/// `None` on end of input.
async fn read_name<R>(lines: &mut Lines<R>, out: &mut impl Write) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        write!(out, "Display name: ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            return Ok(None);
        };
        let name = line.trim();
        if name.is_empty() {
            writeln!(out, "{EMPTY_FIELD}")?;
            continue;
        }
        return Ok(Some(name.to_string()));
    }
}

/// `name` without surrounding whitespace, `None` when nothing is left.
fn trimmed_name(name: &str) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Register, re-prompting after each rejection. `false` if input ended first.
async fn register<R>(
    session: &mut SessionController,
    lines: &mut Lines<R>,
    mut preset: Option<String>,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let name = match preset.take().and_then(|n| trimmed_name(&n)) {
            Some(name) => name,
            None => match read_name(lines, &mut std::io::stdout()).await? {
                Some(name) => name,
                None => return Ok(false),
            },
        };
        match session.register(&name).await {
            Ok(identity) => {
                info!(user_id = %identity.id, name = %identity.display_name, "registered");
                return Ok(true);
            }
            // the sink has already shown the reason
            Err(error) => debug!(%error, "registration failed"),
        }
    }
}

async fn chat<R>(
    session: &mut SessionController,
    lines: &mut Lines<R>,
    sink: &dyn RenderingSink,
    policy: &ReconnectPolicy,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    session.teardown();
                    return Ok(());
                };
                match Input::parse(&line) {
                    Input::Quit => {
                        session.teardown();
                        return Ok(());
                    }
                    Input::Connect => {
                        if let Err(error) = session.reconnect(policy).await {
                            sink.show_notice(&Notice::TransportError(error.to_string()));
                        }
                    }
                    Input::Message(body) => {
                        if let Err(error) = session.send_message(body) {
                            debug!(%error, "message not sent");
                        }
                    }
                }
            }
            event = session.next_event() => match event {
                None => return Ok(()),
                Some(SessionEvent::Disconnected(close)) => {
                    info!(local = close.initiated_locally, code = ?close.code, "disconnected");
                    if !close.initiated_locally {
                        println!("type /connect to rejoin");
                    }
                }
                Some(event) => debug!(?event, "session event"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                session.teardown();
                return Ok(());
            }
        }
    }
}
