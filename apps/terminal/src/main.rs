use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{
    connect_websocket_session, load_settings, SessionError, SessionEvent, SessionStatus,
};
use shared::domain::Username;
use std::time::Duration;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing_subscriber::EnvFilter;

mod input;
mod render;

use input::submit_line;
use render::Renderer;

#[derive(Parser, Debug)]
struct Args {
    /// Overrides `server_url` from client.toml / environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    username: String,
    /// Clears a remote typing indicator locally after this many ms without
    /// a refresh.
    #[arg(long)]
    typing_expiry_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let username = Username::parse(&args.username)
        .map_err(SessionError::from)
        .context("invalid --username")?;
    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(ms) = args.typing_expiry_ms {
        settings.typing_expiry = (ms > 0).then(|| Duration::from_millis(ms));
    }

    let (handle, task) = connect_websocket_session(&settings)
        .with_context(|| format!("cannot use server url {}", settings.server_url))?;
    let mut events = handle.subscribe();
    handle.connect().await?;
    println!("Connecting to {} ... type /leave to quit.", settings.server_url);

    let mut renderer = Renderer::default();
    let mut join_sent = false;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let outcome: Result<()> = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::Changed(snapshot)) => {
                    for line in renderer.render(&snapshot) {
                        println!("{line}");
                    }
                    if snapshot.status == SessionStatus::Connected && !join_sent {
                        join_sent = true;
                        if let Err(err) = handle.join(username.as_str()).await {
                            break Err(err.into());
                        }
                    }
                }
                Ok(SessionEvent::Error(err)) => {
                    println!("! {err}");
                    match err {
                        SessionError::Rejected(_) | SessionError::Transport(_) => {
                            break Err(err.into())
                        }
                        SessionError::Disconnected => break Ok(()),
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "terminal fell behind session events");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break Ok(());
                };
                match line.trim() {
                    "/leave" | "/quit" => break Ok(()),
                    "" => {}
                    text => match submit_line(&handle, text).await {
                        Ok(()) => {}
                        Err(err) if err.is_local() => println!("! {err}"),
                        Err(err) => break Err(err.into()),
                    },
                }
            }
        }
    };

    handle.shutdown().await.ok();
    task.await.context("session task panicked")?;
    if let Err(err) = &outcome {
        bail!("{err:#}");
    }
    Ok(())
}
