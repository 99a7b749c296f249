/// MarketSync headless client - Main entry point
use marketsync_core::api::HttpSnapshotClient;
use marketsync_core::sinks::ConsoleSink;
use marketsync_core::transport::TransportChannel;
use marketsync_core::{Collaborators, Config, Input, PageContext, Session};
use std::env;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_args(&args)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let (replies_tx, replies_rx) = mpsc::unbounded_channel();
    let requests = HttpSnapshotClient::new(&config, replies_tx)
        .map_err(|e| anyhow::anyhow!("HTTP client error: {}", e))?;
    let (acks, channel_events) = TransportChannel::connect(&config);

    let console = ConsoleSink;
    let session = Session::new(
        &config,
        PageContext::from_config(&config),
        Collaborators {
            render: Box::new(console.clone()),
            alerts: Box::new(console.clone()),
            prompt: Box::new(console),
            requests: Box::new(requests),
            acks: Box::new(acks),
        },
    );
    info!("🚀 Starting MarketSync session {}", session.id());
    info!("   Server: {}", config.base_url);
    info!("   User: {}", config.current_user_id);

    let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(inputs_tx));

    tokio::select! {
        _ = session.run(inputs_rx, channel_events, replies_rx) => {}
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Ctrl+C received"),
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    }

    info!("👋 Session closed");
    Ok(())
}

/// Map stdin lines onto session inputs until EOF
async fn read_commands(inputs: mpsc::UnboundedSender<Input>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("stdin closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read command: {}", e);
                break;
            }
        };
        let Some(input) = parse_command(line.trim()) else {
            if !line.trim().is_empty() {
                println!("Commands: #list | #conversation<id> | tray | more | older | notifications | send <text> | delete | finalize | yes | no");
            }
            continue;
        };
        if inputs.send(input).is_err() {
            break;
        }
    }
}

fn parse_command(line: &str) -> Option<Input> {
    if line.starts_with('#') {
        return Some(Input::Navigate(line.to_string()));
    }
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "tray" => Some(Input::ToggleTray),
        "more" => Some(Input::LoadMoreConversations),
        "older" => Some(Input::LoadOlderMessages),
        "notifications" => Some(Input::LoadMoreNotifications),
        "send" => Some(Input::SendMessage(rest.to_string())),
        "delete" => Some(Input::DeleteOffer),
        "finalize" => Some(Input::FinalizeOffer),
        "yes" => Some(Input::Confirm(true)),
        "no" => Some(Input::Confirm(false)),
        _ => None,
    }
}
