//! Companion mirror running as a second process.
//!
//! The mirror reads the context file the primary keeps current and stores
//! what it accepted next to it, so the watermark survives between runs.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use clap::{Subcommand, ValueEnum};
use urge_core::{Config, FileTransport, PeerMirror, RemoteAction};

use super::{companion_dir, open_service, print_json, CliResult};

const MIRROR_FILE: &str = "mirror.json";

#[derive(Subcommand)]
pub enum PeerAction {
    /// Pull the latest context and show it
    Show,
    /// Send an action to the primary
    Send {
        #[arg(value_enum)]
        action: PeerCommand,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PeerCommand {
    TakeOne,
    UsePanic,
    RequestUpdate,
}

impl From<PeerCommand> for RemoteAction {
    fn from(command: PeerCommand) -> Self {
        match command {
            PeerCommand::TakeOne => RemoteAction::TakeOne,
            PeerCommand::UsePanic => RemoteAction::UsePanic,
            PeerCommand::RequestUpdate => RemoteAction::RequestSnapshot,
        }
    }
}

fn mirror_path() -> Result<PathBuf, std::io::Error> {
    Ok(companion_dir()?.join(MIRROR_FILE))
}

fn load_mirror() -> Result<PeerMirror, Box<dyn std::error::Error>> {
    let path = mirror_path()?;
    if !path.exists() {
        return Ok(PeerMirror::new());
    }
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

fn save_mirror(mirror: &PeerMirror) -> CliResult {
    let path = mirror_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(mirror)?)?;
    Ok(())
}

/// Accept whatever the primary last published.
fn pull(mirror: &mut PeerMirror) -> CliResult {
    let transport = FileTransport::new(companion_dir()?);
    if let Some(payload) = transport.read_context()? {
        mirror.accept(payload);
    }
    Ok(())
}

fn print_mirror(mirror: &PeerMirror) -> CliResult {
    let now = Utc::now();
    print_json(&serde_json::json!({
        "substance": mirror.substance_label(),
        "remaining_secs": mirror.remaining_secs(now),
        "ready": mirror.is_ready(now),
        "daily_remaining": mirror.daily_remaining(),
        "panic_remaining": mirror.panic_remaining(),
        "watermark": mirror.watermark(),
    }))
}

pub fn run(action: PeerAction) -> CliResult {
    let mut mirror = load_mirror()?;
    pull(&mut mirror)?;

    match action {
        PeerAction::Show => {
            save_mirror(&mirror)?;
            print_mirror(&mirror)
        }
        PeerAction::Send { action } => {
            let request = mirror.request_for(action.into());

            // Both sides share a machine, so the primary is driven in-process.
            let config = Config::load_or_default();
            let mut service = open_service(&config)?;
            let reply = service.on_remote_message(&request.to_json());
            drop(service);

            pull(&mut mirror)?;
            save_mirror(&mirror)?;
            print_json(&serde_json::json!({
                "request": request,
                "reply": reply,
            }))
        }
    }
}
