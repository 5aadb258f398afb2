//! Persistent bot identity
//!
//! The identity lives in `<state_dir>/identity.json` so the bot keeps the
//! same `bot_key` across restarts. Only `instance_id` changes, and only when
//! explicitly rotated.

use anyhow::{Context, Result};
use fleet_core::domain::bot::BotIdentity;
use std::path::{Path, PathBuf};
use tracing::info;

const IDENTITY_FILE: &str = "identity.json";

fn identity_path(state_dir: &Path) -> PathBuf {
    state_dir.join(IDENTITY_FILE)
}

/// Loads the stored identity, creating and persisting one on first start
pub fn load_or_create(state_dir: &Path) -> Result<BotIdentity> {
    let path = identity_path(state_dir);

    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read identity file {}", path.display()))?;
        let identity: BotIdentity = serde_json::from_str(&content)
            .with_context(|| format!("Invalid identity file {}", path.display()))?;
        return Ok(identity);
    }

    let identity = BotIdentity::generate(hostname(), platform());
    save(state_dir, &identity)?;
    info!(
        "Created new bot identity: bot_key={}, instance_id={}",
        identity.bot_key, identity.instance_id
    );

    Ok(identity)
}

/// Replaces the instance id and persists the result
///
/// `bot_key`, hostname and os are kept as stored.
pub fn rotate_instance_id(state_dir: &Path) -> Result<BotIdentity> {
    let identity = load_or_create(state_dir)?.rotated();
    save(state_dir, &identity)?;
    info!("Rotated instance_id to {}", identity.instance_id);
    Ok(identity)
}

fn save(state_dir: &Path, identity: &BotIdentity) -> Result<()> {
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("Failed to create state dir {}", state_dir.display()))?;

    let path = identity_path(state_dir);
    let content = serde_json::to_string_pretty(identity).context("Failed to encode identity")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write identity file {}", path.display()))
}

fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }

    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}
