//! CLI argument definitions for the Confer binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Confer — chat sessions with guided prompt cards, local or signed in.
#[derive(Parser, Debug)]
#[command(name = "confer", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for SQLite and the local key/value files.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Run as this signed-in user instead of the anonymous device.
    #[arg(short = 'u', long = "user")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List sessions of the active backend, newest first.
    Sessions,
    /// Create a session.
    New {
        /// Session title.
        title: String,
        /// Prompt card for the session, by theme id (see `confer cards`).
        #[arg(short = 't', long = "theme")]
        theme: Option<String>,
    },
    /// Send a message to a session and print the assistant reply.
    Send {
        /// Target session id.
        session_id: String,
        /// Message text.
        text: String,
    },
    /// Delete a session and its messages.
    Delete {
        /// Target session id.
        session_id: String,
    },
    /// Rename a session.
    Rename {
        /// Target session id.
        session_id: String,
        /// New title.
        title: String,
    },
    /// Move this device's local sessions to the signed-in account.
    Migrate,
    /// Show today's remaining anonymous interactions.
    Quota,
    /// List the built-in prompt cards.
    Cards,
    /// Write a default config file.
    Init,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CONFER_CONFIG env var > platform default (~/.confer/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CONFER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the signed-in user for this invocation.
    ///
    /// Priority: --user flag > CONFER_USER env var.
    /// Returns `None` when the command runs anonymously.
    pub fn resolve_user(&self) -> Option<String> {
        if let Some(ref u) = self.user {
            return Some(u.clone());
        }
        std::env::var("CONFER_USER").ok()
    }

    /// Resolve the data directory path.
    ///
    /// Priority: --data-dir flag > config file value.
    /// Returns `None` if not overridden (use config default).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    /// Returns `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".confer").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".confer").join("config.toml");
    }
    PathBuf::from("config.toml")
}
