//! Confer application binary - composition root.
//!
//! Ties together all Confer crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Initialize storage (SQLite + file-backed key/value store)
//! 3. Resolve the auth state for this invocation (signed in or anonymous)
//! 4. Dispatch one subcommand through the session manager

mod cli;

use std::sync::Arc;

use clap::Parser;

use confer_core::config::ConferConfig;
use confer_prompt::{find_card, BUILTIN_CARDS};
use confer_session::{AuthHandle, CannedAssistant, InteractionQuota, SessionError, SessionManager};
use confer_store::{
    kv, Database, KeyValueStore, LocalSessionStore, SessionStore, SqliteSessionStore, DB_FILE,
};

use cli::{CliArgs, Command};

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> std::path::PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        std::path::PathBuf::from(home).join(&data_dir[2..])
    } else {
        std::path::PathBuf::from(data_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config loads before tracing so the filter default can honor
    // [general].log_level; log lines emitted during the load are dropped.
    let config_file = args.resolve_config_path();
    let config = ConferConfig::load_or_default(&config_file);

    // Tracing.
    let filter = match args.resolve_log_level() {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(config.general.log_level.as_str())
        }),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Confer v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = args
        .resolve_data_dir()
        .unwrap_or_else(|| config.general.data_dir.clone());
    let data_dir = resolve_data_dir(&data_dir);

    // Database::open creates the data directory; the KV store creates it on
    // first write.
    let db = Arc::new(Database::open(&data_dir)?);

    let kv: Arc<dyn KeyValueStore> = Arc::new(kv::open_default(&data_dir));

    // Auth state for one CLI invocation is settled up front: a --user flag
    // or CONFER_USER signs in, anything else stays anonymous.
    let user = args.resolve_user();
    let auth = AuthHandle::new();
    match &user {
        Some(user_id) => auth.sign_in(user_id.clone()),
        None => auth.resolve_anonymous(),
    }

    let local = Arc::new(LocalSessionStore::new(Arc::clone(&kv)));
    let remote: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(Arc::clone(&db)));
    let quota = InteractionQuota::new(Arc::clone(&kv), config.quota.daily_limit);
    let daily_limit = quota.daily_limit();

    let manager = SessionManager::new(
        local,
        remote,
        auth.subscribe(),
        quota,
        Arc::new(CannedAssistant),
        config.profile.clone(),
    );

    match args.command {
        Command::Sessions => {
            let list = manager.list_sessions().await?;
            if !list.ready {
                println!("Auth state is still resolving; try again.");
            } else if list.sessions.is_empty() {
                println!("No sessions.");
            } else {
                for session in &list.sessions {
                    println!(
                        "{}  {}  {:<14}  {}",
                        session.id,
                        session.created_at.format("%Y-%m-%d %H:%M"),
                        session.theme_id.as_deref().unwrap_or("-"),
                        session.title
                    );
                }
            }
        }
        Command::New { title, theme } => {
            let theme_id = theme.unwrap_or_else(|| config.chat.default_theme_id.clone());
            let Some(card) = find_card(&theme_id) else {
                eprintln!(
                    "Unknown theme '{}'. Run `confer cards` to see the list.",
                    theme_id
                );
                std::process::exit(2);
            };
            let session = manager.create_session(&title, card.meta()).await?;
            println!("Created session {}  \"{}\"", session.id, session.title);
        }
        Command::Send { session_id, text } => {
            let reply = manager.send_message(&session_id, &text).await?;
            println!("{}", reply.content);
        }
        Command::Delete { session_id } => {
            manager.delete_session(&session_id).await?;
            println!("Deleted {}", session_id);
        }
        Command::Rename { session_id, title } => {
            manager.rename_session(&session_id, &title).await?;
            println!("Renamed {}", session_id);
        }
        Command::Migrate => match manager.migrate_local_sessions().await {
            Ok(report) => {
                println!(
                    "Migrated {} session(s); nothing left on this device.",
                    report.migrated
                );
            }
            Err(SessionError::MigrationIncomplete(report)) => {
                println!(
                    "Migration stopped after {} of {} session(s); {} still on this device.",
                    report.migrated,
                    report.migrated + report.remaining,
                    report.remaining
                );
                if let Some(id) = report.failed_session {
                    println!("Failed at session {}. Run `confer migrate` again to retry.", id);
                }
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        },
        Command::Quota => {
            if auth.current().is_authenticated() {
                println!("Signed in: no daily interaction limit.");
            } else {
                println!(
                    "{} of {} anonymous interactions left today.",
                    manager.quota_remaining().await,
                    daily_limit
                );
            }
        }
        Command::Cards => {
            for card in BUILTIN_CARDS {
                println!("{:<16} {:<24} {}", card.theme_id, card.card_title, card.theme);
            }
        }
        Command::Init => {
            if config_file.exists() {
                println!("Config already exists at {}", config_file.display());
            } else {
                config.save(&config_file)?;
                println!("Wrote default config to {}", config_file.display());
            }
            println!("Session database at {}", data_dir.join(DB_FILE).display());
        }
    }

    Ok(())
}
