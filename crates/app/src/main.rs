//! Clinic session manager - command line entry point
//!
//! Wires the file token store, the identity provider client and the system
//! clock into a `SessionManager`, restores the stored session and runs one
//! command against it.

use std::sync::Arc;

use clinic_session_application::SessionManager;
use clinic_session_infrastructure::{
    FileTokenStore, ReqwestIdentityClient, SessionConfig, SystemClock,
};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: clinic-session <token|status|logout>";

#[derive(Debug, Clone, Copy)]
enum Command {
    /// Print a valid access token, authenticating or refreshing first.
    Token,
    /// Print the restored session's phase and expiry.
    Status,
    /// End the session and clear the store.
    Logout,
}

impl Command {
    fn parse(arg: Option<&str>) -> Option<Self> {
        match arg? {
            "token" => Some(Self::Token),
            "status" => Some(Self::Status),
            "logout" => Some(Self::Logout),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(command) = Command::parse(std::env::args().nth(1).as_deref()) else {
        eprintln!("{USAGE}");
        return Err(USAGE.into());
    };

    let config = SessionConfig::load().await?;
    debug!(?config, "configuration loaded");

    let identity = ReqwestIdentityClient::from_config(&config)?;
    let manager = SessionManager::start(
        Arc::new(FileTokenStore::new(config.storage_dir.clone())),
        Arc::new(identity),
        Arc::new(SystemClock::new()),
        config.settings(),
    )
    .await;
    info!(session = %manager.id(), ?command, "session manager started");

    match command {
        Command::Token => {
            let token = manager.ensure_authenticated().await?;
            println!("{token}");
        }
        Command::Status => {
            println!("phase: {}", manager.phase().label());
            if let Some(window) = manager.expiry() {
                println!("access token expires: {}", window.access_expires_at);
                println!("refresh token expires: {}", window.refresh_expires_at);
            }
            println!("expired: {}", manager.is_token_expired());
        }
        Command::Logout => {
            manager.logout().await;
            println!("logged out");
        }
    }

    Ok(())
}
