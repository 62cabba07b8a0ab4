//! # Community Session
//!
//! Headless session runner: logs in with the identity and token from the
//! environment, keeps the live channel open and logs view changes until
//! interrupted.

use anyhow::{Context, Result};
use tracing::info;

use community_session::config::Settings;
use community_session::domain::entities::{Credential, Identity, Privilege};
use community_session::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    community_session::telemetry::init_tracing(&settings.environment);

    info!(
        api = %settings.api.base_url,
        channel = %settings.connection.url,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let user_id: i64 = std::env::var("SESSION_USER_ID")
        .context("SESSION_USER_ID is not set")?
        .parse()
        .context("SESSION_USER_ID must be an integer")?;
    let username = std::env::var("SESSION_USERNAME").unwrap_or_else(|_| format!("user-{user_id}"));
    let privilege = std::env::var("SESSION_PRIVILEGE")
        .map(|p| Privilege::from_str(&p))
        .unwrap_or_default();
    let token = std::env::var("SESSION_TOKEN").context("SESSION_TOKEN is not set")?;

    let mut application = Application::build(settings, Credential::new(token))?;
    let handle = application
        .login(Identity::new(user_id, username, privilege))
        .await?;

    let mut view = handle.watch();
    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = view.borrow_and_update().clone();
                info!(
                    status = %snapshot.connection.status,
                    online = snapshot.online.len(),
                    rooms = snapshot.rooms.len(),
                    unread = snapshot.unread,
                    posts = snapshot.feed.posts.len(),
                    "Session view updated"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        }
    }

    application.logout().await;
    info!("Session closed");
    Ok(())
}
