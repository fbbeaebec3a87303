//! Application-scoped authentication state.
//!
//! The portal keeps the signed-in session in one explicit container instead
//! of a hidden global: the shell constructs an [`AuthStore`] at startup,
//! hands references to whatever needs identity (route guards, the gateway
//! client), and funnels every mutation through [`set_auth`](AuthStore::set_auth)
//! and [`logout`](AuthStore::logout). Consumers observe changes through a
//! `watch` subscription rather than reading ad hoc global state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{debug, info};

/// A signed-in user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    /// Backend user identifier.
    pub user_id: String,
    /// Bearer token for backend calls.
    pub access_token: String,
    /// When the session was established.
    pub signed_in_at: DateTime<Utc>,
}

/// Single source of truth for the current session.
///
/// Hydrated from disk at construction; persisted on every mutation. Like the
/// progress store, persistence is best-effort: a missing or corrupt session
/// file hydrates as logged-out and write failures are swallowed.
pub struct AuthStore {
    path: PathBuf,
    state_tx: watch::Sender<Option<AuthSession>>,
}

impl AuthStore {
    /// Hydrate the store from the session file under `data_dir`.
    #[must_use]
    pub fn hydrate(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            debug!("Could not create data directory {}: {e}", data_dir.display());
        }
        let path = data_dir.join("session.json");
        let state = std::fs::read(&path)
            .ok()
            .and_then(|content| match serde_json::from_slice(&content) {
                Ok(session) => Some(session),
                Err(e) => {
                    debug!("Corrupt session file, hydrating as logged out: {e}");
                    None
                }
            });

        if state.is_some() {
            info!("Hydrated persisted session");
        }

        let (state_tx, _) = watch::channel(state);
        Self { path, state_tx }
    }

    /// Current session, if signed in.
    #[must_use]
    pub fn session(&self) -> Option<AuthSession> {
        self.state_tx.borrow().clone()
    }

    /// Whether a user is signed in. Route guards branch on this.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state_tx.borrow().is_some()
    }

    /// Observe session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.state_tx.subscribe()
    }

    /// Establish a session (login or token refresh).
    pub fn set_auth(&self, session: AuthSession) {
        self.persist(Some(&session));
        let _ = self.state_tx.send(Some(session));
    }

    /// Clear the session and its persisted copy.
    pub fn logout(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Could not remove session file: {e}");
        }
        let _ = self.state_tx.send(None);
    }

    fn persist(&self, session: Option<&AuthSession>) {
        let Some(session) = session else { return };
        match serde_json::to_vec(session) {
            Ok(payload) => {
                if let Err(e) = std::fs::write(&self.path, payload) {
                    debug!("Could not persist session: {e}");
                }
            }
            Err(e) => debug!("Could not serialize session: {e}"),
        }
    }
}
