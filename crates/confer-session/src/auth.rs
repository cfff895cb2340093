//! Observable authentication state.
//!
//! The session manager never performs authentication; it only observes the
//! state the auth provider reports. `AuthHandle` is the single writer,
//! created at app start; observers hold `watch::Receiver`s and read the
//! current value whenever they need to route an operation.

use tokio::sync::watch;
use tracing::info;

/// Authentication state as reported by the auth provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    /// The provider has not answered yet.
    Unknown,
    /// No identity; state is device-local and quota-bounded.
    Anonymous,
    /// Signed in with the given user id.
    Authenticated(String),
}

impl AuthState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated(user_id) => Some(user_id),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    /// True once the provider has answered, whether or not a user is signed in.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, AuthState::Unknown)
    }
}

/// Publishes auth transitions to any number of observers.
///
/// Starts in `Unknown` until the provider resolves. There is exactly one
/// handle per process; dropping it ends the channel's lifecycle.
pub struct AuthHandle {
    tx: watch::Sender<AuthState>,
}

impl AuthHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::Unknown);
        Self { tx }
    }

    /// A receiver observing every subsequent transition.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// The provider answered with no signed-in user.
    pub fn resolve_anonymous(&self) {
        info!("Auth resolved: anonymous");
        self.tx.send_replace(AuthState::Anonymous);
    }

    /// The provider reported a signed-in user.
    pub fn sign_in(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        info!(user_id = %user_id, "Auth resolved: signed in");
        self.tx.send_replace(AuthState::Authenticated(user_id));
    }

    /// The user signed out; state returns to anonymous.
    pub fn sign_out(&self) {
        info!("Signed out");
        self.tx.send_replace(AuthState::Anonymous);
    }
}

impl Default for AuthHandle {
    fn default() -> Self {
        Self::new()
    }
}
