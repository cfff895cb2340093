//! Session orchestration for Confer.
//!
//! Observes auth state, routes session operations to the device-local or
//! remote store, enforces the anonymous interaction quota, and migrates
//! local history after sign-in.

pub mod assistant;
pub mod auth;
pub mod error;
pub mod manager;
pub mod quota;

pub use assistant::{Assistant, CannedAssistant};
pub use auth::{AuthHandle, AuthState};
pub use error::SessionError;
pub use manager::SessionManager;
pub use quota::{InteractionQuota, QUOTA_KEY};
