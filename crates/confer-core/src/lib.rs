pub mod config;
pub mod error;
pub mod types;

pub use config::ConferConfig;
pub use error::{ConferError, Result};
pub use types::*;
