pub mod config;
pub mod error;
pub mod identity;
pub mod session;

pub use crate::config::{HttpConfig, RelayConfig, UpstreamConfig};
pub use error::RelayError;
pub use identity::{anonymous_user_id, resolve_user};
pub use session::{ChatKitClient, SessionBackend, SessionError, DEFAULT_BASE_URL};
