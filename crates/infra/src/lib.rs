//! Infrastructure layer: hosted backend adapters, permission resolution and
//! role settings.

pub mod backend;
pub mod resolver;
pub mod role_settings;

pub use backend::{AuthEvent, Backend, BackendError, InMemoryBackend};
pub use resolver::PermissionResolver;
pub use role_settings::{RoleSettings, SettingsError};
