//! `transdovic-session` — session lifecycle and the authorization context.
//!
//! The [`AuthorizationContext`] is the composition root of the dashboard's
//! authorization core: it owns the single auth-event subscription, drives the
//! [`SessionMachine`] and publishes [`AuthorizationSnapshot`]s to readers.

pub mod config;
pub mod context;
pub mod gating;
pub mod machine;
pub mod snapshot;

pub use config::{BackendConfig, ConfigError, Credentials};
pub use context::{AuthorizationContext, ContextError};
pub use gating::{NavEntry, Route, RouteAccess, navigation, route_access};
pub use machine::{ChainTag, Effect, SessionMachine, SessionState};
pub use snapshot::AuthorizationSnapshot;
