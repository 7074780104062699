//! Sign-in, role resolution and the session role gate.
//!
//! The role gate in this crate controls what the client shows. It is not an
//! authorization boundary; the document store's access rules are.

pub mod auth;
pub mod context;
pub mod errors;
pub mod gate;
pub mod identity;
pub mod metrics_defs;
pub mod persist;
pub mod resolve;

pub use auth::{AuthError, AuthRecord, AuthService, HttpAuthClient, StaticAuth};
pub use context::{SessionContext, SessionManager};
pub use errors::SessionError;
pub use gate::{Access, DenyReason};
pub use identity::{Identity, Role};
pub use persist::LocalSessionFile;
pub use resolve::ProfileResolver;
