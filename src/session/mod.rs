//! Authenticated session context
//!
//! Identity is held in an explicit `SessionContext` rather than ambient
//! global state. Components that need the practitioner's identity take the
//! context (or a subscription to it); the application subscribes at its top
//! level and unsubscribes on shutdown.

mod context;
mod identity;

pub use context::{AuthEvent, SessionContext, SessionSubscription};
pub use identity::Identity;
