use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use super::identity::Identity;
use crate::error::{IntakeError, Result};

/// Notifications from the hosted auth provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
}

/// Shared, explicitly passed authentication state
#[derive(Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<Option<Identity>>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    /// Context that starts out signed in
    pub fn signed_in(identity: Identity) -> Self {
        let context = Self::new();
        context.apply(AuthEvent::SignedIn(identity));
        context
    }

    /// Apply an auth-state change and notify subscribers
    pub fn apply(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(identity) => {
                info!(uid = %identity.uid, "signed in");
                self.state.send_replace(Some(identity));
            }
            AuthEvent::SignedOut => {
                info!("signed out");
                self.state.send_replace(None);
            }
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }

    /// Current identity, or `NotAuthenticated`
    pub fn require_identity(&self) -> Result<Identity> {
        self.current().ok_or(IntakeError::NotAuthenticated)
    }

    pub fn is_signed_in(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.receiver_count()
    }

    /// Subscribe to auth-state changes
    pub fn subscribe(&self, name: impl Into<String>) -> SessionSubscription {
        let name = name.into();
        debug!("Session subscriber added: {}", name);
        SessionSubscription {
            name,
            rx: self.state.subscribe(),
        }
    }
}

/// A live subscription to auth-state changes
pub struct SessionSubscription {
    name: String,
    rx: watch::Receiver<Option<Identity>>,
}

impl SessionSubscription {
    /// Wait for the next change.
    ///
    /// Returns `None` once the context is gone.
    pub async fn changed(&mut self) -> Option<Option<Identity>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn current(&self) -> Option<Identity> {
        self.rx.borrow().clone()
    }

    pub fn unsubscribe(self) {
        debug!("Session subscriber removed: {}", self.name);
    }
}
