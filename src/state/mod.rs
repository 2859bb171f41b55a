//! Client-wide state shared by the services: configuration, the persistence
//! stack, one HTTP client and the signed-in session.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    config::AppConfig,
    dao::{PersistenceStack, models::UserType},
    error::ApiError,
};

/// Handle shared by every service.
pub type SharedContext = Arc<ClientContext>;

/// Signed-in account, reset by login and logout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Account id; `0` when signed out.
    pub user_id: i64,
    /// Full name shown in the UI.
    pub name: String,
    /// Role of the signed-in account.
    pub user_type: Option<UserType>,
    /// Class picked by a player before loading its games.
    pub class_id: i64,
}

impl Session {
    /// Whether an account is signed in.
    pub fn is_signed_in(&self) -> bool {
        self.user_id > 0
    }
}

/// Explicit replacement for process-wide singletons; build one per client.
pub struct ClientContext {
    config: AppConfig,
    stack: PersistenceStack,
    http: Client,
    session: RwLock<Session>,
}

impl ClientContext {
    /// Construct a new [`ClientContext`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, stack: PersistenceStack) -> Result<SharedContext, ApiError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::Transport)?;
        Ok(Arc::new(Self {
            config,
            stack,
            http,
            session: RwLock::new(Session::default()),
        }))
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Context tiers of the local cache.
    pub fn stack(&self) -> &PersistenceStack {
        &self.stack
    }

    /// Shared HTTP client carrying the configured timeout.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Copy of the current session.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Replace the session after a login.
    pub async fn sign_in(&self, session: Session) {
        info!(user_id = session.user_id, "session started");
        *self.session.write().await = session;
    }

    /// Reset to the signed-out session.
    pub async fn sign_out(&self) {
        let mut guard = self.session.write().await;
        if guard.is_signed_in() {
            info!(user_id = guard.user_id, "session ended");
        }
        *guard = Session::default();
    }

    /// Remember the class a player picked.
    pub async fn select_class(&self, class_id: i64) {
        self.session.write().await.class_id = class_id;
    }

    /// Id of the signed-in account, used as the `requestor` of most routes.
    pub async fn requestor(&self) -> Result<i64, ApiError> {
        let session = self.session.read().await;
        if session.is_signed_in() {
            Ok(session.user_id)
        } else {
            Err(ApiError::SignedOut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::disk_store::MemoryStore;

    async fn context() -> SharedContext {
        let stack = PersistenceStack::with_store(Arc::new(MemoryStore::new()))
            .await
            .unwrap();
        ClientContext::new(AppConfig::default(), stack).unwrap()
    }

    #[tokio::test]
    async fn requestor_requires_sign_in() {
        let ctx = context().await;
        assert!(matches!(ctx.requestor().await, Err(ApiError::SignedOut)));

        ctx.sign_in(Session {
            user_id: 7,
            name: "Juan Dela Cruz".into(),
            user_type: Some(UserType::Player),
            class_id: 0,
        })
        .await;
        ctx.select_class(3).await;
        assert_eq!(ctx.requestor().await.unwrap(), 7);
        assert_eq!(ctx.session().await.class_id, 3);

        ctx.sign_out().await;
        assert_eq!(ctx.session().await, Session::default());
    }
}
