//! The explicit session context handed to every screen.
//!
//! The context is a possibly stale copy of who is signed in. It changes only
//! at sign-in and sign-out, both through [`SessionManager`].

use shared::counter;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::errors::SessionError;
use crate::gate::{self, Access, DenyReason};
use crate::identity::{Identity, Role};
use crate::metrics_defs::{SIGN_IN_FAILURE, SIGN_IN_SUCCESS};
use crate::persist::{LocalSessionFile, PersistedSession};
use crate::resolve::ProfileResolver;

#[derive(Clone, Debug, PartialEq, Eq)]
struct SignedIn {
    user_id: String,
    email: String,
    role: Role,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionContext {
    user: Option<SignedIn>,
}

impl SessionContext {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: &Identity) -> Self {
        SessionContext {
            user: Some(SignedIn {
                user_id: identity.id.clone(),
                email: identity.display_email.clone(),
                role: identity.role,
            }),
        }
    }

    fn from_persisted(persisted: PersistedSession) -> Self {
        SessionContext {
            user: Some(SignedIn {
                user_id: persisted.user_id,
                email: persisted.user_email,
                role: persisted.role,
            }),
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|user| user.role)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.user_id.as_str())
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.email.as_str())
    }

    pub fn gate(&self, required_roles: &[Role]) -> Access {
        gate::check(self.role(), required_roles)
    }

    /// Runs the role gate and returns the signed-in user id when allowed.
    pub fn authorize(&self, required_roles: &[Role]) -> Result<&str, DenyReason> {
        match self.gate(required_roles) {
            Access::Allow => self.user_id().ok_or(DenyReason::Unauthenticated),
            Access::Deny(reason) => Err(reason),
        }
    }
}

/// Owns the refresh points of the session: sign-in, sign-out, and the
/// startup read of the persisted session.
pub struct SessionManager {
    auth: Arc<dyn AuthService>,
    resolver: ProfileResolver,
    local: LocalSessionFile,
}

impl SessionManager {
    pub fn new(
        auth: Arc<dyn AuthService>,
        resolver: ProfileResolver,
        local: LocalSessionFile,
    ) -> Self {
        SessionManager {
            auth,
            resolver,
            local,
        }
    }

    /// Reads the persisted session at startup. An unreadable session file is
    /// discarded and treated as signed out.
    pub fn restore(&self) -> SessionContext {
        match self.local.load() {
            Ok(Some(persisted)) => SessionContext::from_persisted(persisted),
            Ok(None) => SessionContext::signed_out(),
            Err(e) => {
                tracing::warn!(
                    path = %self.local.path().display(),
                    error = %e,
                    "Discarding unreadable session file"
                );
                if let Err(e) = self.local.clear() {
                    tracing::warn!(error = %e, "Could not remove session file");
                }
                SessionContext::signed_out()
            }
        }
    }

    pub async fn sign_in(&self, email: &str, secret: &str) -> Result<SessionContext, SessionError> {
        let record = match self.auth.sign_in(email, secret).await {
            Ok(record) => record,
            Err(e) => {
                counter!(SIGN_IN_FAILURE).increment(1);
                return Err(e.into());
            }
        };

        let identity = match self.resolver.resolve(&record).await {
            Ok(identity) => identity,
            Err(e) => {
                counter!(SIGN_IN_FAILURE).increment(1);
                // Do not leave an account signed in without a role
                self.auth.sign_out().await?;
                return Err(e);
            }
        };

        let persisted = PersistedSession {
            user_email: identity.display_email.clone(),
            role: identity.role,
            user_id: identity.id.clone(),
        };
        if let Err(e) = self.local.store(&persisted) {
            counter!(SIGN_IN_FAILURE).increment(1);
            // The next run would start signed out while auth still holds the account
            self.auth.sign_out().await?;
            return Err(e.into());
        }

        counter!(SIGN_IN_SUCCESS).increment(1);
        tracing::info!(uid = %identity.id, role = %identity.role, "Signed in");
        Ok(SessionContext::signed_in(&identity))
    }

    pub async fn sign_out(&self) -> Result<SessionContext, SessionError> {
        self.auth.sign_out().await?;
        self.local.clear()?;
        tracing::info!("Signed out");
        Ok(SessionContext::signed_out())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuth;
    use docstore::{Collection, Fields, MemoryStore};
    use std::fs;
    use std::path::PathBuf;

    fn session_manager(dir: &tempfile::TempDir) -> (SessionManager, Arc<StaticAuth>) {
        session_manager_at(dir.path().join("session.json"))
    }

    fn session_manager_at(path: PathBuf) -> (SessionManager, Arc<StaticAuth>) {
        let memory = MemoryStore::new();
        memory.insert(Collection::Teachers, "t1", Fields::new());

        let auth = Arc::new(
            StaticAuth::new()
                .with_account("grace@school.test", "pw", "t1")
                .with_account("ghost@school.test", "pw", "nobody"),
        );
        let manager = SessionManager::new(
            auth.clone(),
            ProfileResolver::new(Arc::new(memory)),
            LocalSessionFile::new(path),
        );
        (manager, auth)
    }

    #[tokio::test]
    async fn test_sign_in_persists_and_restores() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = session_manager(&dir);
        assert_eq!(manager.restore(), SessionContext::signed_out());

        let ctx = manager.sign_in("grace@school.test", "pw").await.unwrap();
        assert_eq!(ctx.role(), Some(Role::Teacher));
        assert_eq!(ctx.user_id(), Some("t1"));
        assert_eq!(ctx.email(), Some("grace@school.test"));

        // A fresh manager reads the same context from disk
        let (restarted, _) = session_manager(&dir);
        assert_eq!(restarted.restore(), ctx);

        let ctx = manager.sign_out().await.unwrap();
        assert_eq!(ctx.role(), None);
        assert_eq!(manager.restore(), SessionContext::signed_out());
    }

    #[tokio::test]
    async fn test_invalid_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = session_manager(&dir);

        let err = manager.sign_in("grace@school.test", "nope").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidCredentials));
        assert_eq!(manager.restore(), SessionContext::signed_out());
    }

    #[tokio::test]
    async fn test_account_without_profile() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, auth) = session_manager(&dir);

        let err = manager.sign_in("ghost@school.test", "pw").await.unwrap_err();
        assert!(matches!(err, SessionError::ProfileNotFound(_)));
        assert!(auth.current().await.is_none());
        assert!(!dir.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn test_unwritable_session_file_signs_out() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();
        let (manager, auth) = session_manager_at(blocker.join("session.json"));

        let err = manager.sign_in("grace@school.test", "pw").await.unwrap_err();
        assert!(matches!(err, SessionError::Persist(_)));
        assert!(auth.current().await.is_none());
        assert_eq!(manager.restore(), SessionContext::signed_out());
    }

    #[test]
    fn test_corrupt_session_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("session.json"), b"not json").unwrap();
        let (manager, _) = session_manager(&dir);

        assert_eq!(manager.restore(), SessionContext::signed_out());
        assert!(!dir.path().join("session.json").exists());
    }

    #[test]
    fn test_authorize() {
        let identity = Identity {
            id: "s1".into(),
            role: Role::Student,
            display_email: "s1@school.test".into(),
        };
        let ctx = SessionContext::signed_in(&identity);

        assert_eq!(ctx.authorize(&[Role::Student]), Ok("s1"));
        assert_eq!(ctx.authorize(&[Role::Teacher]), Err(DenyReason::WrongRole));
        assert_eq!(
            SessionContext::signed_out().authorize(&[Role::Student]),
            Err(DenyReason::Unauthenticated)
        );
    }
}
