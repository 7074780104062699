//! Resolves an auth record to an identity by profile lookup.
//!
//! Every role is resolved the same way: a profile document whose id is the
//! account's uid. Profile collections are tried in the order of `PROFILE_ORDER`
//! and the first hit decides the role.

use docstore::DocumentStore;
use std::sync::Arc;

use crate::auth::AuthRecord;
use crate::errors::SessionError;
use crate::identity::{Identity, Role};

const PROFILE_ORDER: [Role; 3] = [Role::Admin, Role::Teacher, Role::Student];

#[derive(Clone)]
pub struct ProfileResolver {
    store: Arc<dyn DocumentStore>,
}

impl ProfileResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, record: &AuthRecord) -> Result<Identity, SessionError> {
        for role in PROFILE_ORDER {
            let Some(profile) = self
                .store
                .get(role.profile_collection(), &record.uid)
                .await?
            else {
                continue;
            };

            let display_email = profile
                .str_field("email")
                .unwrap_or(&record.email)
                .to_string();
            tracing::debug!(uid = %record.uid, %role, "Resolved profile");

            return Ok(Identity {
                id: record.uid.clone(),
                role,
                display_email,
            });
        }

        tracing::info!(uid = %record.uid, "No profile found for account");
        Err(SessionError::ProfileNotFound(record.uid.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore::{Collection, Fields, MemoryStore};
    use serde_json::json;

    fn record(uid: &str) -> AuthRecord {
        AuthRecord {
            uid: uid.to_string(),
            email: format!("{uid}@auth.test"),
        }
    }

    fn resolver(memory: &MemoryStore) -> ProfileResolver {
        ProfileResolver::new(Arc::new(memory.clone()))
    }

    #[tokio::test]
    async fn test_resolves_each_role_by_id() {
        let memory = MemoryStore::new();
        memory.insert(Collection::Students, "s1", Fields::new());
        memory.insert(Collection::Teachers, "t1", Fields::new());
        memory.insert(Collection::Admins, "a1", Fields::new());

        let resolver = resolver(&memory);
        assert_eq!(resolver.resolve(&record("s1")).await.unwrap().role, Role::Student);
        assert_eq!(resolver.resolve(&record("t1")).await.unwrap().role, Role::Teacher);
        assert_eq!(resolver.resolve(&record("a1")).await.unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn test_profile_email_preferred() {
        let memory = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("email".into(), json!("grace@school.test"));
        memory.insert(Collection::Teachers, "t1", fields);

        let identity = resolver(&memory).resolve(&record("t1")).await.unwrap();
        assert_eq!(identity.display_email, "grace@school.test");

        memory.insert(Collection::Students, "s1", Fields::new());
        let identity = resolver(&memory).resolve(&record("s1")).await.unwrap();
        assert_eq!(identity.display_email, "s1@auth.test");
    }

    #[tokio::test]
    async fn test_profile_not_found() {
        let memory = MemoryStore::new();
        // A profile keyed by email instead of uid does not count
        memory.insert(Collection::Teachers, "x@auth.test", Fields::new());

        let err = resolver(&memory).resolve(&record("x")).await.unwrap_err();
        assert!(matches!(err, SessionError::ProfileNotFound(uid) if uid == "x"));
    }
}
