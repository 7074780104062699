//! Builds the store, auth client and session manager from a [`Config`].

use docstore::{Collection, DocumentStore, Fields, MemoryStore, RestStore};
use fanout::FanOutMerger;
use session::{
    AuthService, HttpAuthClient, LocalSessionFile, ProfileResolver, SessionManager, StaticAuth,
};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::config::{AuthConfig, Config, ConfigError, StoreConfig};
use crate::screens::Backend;

#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not read seed file: {0}")]
    SeedLoad(#[from] std::io::Error),

    #[error("could not parse seed file: {0}")]
    SeedParse(#[from] serde_json::Error),

    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
}

/// Seed file layout: collection -> document id -> fields.
type Seed = HashMap<Collection, BTreeMap<String, Fields>>;

pub struct App {
    pub backend: Backend,
    pub sessions: SessionManager,
}

impl App {
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        let store = build_store(&config.store)?;
        let auth = build_auth(&config.auth);
        let merger = FanOutMerger::with_max_batch(config.max_batch());

        let sessions = SessionManager::new(
            auth,
            ProfileResolver::new(store.clone()),
            LocalSessionFile::new(&config.session.path),
        );
        Ok(App {
            backend: Backend::new(store, merger),
            sessions,
        })
    }
}

fn build_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, SetupError> {
    match config {
        StoreConfig::Rest { url, api_key } => {
            tracing::debug!(%url, "Using hosted document store");
            Ok(Arc::new(RestStore::new(url, api_key.clone())))
        }
        StoreConfig::Memory { seed } => {
            let memory = MemoryStore::new();
            if let Some(path) = seed {
                let loaded = load_seed(&memory, path)?;
                tracing::info!(
                    path = %path.display(),
                    documents = loaded,
                    "Seeded in-memory store"
                );
            }
            Ok(Arc::new(memory))
        }
    }
}

fn load_seed(memory: &MemoryStore, path: &Path) -> Result<usize, SetupError> {
    let seed: Seed = serde_json::from_reader(File::open(path)?)?;
    let mut loaded = 0;
    for (collection, documents) in seed {
        for (id, fields) in documents {
            memory.insert(collection, id, fields);
            loaded += 1;
        }
    }
    Ok(loaded)
}

fn build_auth(config: &AuthConfig) -> Arc<dyn AuthService> {
    match config {
        AuthConfig::Http { url, api_key } => Arc::new(HttpAuthClient::new(url, api_key.clone())),
        AuthConfig::Static { accounts } => {
            let auth = accounts.iter().fold(StaticAuth::new(), |auth, account| {
                auth.with_account(&account.email, &account.password, &account.uid)
            });
            Arc::new(auth)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session::Role;
    use std::io::Write;

    const SEED: &str = r#"{
        "teachers": {"t1": {"name": "Turing", "subject": "math"}},
        "students": {"s1": {"name": "Ada", "preferredTeachers": ["t1"]}}
    }"#;

    #[tokio::test]
    async fn test_memory_app_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let seed_path = dir.path().join("seed.json");
        File::create(&seed_path)
            .unwrap()
            .write_all(SEED.as_bytes())
            .unwrap();

        let yaml = format!(
            r#"
            store:
                type: memory
                seed: {seed}
            auth:
                type: static
                accounts:
                    - email: ada@school.test
                      password: pw
                      uid: s1
            session:
                path: {session}
            "#,
            seed = seed_path.display(),
            session = dir.path().join("session.json").display(),
        );
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        let app = App::from_config(&config).unwrap();

        let ctx = app.sessions.sign_in("ada@school.test", "pw").await.unwrap();
        assert_eq!(ctx.role(), Some(Role::Student));

        let teachers = app
            .backend
            .directory()
            .linked_teachers(&ctx)
            .await
            .unwrap()
            .rendered()
            .unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].name, "Turing");

        // The next invocation starts from the persisted session
        assert_eq!(App::from_config(&config).unwrap().sessions.restore(), ctx);
    }

    #[test]
    fn test_bad_seed() {
        let dir = tempfile::tempdir().unwrap();
        let seed_path = dir.path().join("seed.json");
        std::fs::write(&seed_path, r#"{"lockers": {}}"#).unwrap();

        let result = build_store(&StoreConfig::Memory {
            seed: Some(seed_path),
        });
        assert!(matches!(result, Err(SetupError::SeedParse(_))));
    }
}
