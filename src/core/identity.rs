//! Anonymous identity: one opaque user id per install

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::{info, warn};
use uuid::Uuid;

/// Supplies the current user id, if signed in
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// Anonymous sign-in. The id is set at most once per process; with a
/// backing file it is also reused across runs.
#[derive(Debug, Default)]
pub struct AnonymousIdentity {
    user_id: OnceLock<String>,
    path: Option<PathBuf>,
}

impl AnonymousIdentity {
    /// Not signed in, nothing persisted
    pub fn new() -> Self {
        Self::default()
    }

    /// Not signed in; sign-in reuses/persists the id at `path`
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            user_id: OnceLock::new(),
            path: Some(path.into()),
        }
    }

    /// Already signed in as `user_id`
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let identity = Self::new();
        let _ = identity.user_id.set(user_id.into());
        identity
    }

    /// Establish the anonymous id and return it; later calls return the same id
    pub fn sign_in_anonymously(&self) -> &str {
        self.user_id.get_or_init(|| {
            let id = self
                .path
                .as_deref()
                .and_then(read_persisted)
                .unwrap_or_else(|| {
                    let id = Uuid::new_v4().to_string();
                    if let Some(path) = &self.path {
                        persist(path, &id);
                    }
                    id
                });
            info!(user_id = %id, "signed in anonymously");
            id
        })
    }
}

impl IdentityProvider for AnonymousIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.get().cloned()
    }
}

fn read_persisted(path: &Path) -> Option<String> {
    let id = std::fs::read_to_string(path).ok()?;
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn persist(path: &Path, id: &str) {
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    if let Err(e) = std::fs::write(path, id) {
        warn!(path = %path.display(), error = %e, "could not persist anonymous id");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_before_sign_in() {
        let identity = AnonymousIdentity::new();
        assert_eq!(identity.current_user_id(), None);
    }

    #[test]
    fn test_sign_in_is_stable() {
        let identity = AnonymousIdentity::new();
        let first = identity.sign_in_anonymously().to_string();
        let second = identity.sign_in_anonymously().to_string();
        assert_eq!(first, second);
        assert_eq!(identity.current_user_id(), Some(first));
    }

    #[test]
    fn test_id_reused_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity");

        let first = AnonymousIdentity::with_file(&path);
        let id = first.sign_in_anonymously().to_string();

        let second = AnonymousIdentity::with_file(&path);
        assert_eq!(second.current_user_id(), None);
        assert_eq!(second.sign_in_anonymously(), id);
    }
}
