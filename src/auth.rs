//! Access to the authenticated subject record and bearer token.
//!
//! Login itself belongs to the REST backend. The dashboard only reads what a
//! previous login stored: the cached user record and its token.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::identity::User;

/// Source of the current authentication state.
pub trait AuthProvider: Send + Sync + Debug {
    /// The cached subject record of the logged-in user, if any.
    fn current_user(&self) -> Option<User>;

    /// The opaque bearer token of the logged-in user, if any.
    fn token(&self) -> Option<String> {
        self.current_user().and_then(|u| u.access_token)
    }
}

/// Auth state persisted as a JSON subject record on disk.
///
/// The file holds the record returned by the backend's login endpoint
/// (including `access_token`). It is read once on construction.
#[derive(Debug)]
pub struct FileAuthStore {
    path: PathBuf,
    user: Option<User>,
}

impl FileAuthStore {
    /// Load the session file. A missing or unreadable file means "logged out".
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let user = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<User>(&content) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring malformed session file");
                    None
                }
            },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no session file");
                None
            }
        };
        Self { path, user }
    }

    /// Path of the backing session file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuthProvider for FileAuthStore {
    fn current_user(&self) -> Option<User> {
        self.user.clone()
    }
}

/// Fixed auth state, handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user: Option<User>,
}

impl StaticAuth {
    pub fn new(user: Option<User>) -> Self {
        Self { user }
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<User> {
        self.user.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Role, SubjectId};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_store_reads_user_and_token() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"id": 5, "name": "Eva", "role": "patient", "access_token": "tok"}}"#
        )
        .unwrap();

        let store = FileAuthStore::load(file.path());
        let user = store.current_user().unwrap();
        assert_eq!(user.id, Some(SubjectId(5)));
        assert_eq!(user.role, Role::Patient);
        assert_eq!(store.token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_missing_file_is_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuthStore::load(dir.path().join("absent.json"));
        assert!(store.current_user().is_none());
        assert!(store.token().is_none());
    }

    #[test]
    fn test_malformed_file_is_logged_out() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let store = FileAuthStore::load(file.path());
        assert!(store.current_user().is_none());
    }
}
