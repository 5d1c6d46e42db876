//! Accounts pre-registered at startup from a TOML file.
//!
//! ```toml
//! [[users]]
//! username = "alice"
//! password = "pw1"
//! email = "alice@example.com"
//! full_name = "Alice"
//! ```
//!
//! Entries with an empty username or password are skipped. Duplicate usernames
//! are deduplicated (last wins). The server warns if the file is world-readable (Unix).

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum UsersFileError {
    #[error("failed to read users file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid users file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("users file {path} does not define valid users")]
    Empty { path: String },
}

#[derive(Debug, Default, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<SeedUser>,
}

/// Load seed users. Requires at least one valid entry.
pub fn load_users_file(path: &Path) -> Result<Vec<SeedUser>, UsersFileError> {
    check_permissions(path);

    let raw = std::fs::read_to_string(path).map_err(|source| UsersFileError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let parsed: UsersFile = toml::from_str(&raw).map_err(|source| UsersFileError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let users = dedupe(parsed.users);
    if users.is_empty() {
        return Err(UsersFileError::Empty {
            path: path.display().to_string(),
        });
    }
    Ok(users)
}

fn dedupe(users: Vec<SeedUser>) -> Vec<SeedUser> {
    let mut mapped = BTreeMap::new();
    for mut user in users {
        user.username = user.username.trim().to_string();
        if user.username.is_empty() || user.password.trim().is_empty() {
            continue;
        }
        mapped.insert(user.username.clone(), user);
    }
    mapped.into_values().collect()
}

#[cfg(unix)]
fn check_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.permissions().mode() & 0o004 != 0 {
            warn!(
                path = %path.display(),
                "users file is world-readable; consider chmod 600"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) {}
