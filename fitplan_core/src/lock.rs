//! Exclusive per-user session lock.
//!
//! A `SessionGuard` must be held to start a session. It wraps an advisory
//! `fs2` lock on `<lock_dir>/<user>.lock`, so a second session for the same
//! user fails fast, whether from this process or another one. The lock is
//! released when the guard is dropped.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct SessionGuard {
    user_id: String,
    path: PathBuf,
    file: File,
}

impl SessionGuard {
    /// Acquire the session lock for `user_id`, failing if it is already held
    pub fn acquire(lock_dir: &Path, user_id: &str) -> Result<Self> {
        std::fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(format!("{}.lock", encode_user_id(user_id)));

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            tracing::warn!("Session lock for '{}' is held elsewhere", user_id);
            return Err(Error::SessionLocked(user_id.to_string()));
        }

        tracing::debug!("Acquired session lock {:?}", path);
        Ok(Self {
            user_id: user_id.to_string(),
            path,
            file,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release session lock {:?}: {}", self.path, e);
        } else {
            tracing::debug!("Released session lock {:?}", self.path);
        }
    }
}

/// File-name-safe form of a user id
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte is
/// percent-encoded, so distinct ids never share a file and none can escape
/// the directory.
pub(crate) fn encode_user_id(user_id: &str) -> String {
    let mut encoded = String::with_capacity(user_id.len());
    for byte in user_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}
