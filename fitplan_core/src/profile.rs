//! User profile lookup.
//!
//! Profiles are owned by an external store. A missing profile and an
//! unreadable one both come back as `None`, which callers route to profile
//! completion.

use crate::{Result, UserProfile};
use std::path::PathBuf;

pub trait ProfileStore {
    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
}

/// Profiles stored as `<data_dir>/users/<user>/profile.json`
pub struct JsonProfileStore {
    root: PathBuf,
}

impl JsonProfileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
        }
    }

    pub fn profile_path(&self, user_id: &str) -> PathBuf {
        self.root
            .join("users")
            .join(crate::lock::encode_user_id(user_id))
            .join("profile.json")
    }

    pub fn save_profile(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        crate::state::save_json(&self.profile_path(user_id), profile)?;
        tracing::info!("Saved profile for '{}'", user_id);
        Ok(())
    }

    /// Load (or start) a profile, modify it and save it back
    ///
    /// An unreadable `profile.json` is moved to `profile.json.bad` before the
    /// fresh profile is written, so its contents are never lost.
    pub fn update_profile<F>(&self, user_id: &str, f: F) -> Result<UserProfile>
    where
        F: FnOnce(&mut UserProfile),
    {
        let path = self.profile_path(user_id);
        let existing = self.get_profile(user_id)?;
        if existing.is_none() && path.exists() {
            let backup = path.with_extension("json.bad");
            std::fs::rename(&path, &backup)?;
            tracing::warn!(
                "Profile for '{}' was unreadable; moved it to {:?} and starting fresh",
                user_id,
                backup
            );
        }

        let mut profile = existing.unwrap_or_default();
        f(&mut profile);
        self.save_profile(user_id, &profile)?;
        Ok(profile)
    }
}

impl ProfileStore for JsonProfileStore {
    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let profile = crate::state::load_json(&self.profile_path(user_id))?;
        if profile.is_none() {
            tracing::debug!("No usable profile for '{}'", user_id);
        }
        Ok(profile)
    }
}
