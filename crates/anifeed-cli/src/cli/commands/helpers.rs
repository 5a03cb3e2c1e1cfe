//! Shared helpers for CLI commands.

use anyhow::{Context, Result};
use std::path::Path;

use anifeed_core::config::{resolve_viewer, FeedConfig, VIEWER_VAR};
use anifeed_core::core::{FeedContext, FeedServices};

/// Everything a command needs: open services and the acting user, if any.
pub struct Session {
    pub services: FeedServices,
    pub viewer: Option<i64>,
}

impl Session {
    /// The acting user, or an error telling how to provide one.
    pub fn actor(&self) -> Result<i64> {
        require_viewer(self.viewer)
    }
}

/// Open the database (applying migrations) and resolve the acting user.
pub fn open_session(db: Option<&Path>, as_user: Option<i64>) -> Result<Session> {
    let config = FeedConfig::from_env(db)?;
    let viewer = resolve_viewer(as_user)?;
    let services = FeedContext::new(config.clone())
        .open()
        .with_context(|| format!("Failed to open {}", config.db_path.display()))?;
    Ok(Session { services, viewer })
}

pub fn require_viewer(viewer: Option<i64>) -> Result<i64> {
    viewer.with_context(|| {
        format!("No acting user.\n  To fix: pass --as <user_id> or set {VIEWER_VAR}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_require_viewer_explains_fix() {
        let err = require_viewer(None).unwrap_err();
        assert!(err.to_string().contains("--as"));
        assert_eq!(require_viewer(Some(7)).unwrap(), 7);
    }

    #[test]
    fn test_open_session_creates_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.db");
        let session = open_session(Some(&path), Some(3)).unwrap();
        assert_eq!(session.viewer, Some(3));
        assert!(path.exists());
        assert!(session.services.db().schema_version().unwrap() >= 1);
    }
}
