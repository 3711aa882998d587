//! Durable token archive
//!
//! Keeps a snapshot of every token response outside the session store, so
//! tokens survive process restarts and the one-shot credential read. The
//! flow only sees the `TokenArchive` trait; `FileArchive` writes one JSON
//! file per identity:
//!
//! `<dir>/hubspot_tokens_<org_id>_<user_id>.json`
//!
//! Writes use atomic temp-file + rename so a crash mid-write never leaves a
//! truncated snapshot. Snapshots are never deleted by this crate.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::form_urlencoded;

use crate::constants::{INTEGRATION_KEY, INTEGRATION_NAME};
use crate::error::{Error, Result};
use crate::token::TokenBundle;

/// Metadata envelope around a raw token response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedTokens {
    pub user_id: String,
    pub org_id: String,
    pub integration: String,
    /// RFC 3339 timestamp of the exchange
    pub created_at: DateTime<Utc>,
    pub tokens: TokenBundle,
}

impl ArchivedTokens {
    /// Snapshot stamped with the current time.
    pub fn new(user_id: &str, org_id: &str, tokens: TokenBundle) -> Self {
        Self {
            user_id: user_id.to_owned(),
            org_id: org_id.to_owned(),
            integration: INTEGRATION_NAME.to_owned(),
            created_at: Utc::now(),
            tokens,
        }
    }
}

/// Durable storage for token snapshots.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility, so a
/// database-backed archive can replace `FileArchive` without touching the
/// flow.
pub trait TokenArchive: Send + Sync {
    /// Persist a snapshot, replacing any earlier one for the same identity.
    fn save<'a>(
        &'a self,
        snapshot: &'a ArchivedTokens,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Load the snapshot for `(org_id, user_id)`, if one was written.
    fn load<'a>(
        &'a self,
        org_id: &'a str,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ArchivedTokens>>> + Send + 'a>>;
}

/// One JSON file per identity under a directory.
#[derive(Debug, Clone)]
pub struct FileArchive {
    dir: PathBuf,
}

impl FileArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding the snapshot for `(org_id, user_id)`.
    ///
    /// Identifiers are escaped so they cannot leave the archive directory
    /// and two identities never share a file.
    pub fn path_for(&self, org_id: &str, user_id: &str) -> PathBuf {
        self.dir.join(format!(
            "{INTEGRATION_KEY}_tokens_{}_{}.json",
            file_component(org_id),
            file_component(user_id)
        ))
    }
}

impl TokenArchive for FileArchive {
    fn save<'a>(
        &'a self,
        snapshot: &'a ArchivedTokens,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| Error::Io(format!("creating archive directory: {e}")))?;
            let path = self.path_for(&snapshot.org_id, &snapshot.user_id);
            write_atomic(&path, snapshot).await
        })
    }

    fn load<'a>(
        &'a self,
        org_id: &'a str,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ArchivedTokens>>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.path_for(org_id, user_id);
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "no archived tokens");
                    return Ok(None);
                }
                Err(e) => return Err(Error::Io(format!("reading archived tokens: {e}"))),
            };
            let snapshot = serde_json::from_str(&contents)
                .map_err(|e| Error::ArchiveParse(format!("parsing {}: {e}", path.display())))?;
            debug!(path = %path.display(), "loaded archived tokens");
            Ok(Some(snapshot))
        })
    }
}

/// Form-urlencode `id` and escape `_` as well, so neither `/` nor the `_`
/// separator between org and user can appear unescaped.
fn file_component(id: &str) -> String {
    form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('_', "%5F")
}

/// Write a snapshot atomically with 0600 permissions (it holds tokens).
async fn write_atomic(path: &Path, snapshot: &ArchivedTokens) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| Error::ArchiveParse(format!("serializing snapshot: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("archive path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Io("archive path has no file name".into()))?;

    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp archive file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting archive file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp archive file: {e}")))?;

    debug!(path = %path.display(), "archived tokens");
    Ok(())
}
