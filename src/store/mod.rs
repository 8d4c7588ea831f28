//! Remote file stores holding the inventory, submissions and instrument data.
//!
//! Every backend speaks the same small contract: read a whole file, write a
//! whole file, list a directory. Failures are reported once, as an error
//! message naming the request; there is no retry.

mod forgejo;
#[cfg(test)]
mod memory;
mod webdav;

pub use forgejo::ForgejoStore;
#[cfg(test)]
pub use memory::MemoryStore;
pub use webdav::WebDavStore;

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Report, Result};

use crate::config::{Config, StoreKind};

/// A file or directory in a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
  /// Last path segment
  pub name: String,
  /// Path relative to the store root, without a leading slash
  pub path: String,
  pub size: Option<u64>,
  pub modified: Option<DateTime<Utc>>,
  pub is_dir: bool,
}

/// File contents together with the store's version of them: the blob sha on
/// Forgejo, the ETag on WebDAV. `None` when the server reports none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
  pub body: Vec<u8>,
  pub version: Option<String>,
}

/// Contract shared by all remote stores.
#[allow(async_fn_in_trait)]
pub trait RemoteStore: Send + Sync {
  /// Fetch the full contents of a file.
  async fn get(&self, path: &str) -> Result<Vec<u8>>;

  /// Create or overwrite a file. `message` becomes the commit message on
  /// version-controlled stores.
  async fn put(&self, path: &str, body: Vec<u8>, message: &str) -> Result<()>;

  /// Fetch a file along with its current version.
  async fn get_versioned(&self, path: &str) -> Result<Versioned>;

  /// Overwrite a file only while it is still at `version`. A write that
  /// lost the race fails with [`conflict`]. `None` writes unconditionally.
  async fn replace(
    &self,
    path: &str,
    body: Vec<u8>,
    message: &str,
    version: Option<&str>,
  ) -> Result<()>;

  /// List the direct children of a directory, sorted by name.
  async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>>;

  /// Short human-readable location (usually the host).
  fn describe(&self) -> String;
}

/// Store selected at runtime from configuration.
#[derive(Clone)]
pub enum AnyStore {
  WebDav(WebDavStore),
  Forgejo(ForgejoStore),
}

impl AnyStore {
  /// Build the configured store, reading credentials from the environment.
  pub fn connect(config: &Config) -> Result<Self> {
    let password = Config::store_password()?;
    let store = &config.store;

    match store.kind {
      StoreKind::WebDav => Ok(AnyStore::WebDav(WebDavStore::new(
        &store.url,
        &store.username,
        &password,
      )?)),
      StoreKind::Forgejo => Ok(AnyStore::Forgejo(ForgejoStore::new(
        &store.url,
        store.owner.as_deref().unwrap_or_default(),
        store.repo.as_deref().unwrap_or_default(),
        &store.branch,
        &store.username,
        &password,
      )?)),
    }
  }
}

impl RemoteStore for AnyStore {
  async fn get(&self, path: &str) -> Result<Vec<u8>> {
    match self {
      AnyStore::WebDav(s) => s.get(path).await,
      AnyStore::Forgejo(s) => s.get(path).await,
    }
  }

  async fn put(&self, path: &str, body: Vec<u8>, message: &str) -> Result<()> {
    match self {
      AnyStore::WebDav(s) => s.put(path, body, message).await,
      AnyStore::Forgejo(s) => s.put(path, body, message).await,
    }
  }

  async fn get_versioned(&self, path: &str) -> Result<Versioned> {
    match self {
      AnyStore::WebDav(s) => s.get_versioned(path).await,
      AnyStore::Forgejo(s) => s.get_versioned(path).await,
    }
  }

  async fn replace(
    &self,
    path: &str,
    body: Vec<u8>,
    message: &str,
    version: Option<&str>,
  ) -> Result<()> {
    match self {
      AnyStore::WebDav(s) => s.replace(path, body, message, version).await,
      AnyStore::Forgejo(s) => s.replace(path, body, message, version).await,
    }
  }

  async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
    match self {
      AnyStore::WebDav(s) => s.list(dir).await,
      AnyStore::Forgejo(s) => s.list(dir).await,
    }
  }

  fn describe(&self) -> String {
    match self {
      AnyStore::WebDav(s) => s.describe(),
      AnyStore::Forgejo(s) => s.describe(),
    }
  }
}

/// Error for a write refused because the file changed since it was read.
pub fn conflict(path: &str) -> Report {
  eyre!(
    "'{}' was changed on the store since it was loaded. Refresh and reapply your edits.",
    normalize_path(path)
  )
}

/// Split a store path into its non-empty segments.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
  path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Normalize a store path: no leading/trailing or doubled slashes.
pub fn normalize_path(path: &str) -> String {
  path_segments(path).collect::<Vec<_>>().join("/")
}

/// Join a directory and a file name into a normalized store path.
pub fn join_path(dir: &str, name: &str) -> String {
  let dir = normalize_path(dir);
  let name = normalize_path(name);
  if dir.is_empty() {
    name
  } else {
    format!("{}/{}", dir, name)
  }
}

/// Host part of a URL, for headers and error messages.
pub fn host_of(url: &url::Url) -> String {
  match (url.host_str(), url.port()) {
    (Some(host), Some(port)) => format!("{}:{}", host, port),
    (Some(host), None) => host.to_string(),
    _ => url.as_str().to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_normalize_path() {
    assert_eq!(normalize_path("/master.csv"), "master.csv");
    assert_eq!(normalize_path("datalog//master.csv/"), "datalog/master.csv");
    assert_eq!(normalize_path("./spectra/ir"), "spectra/ir");
    assert_eq!(normalize_path("/"), "");
  }

  #[test]
  fn test_join_path() {
    assert_eq!(join_path("/submissions/", "a.csv"), "submissions/a.csv");
    assert_eq!(join_path("", "/master.csv"), "master.csv");
  }

  #[test]
  fn test_host_of() {
    let url = url::Url::parse("https://cloud.example.org/remote.php/dav").unwrap();
    assert_eq!(host_of(&url), "cloud.example.org");
    let url = url::Url::parse("http://localhost:3000/").unwrap();
    assert_eq!(host_of(&url), "localhost:3000");
  }
}
