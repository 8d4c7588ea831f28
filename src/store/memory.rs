//! In-process store for exercising code that talks to a remote store.

use color_eyre::{eyre::eyre, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{conflict, join_path, normalize_path, RemoteEntry, RemoteStore, Versioned};

/// Store backed by a map of path to bytes.
///
/// Counts reads and records commit messages so callers can check how often
/// the "network" was hit. Paths marked with `fail_on` answer like a server
/// error. A file's version is the digest of its contents.
#[derive(Default)]
pub struct MemoryStore {
  files: Mutex<BTreeMap<String, Vec<u8>>>,
  failing: Mutex<BTreeSet<String>>,
  after_read: Mutex<BTreeMap<String, Vec<u8>>>,
  messages: Mutex<Vec<(String, String)>>,
  gets: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed a file.
  pub fn with_file(self, path: &str, body: impl Into<Vec<u8>>) -> Self {
    self.insert(path, body);
    self
  }

  pub fn insert(&self, path: &str, body: impl Into<Vec<u8>>) {
    if let Ok(mut files) = self.files.lock() {
      files.insert(normalize_path(path), body.into());
    }
  }

  /// Make every request for `path` fail.
  pub fn fail_on(&self, path: &str) {
    if let Ok(mut failing) = self.failing.lock() {
      failing.insert(normalize_path(path));
    }
  }

  /// Stop failing requests for `path`.
  pub fn recover(&self, path: &str) {
    if let Ok(mut failing) = self.failing.lock() {
      failing.remove(&normalize_path(path));
    }
  }

  /// Replace `path` with `body` right after its next read, as another
  /// writer racing this one would.
  pub fn change_after_read(&self, path: &str, body: impl Into<Vec<u8>>) {
    if let Ok(mut pending) = self.after_read.lock() {
      pending.insert(normalize_path(path), body.into());
    }
  }

  /// Number of `get` calls served so far.
  pub fn get_count(&self) -> usize {
    self.gets.load(Ordering::SeqCst)
  }

  /// `(path, message)` for every successful `put`.
  pub fn messages(&self) -> Vec<(String, String)> {
    self
      .messages
      .lock()
      .map(|m| m.clone())
      .unwrap_or_default()
  }

  pub fn file(&self, path: &str) -> Option<Vec<u8>> {
    self
      .files
      .lock()
      .ok()
      .and_then(|files| files.get(&normalize_path(path)).cloned())
  }

  fn read(&self, path: &str) -> Result<Vec<u8>> {
    self.gets.fetch_add(1, Ordering::SeqCst);
    self.check_failing("GET", path)?;

    let mut files = self.files.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let body = files
      .get(path)
      .cloned()
      .ok_or_else(|| eyre!("GET {} failed: 404 Not Found", path))?;

    let racing = self
      .after_read
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .remove(path);
    if let Some(racing) = racing {
      files.insert(path.to_string(), racing);
    }
    Ok(body)
  }

  fn check_failing(&self, method: &str, path: &str) -> Result<()> {
    let failing = self
      .failing
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if failing.contains(path) {
      return Err(eyre!("{} {} failed: 500 Internal Server Error", method, path));
    }
    Ok(())
  }
}

impl RemoteStore for MemoryStore {
  async fn get(&self, path: &str) -> Result<Vec<u8>> {
    self.read(&normalize_path(path))
  }

  async fn get_versioned(&self, path: &str) -> Result<Versioned> {
    let body = self.read(&normalize_path(path))?;
    let version = Some(version_of(&body));
    Ok(Versioned { body, version })
  }

  async fn replace(
    &self,
    path: &str,
    body: Vec<u8>,
    message: &str,
    version: Option<&str>,
  ) -> Result<()> {
    if let Some(expected) = version {
      let current = self.file(path).map(|body| version_of(&body));
      if current.as_deref() != Some(expected) {
        return Err(conflict(path));
      }
    }
    self.put(path, body, message).await
  }

  async fn put(&self, path: &str, body: Vec<u8>, message: &str) -> Result<()> {
    let path = normalize_path(path);
    self.check_failing("PUT", &path)?;

    self
      .files
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .insert(path.clone(), body);
    self
      .messages
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .push((path, message.to_string()));
    Ok(())
  }

  async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
    let dir = normalize_path(dir);
    self.check_failing("PROPFIND", &dir)?;

    let prefix = if dir.is_empty() {
      String::new()
    } else {
      format!("{}/", dir)
    };

    let files = self.files.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let mut seen_dirs = BTreeSet::new();
    let mut entries = Vec::new();

    for (path, body) in files.iter() {
      let Some(rest) = path.strip_prefix(&prefix) else {
        continue;
      };
      match rest.split_once('/') {
        Some((child_dir, _)) => {
          if seen_dirs.insert(child_dir.to_string()) {
            entries.push(RemoteEntry {
              name: child_dir.to_string(),
              path: join_path(&dir, child_dir),
              size: None,
              modified: None,
              is_dir: true,
            });
          }
        }
        None => entries.push(RemoteEntry {
          name: rest.to_string(),
          path: path.clone(),
          size: Some(body.len() as u64),
          modified: None,
          is_dir: false,
        }),
      }
    }

    if entries.is_empty() && !dir.is_empty() {
      return Err(eyre!("PROPFIND {} failed: 404 Not Found", dir));
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
  }

  fn describe(&self) -> String {
    "memory".to_string()
  }
}

fn version_of(body: &[u8]) -> String {
  hex::encode(Sha256::digest(body))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_get_counts_requests() {
    let store = MemoryStore::new().with_file("/master.csv", "a,b\n");
    assert_eq!(store.get("master.csv").await.unwrap(), b"a,b\n");
    assert!(store.get("missing.csv").await.is_err());
    assert_eq!(store.get_count(), 2);
  }

  #[tokio::test]
  async fn test_fail_on_and_recover() {
    let store = MemoryStore::new().with_file("master.csv", "a\n");
    store.fail_on("/master.csv");
    let err = store.get("master.csv").await.unwrap_err();
    assert!(err.to_string().contains("500"));

    store.recover("master.csv");
    assert!(store.get("master.csv").await.is_ok());
  }

  #[tokio::test]
  async fn test_list_direct_children() {
    let store = MemoryStore::new()
      .with_file("submissions/b.csv", "x")
      .with_file("submissions/a.csv", "xy")
      .with_file("submissions/old/c.csv", "z")
      .with_file("master.csv", "m");

    let entries = store.list("/submissions/").await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.csv", "b.csv", "old"]);
    assert_eq!(entries[0].size, Some(2));
    assert_eq!(entries[0].path, "submissions/a.csv");
    assert!(entries[2].is_dir);
    assert_eq!(entries[2].path, "submissions/old");
  }

  #[tokio::test]
  async fn test_replace_checks_version() {
    let store = MemoryStore::new().with_file("master.csv", "a\n");
    let read = store.get_versioned("master.csv").await.unwrap();
    let version = read.version.unwrap();

    store.insert("master.csv", "b\n");
    let err = store
      .replace("master.csv", b"c\n".to_vec(), "Update", Some(&version))
      .await
      .unwrap_err();
    assert!(err.to_string().contains("was changed on the store"));
    assert_eq!(store.file("master.csv").unwrap(), b"b\n");

    let fresh = store.get_versioned("master.csv").await.unwrap();
    store
      .replace("master.csv", b"c\n".to_vec(), "Update", fresh.version.as_deref())
      .await
      .unwrap();
    assert_eq!(store.file("master.csv").unwrap(), b"c\n");
  }

  #[tokio::test]
  async fn test_put_records_message() {
    let store = MemoryStore::new();
    store
      .put("/submissions/x.csv", b"a\n".to_vec(), "Add full submission by Brian")
      .await
      .unwrap();

    assert_eq!(store.file("submissions/x.csv").unwrap(), b"a\n");
    assert_eq!(
      store.messages(),
      vec![(
        "submissions/x.csv".to_string(),
        "Add full submission by Brian".to_string()
      )]
    );
  }
}
