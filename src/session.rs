//! Per-session context: configuration, the store connection and the memo of
//! what has been fetched so far.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::cache::{CacheResult, SessionCache};
use crate::config::Config;
use crate::inventory::Inventory;
use crate::spectrum::InstrumentData;
use crate::store::{conflict, join_path, normalize_path, RemoteEntry, RemoteStore};
use crate::submission::SubmissionRecord;
use crate::table::{self, PayloadFormat, Table};

pub struct Session<S> {
  config: Config,
  store: S,
  inventories: SessionCache<Inventory>,
  spectra: SessionCache<InstrumentData>,
}

impl<S: RemoteStore> Session<S> {
  pub fn new(config: Config, store: S) -> Self {
    Self {
      config,
      store,
      inventories: SessionCache::new(),
      spectra: SessionCache::new(),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  fn inventory_path(&self) -> String {
    normalize_path(&self.config.paths.inventory)
  }

  /// The master inventory, fetched once per session.
  pub async fn inventory(&self) -> Result<CacheResult<Inventory>> {
    let path = self.inventory_path();
    self
      .inventories
      .get_or_fetch(&path, || self.fetch_inventory(&path))
      .await
  }

  /// Forget everything fetched so far and load the inventory again.
  pub async fn refresh(&self) -> Result<CacheResult<Inventory>> {
    info!("Refreshing session data");
    self.inventories.clear()?;
    self.spectra.clear()?;
    self.inventory().await
  }

  /// Time the inventory in the memo was fetched, if it has been.
  pub fn inventory_cached_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
    self.inventories.cached_at(&self.inventory_path())
  }

  /// Fingerprint of the inventory as it was when loaded.
  pub fn loaded_fingerprint(&self) -> Result<Option<String>> {
    match self.inventories.get(&self.inventory_path())? {
      Some(loaded) => loaded.data.table().fingerprint().map(Some),
      None => Ok(None),
    }
  }

  async fn fetch_inventory(&self, path: &str) -> Result<Inventory> {
    let table = self.fetch_table(path).await?;
    let inventory = Inventory::from_table(table)?;
    info!(path, rows = inventory.len(), "Loaded inventory");
    self.mirror(path, inventory.table());
    Ok(inventory)
  }

  async fn fetch_table(&self, path: &str) -> Result<Table> {
    let format = PayloadFormat::from_path(path)?;
    let bytes = self.store.get(path).await?;
    table::decode(format, &bytes)?.into_table()
  }

  /// Copy a fetched table into the local mirror directory, if configured.
  fn mirror(&self, path: &str, table: &Table) {
    let Some(dir) = &self.config.mirror_dir else {
      return;
    };
    if let Err(e) = write_mirror(dir, path, table) {
      warn!(dir = %dir.display(), "Failed to mirror inventory: {}", e);
    }
  }

  /// Upload a submission record and return the path written.
  pub async fn submit(&self, record: &SubmissionRecord) -> Result<String> {
    let path = join_path(&self.config.paths.submissions, &record.file_name());
    let body = record.to_csv()?;
    self
      .store
      .put(&path, body, &record.commit_message())
      .await?;
    info!(path = %path, kind = record.kind.as_str(), rows = record.table.len(), "Submitted");
    Ok(path)
  }

  /// Replace the master inventory with `table`.
  ///
  /// Refused when the remote file no longer matches what this session
  /// loaded. The write carries the version just checked, so a commit that
  /// lands in between is refused by the store too. On success the memo
  /// holds the committed table.
  pub async fn commit_inventory(&self, table: Table) -> Result<CacheResult<Inventory>> {
    let path = self.inventory_path();
    let format = PayloadFormat::from_path(&path)?;
    if format != PayloadFormat::Csv {
      return Err(eyre!("Only a CSV inventory can be committed, not '{}'", path));
    }

    let loaded = self
      .loaded_fingerprint()?
      .ok_or_else(|| eyre!("Load the inventory before committing changes"))?;
    let current = self.store.get_versioned(&path).await?;
    let current_fingerprint = table::decode(format, &current.body)?
      .into_table()?
      .fingerprint()?;
    if current_fingerprint != loaded {
      warn!(path = %path, "Inventory changed on the store since it was loaded");
      return Err(conflict(&path));
    }

    let inventory = Inventory::from_table(table)?;
    let body = inventory.table().to_csv()?;
    let file = path.rsplit('/').next().unwrap_or(&path);
    let message = format!("Update {} by {}", file, self.config.author());
    if let Err(e) = self
      .store
      .replace(&path, body, &message, current.version.as_deref())
      .await
    {
      warn!(path = %path, "Inventory commit refused: {}", e);
      return Err(e);
    }
    info!(path = %path, rows = inventory.len(), "Committed inventory");

    let cached_at = self.inventories.store(&path, inventory.clone())?;
    self.mirror(&path, inventory.table());
    Ok(CacheResult::from_network(inventory, cached_at))
  }

  /// Files in the submissions directory, newest name first.
  pub async fn submissions(&self) -> Result<Vec<RemoteEntry>> {
    let mut entries = self.list_files(&self.config.paths.submissions).await?;
    entries.reverse();
    Ok(entries)
  }

  pub async fn spectra_files(&self) -> Result<Vec<RemoteEntry>> {
    self.list_files(&self.config.paths.spectra).await
  }

  async fn list_files(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
    let mut entries: Vec<RemoteEntry> = self
      .store
      .list(dir)
      .await?
      .into_iter()
      .filter(|e| !e.is_dir)
      .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(dir, count = entries.len(), "Listed directory");
    Ok(entries)
  }

  /// Fetch an instrument data file again, replacing the memoized copy.
  pub async fn reload_spectrum(&self, path: &str) -> Result<CacheResult<InstrumentData>> {
    self.spectra.invalidate(&normalize_path(path))?;
    self.spectrum(path).await
  }

  /// An instrument data file, fetched once per session.
  pub async fn spectrum(&self, path: &str) -> Result<CacheResult<InstrumentData>> {
    let path = normalize_path(path);
    self
      .spectra
      .get_or_fetch(&path, || async {
        let bytes = self.store.get(&path).await?;
        InstrumentData::parse(&bytes).map_err(|e| eyre!("Failed to parse {}: {}", path, e))
      })
      .await
  }
}

fn write_mirror(dir: &Path, path: &str, table: &Table) -> Result<()> {
  let name = path.rsplit('/').next().unwrap_or(path);
  let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
  std::fs::create_dir_all(dir).map_err(|e| eyre!("Failed to create {}: {}", dir.display(), e))?;
  let target = dir.join(format!("{}.csv", stem));
  std::fs::write(&target, table.to_csv()?)
    .map_err(|e| eyre!("Failed to write {}: {}", target.display(), e))?;
  debug!(path = %target.display(), "Mirrored inventory");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use crate::inventory::tests::MASTER_CSV;
  use crate::store::MemoryStore;
  use chrono::{TimeZone, Utc};

  fn config() -> Config {
    Config::from_yaml(
      r#"
store:
  url: https://cloud.example.org/remote.php/dav/files/bea
  username: bea
author: Brian
"#,
    )
    .unwrap()
  }

  fn session() -> Session<MemoryStore> {
    Session::new(config(), MemoryStore::new().with_file("master.csv", MASTER_CSV))
  }

  #[tokio::test]
  async fn test_inventory_has_expected_columns() {
    let session = session();
    let result = session.inventory().await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert!(result.data.missing_columns().is_empty());
    assert_eq!(result.data.table().headers()[0], "SampleCode");
    assert_eq!(result.data.table().headers()[8], "Density ");
  }

  #[tokio::test]
  async fn test_failed_fetch_leaves_no_table() {
    let session = session();
    session.store().fail_on("master.csv");

    let err = session.inventory().await.unwrap_err();
    assert!(err.to_string().contains("500"));
    assert!(session.inventory_cached_at().is_none());
    assert!(session.loaded_fingerprint().unwrap().is_none());

    session.store().recover("master.csv");
    let result = session.inventory().await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(session.store().get_count(), 2);
  }

  #[tokio::test]
  async fn test_commit_then_refetch_is_byte_identical() {
    let session = session();
    let mut table = session.inventory().await.unwrap().data.into_table();
    let ph = table.column_index("pH").unwrap();
    table.set_cell(0, ph, "7.4").unwrap();
    let expected = table.to_csv().unwrap();

    let committed = session.commit_inventory(table).await.unwrap();
    assert_eq!(committed.data.table().to_csv().unwrap(), expected);
    assert_eq!(session.store().file("master.csv").unwrap(), expected);
    assert_eq!(
      session.store().messages(),
      vec![("master.csv".to_string(), "Update master.csv by Brian".to_string())]
    );

    let refetched = session.refresh().await.unwrap();
    assert_eq!(refetched.source, CacheSource::Network);
    assert_eq!(refetched.data.table().to_csv().unwrap(), expected);
  }

  #[tokio::test]
  async fn test_refresh_hits_the_store_again() {
    let session = session();
    session.inventory().await.unwrap();
    let second = session.inventory().await.unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(session.store().get_count(), 1);

    let refreshed = session.refresh().await.unwrap();
    assert_eq!(refreshed.source, CacheSource::Network);
    assert_eq!(session.store().get_count(), 2);
  }

  #[tokio::test]
  async fn test_commit_refused_when_remote_changed() {
    let session = session();
    let table = session.inventory().await.unwrap().data.into_table();

    session
      .store()
      .insert("master.csv", format!("{}BEA009,Oak,,,,,,,,,,,,\n", MASTER_CSV));

    let err = session.commit_inventory(table).await.unwrap_err();
    assert!(err.to_string().contains("Refresh"));
    assert!(session.store().messages().is_empty());
  }

  #[tokio::test]
  async fn test_commit_refused_when_write_races() {
    let session = session();
    let mut table = session.inventory().await.unwrap().data.into_table();
    let ph = table.column_index("pH").unwrap();
    table.set_cell(0, ph, "7.4").unwrap();

    // Another writer lands between the check and the write.
    let racing = format!("{}BEA009,Oak,,,,,,,,,,,,\n", MASTER_CSV);
    session.store().change_after_read("master.csv", racing.clone());

    let err = session.commit_inventory(table).await.unwrap_err();
    assert!(err.to_string().contains("was changed on the store"));
    assert!(session.store().messages().is_empty());
    assert_eq!(session.store().file("master.csv").unwrap(), racing.as_bytes());
  }

  #[tokio::test]
  async fn test_commit_requires_loaded_inventory() {
    let session = session();
    let table = Table::from_csv(MASTER_CSV.as_bytes()).unwrap();
    assert!(session.commit_inventory(table).await.is_err());
  }

  #[tokio::test]
  async fn test_submit_writes_named_record() {
    let session = session();
    let table = session.inventory().await.unwrap().data.into_table();
    let now = Utc.with_ymd_and_hms(2024, 9, 6, 8, 0, 0).unwrap();
    let record = SubmissionRecord::full(table, "Brian", now).unwrap();

    let path = session.submit(&record).await.unwrap();
    assert_eq!(path, "submissions/submission_20240906-080000_Brian.csv");
    assert_eq!(session.store().file(&path).unwrap(), MASTER_CSV.as_bytes());
    assert_eq!(session.store().file("master.csv").unwrap(), MASTER_CSV.as_bytes());

    let listed = session.submissions().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "submission_20240906-080000_Brian.csv");
  }

  #[tokio::test]
  async fn test_spectrum_is_memoized() {
    let session = Session::new(
      config(),
      MemoryStore::new()
        .with_file("spectra/ACBC_IR_20240906_BEA001_1.dpt", "4000\t0.1\n3998\t0.2\n")
        .with_file("spectra/notes/readme.txt", "x"),
    );

    let files = session.spectra_files().await.unwrap();
    assert_eq!(files.len(), 1);

    let first = session.spectrum(&files[0].path).await.unwrap();
    assert_eq!(first.data.len(), 2);
    let second = session.spectrum(&files[0].path).await.unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(session.store().get_count(), 1);
  }

  #[tokio::test]
  async fn test_reload_spectrum_fetches_new_contents() {
    let path = "spectra/ACBC_TGA_20240906_BEA001_1.txt";
    let session = Session::new(config(), MemoryStore::new().with_file(path, "25\t10.0\n"));

    assert_eq!(session.spectrum(path).await.unwrap().data.len(), 1);
    session.store().insert(path, "25\t10.0\n100\t9.2\n");
    assert_eq!(session.spectrum(path).await.unwrap().data.len(), 1);

    let reloaded = session.reload_spectrum(&format!("/{}", path)).await.unwrap();
    assert_eq!(reloaded.source, CacheSource::Network);
    assert_eq!(reloaded.data.len(), 2);
    assert_eq!(session.store().get_count(), 2);
  }

  #[tokio::test]
  async fn test_inventory_is_mirrored() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.mirror_dir = Some(dir.path().join("mirror"));
    let session = Session::new(config, MemoryStore::new().with_file("master.csv", MASTER_CSV));

    session.inventory().await.unwrap();
    let mirrored = std::fs::read(dir.path().join("mirror").join("master.csv")).unwrap();
    assert_eq!(mirrored, MASTER_CSV.as_bytes());
  }
}
