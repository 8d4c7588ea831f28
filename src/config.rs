use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub store: StoreConfig,
  /// Name recorded in submission file names and commit messages
  pub author: Option<String>,
  /// Custom title for the header (defaults to "AC/BC")
  pub title: Option<String>,
  #[serde(default)]
  pub paths: PathsConfig,
  /// Local directory that receives a CSV copy of every fetched inventory
  pub mirror_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
  /// NextCloud (or any WebDAV) share
  #[default]
  WebDav,
  /// Forgejo / Gitea repository, written through the contents API
  Forgejo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  #[serde(default)]
  pub kind: StoreKind,
  /// WebDAV: the share root. Forgejo: the instance root.
  pub url: String,
  pub username: String,
  /// Repository owner (forgejo only)
  pub owner: Option<String>,
  /// Repository name (forgejo only)
  pub repo: Option<String>,
  #[serde(default = "default_branch")]
  pub branch: String,
}

fn default_branch() -> String {
  "main".to_string()
}

/// Remote locations, relative to the store root.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
  #[serde(default = "default_inventory")]
  pub inventory: String,
  #[serde(default = "default_submissions")]
  pub submissions: String,
  #[serde(default = "default_spectra")]
  pub spectra: String,
}

fn default_inventory() -> String {
  "master.csv".to_string()
}

fn default_submissions() -> String {
  "submissions".to_string()
}

fn default_spectra() -> String {
  "spectra".to_string()
}

impl Default for PathsConfig {
  fn default() -> Self {
    Self {
      inventory: default_inventory(),
      submissions: default_submissions(),
      spectra: default_spectra(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./acbc.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/acbc/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/acbc/config.yaml\n\
                 or acbc.yaml in the current directory."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("acbc.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("acbc").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to load config file {}: {}", path.display(), e))
  }

  /// Parse and validate a YAML document.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    url::Url::parse(&self.store.url)
      .map_err(|e| eyre!("Invalid store url '{}': {}", self.store.url, e))?;

    if self.store.kind == StoreKind::Forgejo {
      if self.store.owner.is_none() {
        return Err(eyre!("store.owner is required for a forgejo store"));
      }
      if self.store.repo.is_none() {
        return Err(eyre!("store.repo is required for a forgejo store"));
      }
    }

    Ok(())
  }

  /// Author name, falling back to the store username.
  pub fn author(&self) -> &str {
    self.author.as_deref().unwrap_or(&self.store.username)
  }

  /// Get the store password or token from environment variables.
  ///
  /// Checks ACBC_STORE_PASSWORD first, then ACBC_STORE_TOKEN as fallback.
  pub fn store_password() -> Result<String> {
    std::env::var("ACBC_STORE_PASSWORD")
      .or_else(|_| std::env::var("ACBC_STORE_TOKEN"))
      .map_err(|_| {
        eyre!(
          "Store password not found. \
           Set ACBC_STORE_PASSWORD or ACBC_STORE_TOKEN environment variable."
        )
      })
  }

  /// Get the dashboard password from environment variables.
  ///
  /// Checks ACBC_DASHBOARD_PASSWORD, then falls back to the store password.
  pub fn dashboard_password() -> Result<String> {
    std::env::var("ACBC_DASHBOARD_PASSWORD").or_else(|_| Self::store_password())
  }
}
