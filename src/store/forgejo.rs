//! Forgejo (Gitea-compatible) repository backend.
//!
//! Files are read and written through the repository contents API, so every
//! write becomes a commit on the configured branch.

use base64::{engine::general_purpose, Engine as _};
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{conflict, host_of, normalize_path, path_segments, RemoteEntry, RemoteStore, Versioned};

/// Client for one repository on a Forgejo instance.
#[derive(Clone)]
pub struct ForgejoStore {
  http: reqwest::Client,
  base: Url,
  owner: String,
  repo: String,
  branch: String,
  username: String,
  token: String,
}

// ============================================================================
// Contents API types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiContent {
  name: String,
  path: String,
  #[serde(rename = "type")]
  kind: String,
  #[serde(default)]
  size: Option<u64>,
  sha: String,
  content: Option<String>,
  encoding: Option<String>,
}

/// The contents endpoint answers with an object for files and an array for
/// directories.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiContentsResponse {
  File(ApiContent),
  Dir(Vec<ApiContent>),
}

#[derive(Debug, Serialize)]
struct ApiWriteFile<'a> {
  content: String,
  message: &'a str,
  branch: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  sha: Option<&'a str>,
}

impl ForgejoStore {
  pub fn new(
    base_url: &str,
    owner: &str,
    repo: &str,
    branch: &str,
    username: &str,
    token: &str,
  ) -> Result<Self> {
    let base =
      Url::parse(base_url).map_err(|e| eyre!("Invalid Forgejo url '{}': {}", base_url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Invalid Forgejo url '{}': not a hierarchical url", base_url));
    }

    let http = reqwest::Client::builder()
      .user_agent(concat!("acbc/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      owner: owner.to_string(),
      repo: repo.to_string(),
      branch: branch.to_string(),
      username: username.to_string(),
      token: token.to_string(),
    })
  }

  /// `/api/v1/repos/{owner}/{repo}/contents/{path}`
  fn contents_url(&self, path: &str) -> Result<Url> {
    let mut url = self.base.clone();
    {
      let mut segments = url
        .path_segments_mut()
        .map_err(|_| eyre!("Invalid Forgejo url '{}'", self.base))?;
      segments.pop_if_empty();
      segments.extend([
        "api",
        "v1",
        "repos",
        self.owner.as_str(),
        self.repo.as_str(),
        "contents",
      ]);
      for segment in path_segments(path) {
        segments.push(segment);
      }
    }
    Ok(url)
  }

  /// Fetch the contents endpoint. `Ok(None)` when the path does not exist.
  async fn fetch_contents(&self, path: &str) -> Result<Option<ApiContentsResponse>> {
    let mut url = self.contents_url(path)?;
    url.query_pairs_mut().append_pair("ref", &self.branch);

    let response = self
      .http
      .get(url)
      .basic_auth(&self.username, Some(&self.token))
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", self.describe(), e))?;

    let status = response.status();
    debug!(method = "GET", path, %status, "forgejo request");

    if status == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !status.is_success() {
      return Err(eyre!("GET {} failed: {}", path, status));
    }

    let bytes = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read {}: {}", path, e))?;
    parse_contents(&bytes).map(Some)
  }

  /// Create with POST, or update with PUT and the blob sha being replaced.
  async fn write(&self, path: &str, body: Vec<u8>, message: &str, sha: Option<&str>) -> Result<()> {
    let method = if sha.is_some() { Method::PUT } else { Method::POST };
    let payload = ApiWriteFile {
      content: general_purpose::STANDARD.encode(&body),
      message,
      branch: &self.branch,
      sha,
    };

    let url = self.contents_url(path)?;
    let response = self
      .http
      .request(method.clone(), url)
      .basic_auth(&self.username, Some(&self.token))
      .json(&payload)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", self.describe(), e))?;

    let status = response.status();
    debug!(%method, path, %status, "forgejo request");
    if is_stale_sha(sha, status) {
      return Err(conflict(path));
    }
    if !status.is_success() {
      return Err(eyre!("{} {} failed: {}", method, path, status));
    }

    info!(path, size = body.len(), message, "committed file");
    Ok(())
  }
}

/// Forgejo answers an update carrying an outdated sha with 409 or 422.
fn is_stale_sha(sha: Option<&str>, status: StatusCode) -> bool {
  sha.is_some() && matches!(status, StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY)
}

impl RemoteStore for ForgejoStore {
  async fn get(&self, path: &str) -> Result<Vec<u8>> {
    match self.fetch_contents(path).await? {
      Some(ApiContentsResponse::File(file)) => decode_content(&file),
      Some(ApiContentsResponse::Dir(_)) => Err(eyre!("{} is a directory", path)),
      None => Err(eyre!("GET {} failed: {}", path, StatusCode::NOT_FOUND)),
    }
  }

  async fn put(&self, path: &str, body: Vec<u8>, message: &str) -> Result<()> {
    let existing_sha = match self.fetch_contents(path).await? {
      Some(ApiContentsResponse::File(file)) => Some(file.sha),
      Some(ApiContentsResponse::Dir(_)) => return Err(eyre!("{} is a directory", path)),
      None => None,
    };
    self.write(path, body, message, existing_sha.as_deref()).await
  }

  async fn get_versioned(&self, path: &str) -> Result<Versioned> {
    match self.fetch_contents(path).await? {
      Some(ApiContentsResponse::File(file)) => Ok(Versioned {
        body: decode_content(&file)?,
        version: Some(file.sha),
      }),
      Some(ApiContentsResponse::Dir(_)) => Err(eyre!("{} is a directory", path)),
      None => Err(eyre!("GET {} failed: {}", path, StatusCode::NOT_FOUND)),
    }
  }

  async fn replace(
    &self,
    path: &str,
    body: Vec<u8>,
    message: &str,
    version: Option<&str>,
  ) -> Result<()> {
    match version {
      // The forge checks the sha against the branch head and refuses stale writes
      Some(sha) => self.write(path, body, message, Some(sha)).await,
      None => self.put(path, body, message).await,
    }
  }

  async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
    match self.fetch_contents(dir).await? {
      Some(ApiContentsResponse::Dir(items)) => Ok(into_entries(items)),
      Some(ApiContentsResponse::File(_)) => Err(eyre!("{} is not a directory", dir)),
      None => Err(eyre!("GET {} failed: {}", dir, StatusCode::NOT_FOUND)),
    }
  }

  fn describe(&self) -> String {
    format!("{}/{}/{}", host_of(&self.base), self.owner, self.repo)
  }
}

fn parse_contents(bytes: &[u8]) -> Result<ApiContentsResponse> {
  serde_json::from_slice(bytes).map_err(|e| eyre!("Failed to parse contents response: {}", e))
}

/// Decode the base64 payload of a file entry. Forgejo wraps the encoded
/// text in newlines.
fn decode_content(file: &ApiContent) -> Result<Vec<u8>> {
  if let Some(encoding) = file.encoding.as_deref() {
    if encoding != "base64" {
      return Err(eyre!("Unsupported encoding '{}' for {}", encoding, file.path));
    }
  }

  let content = file
    .content
    .as_deref()
    .ok_or_else(|| eyre!("No content returned for {}", file.path))?;
  let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();

  general_purpose::STANDARD
    .decode(compact)
    .map_err(|e| eyre!("Failed to decode {}: {}", file.path, e))
}

fn into_entries(items: Vec<ApiContent>) -> Vec<RemoteEntry> {
  let mut entries: Vec<RemoteEntry> = items
    .into_iter()
    .map(|item| RemoteEntry {
      is_dir: item.kind == "dir",
      size: if item.kind == "dir" { None } else { item.size },
      name: item.name,
      path: normalize_path(&item.path),
      modified: None,
    })
    .collect();
  entries.sort_by(|a, b| a.name.cmp(&b.name));
  entries
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> ForgejoStore {
    ForgejoStore::new(
      "https://forge.example.org/",
      "acbc",
      "datalog",
      "main",
      "brian",
      "token",
    )
    .unwrap()
  }

  #[test]
  fn test_contents_url() {
    let url = store().contents_url("/datalog/master.csv").unwrap();
    assert_eq!(
      url.as_str(),
      "https://forge.example.org/api/v1/repos/acbc/datalog/contents/datalog/master.csv"
    );
  }

  #[test]
  fn test_decode_file_with_wrapped_base64() {
    let body = br#"{
      "name": "master.csv",
      "path": "datalog/master.csv",
      "type": "file",
      "size": 26,
      "sha": "3b18e512dba79e4c8300dd08aeb37f8e728b8dad",
      "encoding": "base64",
      "content": "U2FtcGxlQ29kZSxwSApC\nRUEwMDEsNy4yCg=="
    }"#;

    let file = match parse_contents(body).unwrap() {
      ApiContentsResponse::File(file) => file,
      ApiContentsResponse::Dir(_) => panic!("expected a file"),
    };
    assert_eq!(file.sha, "3b18e512dba79e4c8300dd08aeb37f8e728b8dad");
    assert_eq!(decode_content(&file).unwrap(), b"SampleCode,pH\nBEA001,7.2\n");
  }

  #[test]
  fn test_directory_listing() {
    let body = br#"[
      {"name": "spectra", "path": "spectra", "type": "dir", "size": 0, "sha": "a"},
      {"name": "master.csv", "path": "master.csv", "type": "file", "size": 120, "sha": "b"}
    ]"#;

    let items = match parse_contents(body).unwrap() {
      ApiContentsResponse::Dir(items) => items,
      ApiContentsResponse::File(_) => panic!("expected a directory"),
    };
    let entries = into_entries(items);

    assert_eq!(entries[0].name, "master.csv");
    assert_eq!(entries[0].size, Some(120));
    assert!(!entries[0].is_dir);
    assert_eq!(entries[1].name, "spectra");
    assert!(entries[1].is_dir);
    assert_eq!(entries[1].size, None);
  }

  #[test]
  fn test_write_body_omits_sha_on_create() {
    let payload = ApiWriteFile {
      content: "YQ==".to_string(),
      message: "Add full submission by Brian",
      branch: "main",
      sha: None,
    };
    let json = serde_json::to_value(&payload).unwrap();
    assert!(json.get("sha").is_none());
    assert_eq!(json["branch"], "main");
  }

  #[test]
  fn test_write_body_carries_expected_sha() {
    let payload = ApiWriteFile {
      content: "YQ==".to_string(),
      message: "Update master.csv by Brian",
      branch: "main",
      sha: Some("3b18e512dba79e4c8300dd08aeb37f8e728b8dad"),
    };
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["sha"], "3b18e512dba79e4c8300dd08aeb37f8e728b8dad");
  }

  #[test]
  fn test_stale_sha_rejections() {
    assert!(is_stale_sha(Some("abc"), StatusCode::CONFLICT));
    assert!(is_stale_sha(Some("abc"), StatusCode::UNPROCESSABLE_ENTITY));
    assert!(!is_stale_sha(Some("abc"), StatusCode::FORBIDDEN));
    assert!(!is_stale_sha(None, StatusCode::UNPROCESSABLE_ENTITY));
  }

  #[test]
  fn test_describe() {
    assert_eq!(store().describe(), "forge.example.org/acbc/datalog");
  }
}
