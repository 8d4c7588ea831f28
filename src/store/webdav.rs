//! WebDAV share (NextCloud) backend.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{header, Method, StatusCode};
use tracing::{debug, info};
use url::Url;

use super::{
  conflict, host_of, normalize_path, path_segments, RemoteEntry, RemoteStore, Versioned,
};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
  </d:prop>
</d:propfind>"#;

/// Client for a WebDAV share using basic auth.
#[derive(Clone)]
pub struct WebDavStore {
  http: reqwest::Client,
  base: Url,
  username: String,
  password: String,
}

impl WebDavStore {
  pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
    let base =
      Url::parse(base_url).map_err(|e| eyre!("Invalid WebDAV url '{}': {}", base_url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Invalid WebDAV url '{}': not a hierarchical url", base_url));
    }

    let http = reqwest::Client::builder()
      .user_agent(concat!("acbc/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      username: username.to_string(),
      password: password.to_string(),
    })
  }

  /// Absolute URL of a store path. Directories get a trailing slash.
  fn url_for(&self, path: &str, directory: bool) -> Result<Url> {
    let mut url = self.base.clone();
    {
      let mut segments = url
        .path_segments_mut()
        .map_err(|_| eyre!("Invalid WebDAV url '{}'", self.base))?;
      segments.pop_if_empty();
      for segment in path_segments(path) {
        segments.push(segment);
      }
      if directory {
        segments.push("");
      }
    }
    Ok(url)
  }

  async fn send(
    &self,
    method: Method,
    path: &str,
    request: reqwest::RequestBuilder,
  ) -> Result<reqwest::Response> {
    let response = request
      .basic_auth(&self.username, Some(&self.password))
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach {}: {}", self.describe(), e))?;

    let status = response.status();
    debug!(%method, path, %status, "webdav request");

    // Only conditional writes send If-Match
    if status == StatusCode::PRECONDITION_FAILED {
      return Err(conflict(path));
    }
    if !status.is_success() {
      return Err(eyre!("{} {} failed: {}", method, path, status));
    }
    Ok(response)
  }
}

impl RemoteStore for WebDavStore {
  async fn get(&self, path: &str) -> Result<Vec<u8>> {
    let url = self.url_for(path, false)?;
    let response = self.send(Method::GET, path, self.http.get(url)).await?;

    let bytes = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read {}: {}", path, e))?;
    Ok(bytes.to_vec())
  }

  async fn put(&self, path: &str, body: Vec<u8>, message: &str) -> Result<()> {
    let url = self.url_for(path, false)?;
    let size = body.len();
    self
      .send(Method::PUT, path, self.http.put(url).body(body))
      .await?;

    info!(path, size, message, "uploaded file");
    Ok(())
  }

  async fn get_versioned(&self, path: &str) -> Result<Versioned> {
    let url = self.url_for(path, false)?;
    let response = self.send(Method::GET, path, self.http.get(url)).await?;
    let version = etag(response.headers());

    let bytes = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read {}: {}", path, e))?;
    Ok(Versioned {
      body: bytes.to_vec(),
      version,
    })
  }

  async fn replace(
    &self,
    path: &str,
    body: Vec<u8>,
    message: &str,
    version: Option<&str>,
  ) -> Result<()> {
    let Some(etag) = version else {
      return self.put(path, body, message).await;
    };
    let url = self.url_for(path, false)?;
    let size = body.len();
    let request = self.http.put(url).header(header::IF_MATCH, etag).body(body);
    self.send(Method::PUT, path, request).await?;

    info!(path, size, message, "replaced file");
    Ok(())
  }

  async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
    let url = self.url_for(dir, true)?;
    let method = Method::from_bytes(b"PROPFIND").map_err(|e| eyre!("Invalid method: {}", e))?;

    let request = self
      .http
      .request(method.clone(), url)
      .header("Depth", "1")
      .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
      .body(PROPFIND_BODY);

    let response = self.send(method, dir, request).await?;
    if response.status() != StatusCode::MULTI_STATUS {
      return Err(eyre!(
        "PROPFIND {} returned {} instead of a multistatus",
        dir,
        response.status()
      ));
    }

    let xml = response
      .text()
      .await
      .map_err(|e| eyre!("Failed to read listing of {}: {}", dir, e))?;

    parse_multistatus(&xml, self.base.path(), dir)
  }

  fn describe(&self) -> String {
    host_of(&self.base)
  }
}

/// Strong or weak ETag as sent by the server, quotes included.
fn etag(headers: &header::HeaderMap) -> Option<String> {
  headers
    .get(header::ETAG)
    .and_then(|value| value.to_str().ok())
    .map(str::to_string)
}

#[derive(Default)]
struct PendingEntry {
  href: String,
  size: Option<u64>,
  modified: Option<DateTime<Utc>>,
  is_dir: bool,
}

#[derive(Clone, Copy)]
enum Field {
  Href,
  Length,
  Modified,
}

/// Parse a PROPFIND multistatus body into entries relative to the share root.
///
/// `base_path` is the (encoded) path of the share root, `dir` the listed
/// directory; the entry for `dir` itself is dropped.
pub fn parse_multistatus(xml: &str, base_path: &str, dir: &str) -> Result<Vec<RemoteEntry>> {
  let base_path = decode_href(base_path)?;
  let base_path = normalize_path(&base_path);
  let dir = normalize_path(dir);

  let mut reader = Reader::from_str(xml);
  reader.config_mut().trim_text(true);

  let mut pending: Vec<PendingEntry> = Vec::new();
  let mut current: Option<PendingEntry> = None;
  let mut field: Option<Field> = None;

  loop {
    match reader.read_event() {
      Ok(Event::Start(e)) => match e.local_name().as_ref() {
        b"response" => current = Some(PendingEntry::default()),
        b"href" => field = Some(Field::Href),
        b"getcontentlength" => field = Some(Field::Length),
        b"getlastmodified" => field = Some(Field::Modified),
        b"collection" => {
          if let Some(entry) = current.as_mut() {
            entry.is_dir = true;
          }
        }
        _ => {}
      },
      Ok(Event::Empty(e)) => {
        if e.local_name().as_ref() == b"collection" {
          if let Some(entry) = current.as_mut() {
            entry.is_dir = true;
          }
        }
      }
      Ok(Event::Text(t)) => {
        if let (Some(entry), Some(f)) = (current.as_mut(), field) {
          let text = t
            .unescape()
            .map_err(|e| eyre!("Failed to parse PROPFIND response: {}", e))?;
          match f {
            Field::Href => entry.href = text.into_owned(),
            Field::Length => entry.size = text.trim().parse().ok(),
            Field::Modified => {
              entry.modified = DateTime::parse_from_rfc2822(text.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
            }
          }
        }
      }
      Ok(Event::End(e)) => match e.local_name().as_ref() {
        b"response" => {
          if let Some(entry) = current.take() {
            pending.push(entry);
          }
        }
        b"href" | b"getcontentlength" | b"getlastmodified" => field = None,
        _ => {}
      },
      Ok(Event::Eof) => break,
      Err(e) => {
        return Err(eyre!(
          "Failed to parse PROPFIND response at {}: {}",
          reader.error_position(),
          e
        ))
      }
      _ => {}
    }
  }

  let mut entries = Vec::new();
  for entry in pending {
    let href_path = match Url::parse(&entry.href) {
      Ok(url) => url.path().to_string(),
      Err(_) => entry.href.clone(),
    };
    let decoded = normalize_path(&decode_href(&href_path)?);
    let relative = decoded
      .strip_prefix(&base_path)
      .map(normalize_path)
      .unwrap_or(decoded.clone());

    if relative == dir {
      continue;
    }

    let name = relative.rsplit('/').next().unwrap_or_default().to_string();
    entries.push(RemoteEntry {
      name,
      path: relative,
      size: entry.size,
      modified: entry.modified,
      is_dir: entry.is_dir,
    });
  }

  entries.sort_by(|a, b| a.name.cmp(&b.name));
  Ok(entries)
}

fn decode_href(href: &str) -> Result<String> {
  urlencoding::decode(href)
    .map(|s| s.into_owned())
    .map_err(|e| eyre!("Invalid href '{}': {}", href, e))
}
