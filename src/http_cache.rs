use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{
    ETAG, HeaderMap, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "pl_predictions";
const CACHE_FILE: &str = "http_cache.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HttpCacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

pub struct ResponseCache {
    path: Option<PathBuf>,
    loaded: Mutex<Option<HttpCacheFile>>,
}

impl ResponseCache {
    pub fn at(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            loaded: Mutex::new(None),
        }
    }

    pub fn default_location() -> Self {
        match app_cache_dir() {
            Some(dir) => Self::at(dir.join(CACHE_FILE)),
            None => Self::disabled(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            loaded: Mutex::new(None),
        }
    }

    pub fn fetch_json(
        &self,
        client: &Client,
        url: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<String> {
        let cached_entry = self.lookup(url)?;

        let mut req = client.get(url);
        for (name, value) in extra_headers {
            req = req.header(*name, *value);
        }
        if let Some(entry) = cached_entry.as_ref() {
            if let Some(etag) = entry.etag.as_ref() {
                req = req.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = entry.last_modified.as_ref() {
                req = req.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let resp = req.send().context("request failed")?;
        let status = resp.status();
        let headers = resp.headers().clone();
        if status == StatusCode::NOT_MODIFIED {
            let Some(entry) = cached_entry else {
                return Err(anyhow!("received 304 without cache body"));
            };
            debug!(url, "served from response cache");
            return Ok(entry.body);
        }

        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow!("http {}: {}", status, body));
        }

        let etag = header_text(&headers, ETAG);
        let last_modified = header_text(&headers, LAST_MODIFIED);
        if etag.is_some() || last_modified.is_some() {
            self.store(
                url,
                CacheEntry {
                    body: body.clone(),
                    etag,
                    last_modified,
                    fetched_at: system_time_to_secs(SystemTime::now()).unwrap_or_default(),
                },
            )?;
        }
        Ok(body)
    }

    fn lookup(&self, url: &str) -> Result<Option<CacheEntry>> {
        let Some(path) = self.path.as_ref() else {
            return Ok(None);
        };
        let mut guard = self
            .loaded
            .lock()
            .map_err(|_| anyhow!("http cache lock poisoned"))?;
        let cache = guard.get_or_insert_with(|| load_cache_file(path));
        Ok(cache.entries.get(url).cloned())
    }

    fn store(&self, url: &str, entry: CacheEntry) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let mut guard = self
            .loaded
            .lock()
            .map_err(|_| anyhow!("http cache lock poisoned"))?;
        let cache = guard.get_or_insert_with(|| load_cache_file(path));
        cache.version = CACHE_VERSION;
        cache.entries.insert(url.to_string(), entry);
        if let Err(err) = save_cache_file(path, cache) {
            // A cache that cannot be written only costs a refetch next time.
            debug!(error = %err, "http cache not saved");
        }
        Ok(())
    }
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn load_cache_file(path: &Path) -> HttpCacheFile {
    let Ok(raw) = fs::read_to_string(path) else {
        return HttpCacheFile::default();
    };
    let cache = serde_json::from_str::<HttpCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return HttpCacheFile::default();
    }
    cache
}

fn save_cache_file(path: &Path, cache: &HttpCacheFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize http cache")?;
    fs::write(&tmp, json).context("write http cache")?;
    fs::rename(&tmp, path).context("swap http cache")?;
    Ok(())
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}
