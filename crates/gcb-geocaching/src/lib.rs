//! Geocaching data-provider adapter.
//!
//! Speaks a small JSON API:
//! - `GET {base}/geocache/{CODE}` → `{type, code, name, size, favorites, difficulty, terrain, location?}`
//! - `GET {base}/trackable/{CODE}` → `{type, tid, name, owner, location}`

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};

use gcb_core::{
    config::ProviderConfig,
    errors::Error,
    provider::{CacheRecord, DataProvider, Location, ProviderError, Rating, TrackableRecord},
    Result,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct GeocachingClient {
    base_url: String,
    credentials: Option<(String, String)>,
    http: reqwest::Client,
}

impl GeocachingClient {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::External(format!("provider http client: {e}")))?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            credentials: cfg
                .credentials()
                .map(|(u, p)| (u.to_string(), p.to_string())),
            http,
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        resource: &str,
        code: &str,
    ) -> std::result::Result<T, ProviderError> {
        let url = format!("{}/{resource}/{code}", self.base_url);
        let mut req = self.http.get(&url);
        if let Some((user, pass)) = &self.credentials {
            req = req.basic_auth(user, Some(pass));
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Other("provider request timed out".to_string())
            } else {
                ProviderError::Other(format!("provider request failed: {e}"))
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(resource, code, status = status.as_u16(), "provider returned an error status");
            return Err(classify_status(status));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::Other(format!("provider body read failed: {e}")))?;
        serde_json::from_slice(&body)
            .map_err(|e| ProviderError::Other(format!("malformed provider response: {e}")))
    }
}

fn classify_status(status: reqwest::StatusCode) -> ProviderError {
    match status.as_u16() {
        404 => ProviderError::NotFound,
        401 | 403 => ProviderError::AuthRequired,
        _ => ProviderError::Other(format!("provider returned HTTP {}", status.as_u16())),
    }
}

#[derive(Debug, Deserialize)]
struct CacheWire {
    #[serde(rename = "type")]
    cache_type: String,
    code: String,
    name: String,
    size: String,
    favorites: u32,
    difficulty: f32,
    terrain: f32,
    #[serde(default)]
    location: Option<LocationWire>,
}

#[derive(Debug, Deserialize)]
struct LocationWire {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct TrackableWire {
    #[serde(rename = "type")]
    trackable_type: String,
    tid: String,
    name: String,
    owner: String,
    location: String,
}

fn rating(field: &str, value: f32) -> std::result::Result<Rating, ProviderError> {
    Rating::new(value)
        .ok_or_else(|| ProviderError::Other(format!("invalid {field} rating {value}")))
}

/// Shape checks that serde alone cannot express. An answer for a different code or without
/// a name is treated as "no such object".
fn cache_record(code: &str, w: CacheWire) -> std::result::Result<CacheRecord, ProviderError> {
    if !w.code.eq_ignore_ascii_case(code) || w.name.trim().is_empty() {
        return Err(ProviderError::NotFound);
    }
    Ok(CacheRecord {
        difficulty: rating("difficulty", w.difficulty)?,
        terrain: rating("terrain", w.terrain)?,
        cache_type: w.cache_type,
        code: w.code.to_uppercase(),
        name: w.name,
        size: w.size,
        favorites: w.favorites,
        location: w.location.map(|l| Location {
            latitude: l.latitude,
            longitude: l.longitude,
        }),
    })
}

fn trackable_record(
    code: &str,
    w: TrackableWire,
) -> std::result::Result<TrackableRecord, ProviderError> {
    if !w.tid.eq_ignore_ascii_case(code) || w.name.trim().is_empty() {
        return Err(ProviderError::NotFound);
    }
    Ok(TrackableRecord {
        trackable_type: w.trackable_type,
        id: w.tid.to_uppercase(),
        name: w.name,
        owner: w.owner,
        location: w.location,
    })
}

#[async_trait]
impl DataProvider for GeocachingClient {
    async fn resolve_cache(&self, code: &str) -> std::result::Result<CacheRecord, ProviderError> {
        let wire: CacheWire = self.fetch("geocache", code).await?;
        cache_record(code, wire)
    }

    async fn resolve_trackable(
        &self,
        code: &str,
    ) -> std::result::Result<TrackableRecord, ProviderError> {
        let wire: TrackableWire = self.fetch("trackable", code).await?;
        trackable_record(code, wire)
    }
}
