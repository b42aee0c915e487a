//! Data-provider port and the typed records it returns.

use async_trait::async_trait;

/// Failure taxonomy of the data provider.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("not found")]
    NotFound,

    #[error("an authenticated session is required")]
    AuthRequired,

    #[error("{0}")]
    Other(String),
}

/// Difficulty / terrain value: 0.0–5.0 in steps of 0.5.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Rating(f32);

impl Rating {
    pub fn new(value: f32) -> Option<Self> {
        let doubled = value * 2.0;
        if !(0.0..=5.0).contains(&value) || doubled.fract() != 0.0 {
            return None;
        }
        Some(Self(value))
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CacheRecord {
    pub cache_type: String,
    pub code: String,
    pub name: String,
    pub size: String,
    pub favorites: u32,
    pub difficulty: Rating,
    pub terrain: Rating,
    pub location: Option<Location>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackableRecord {
    pub trackable_type: String,
    pub id: String,
    pub name: String,
    pub owner: String,
    /// Free-text description of where the trackable currently is.
    pub location: String,
}

/// Hexagonal port for the geocaching data provider.
///
/// Implementations are shared across concurrent webhook calls, so they must be safe for
/// concurrent use (or serialize internally).
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// `code` is already normalized to upper case.
    async fn resolve_cache(&self, code: &str) -> Result<CacheRecord, ProviderError>;

    /// `code` is already normalized to upper case.
    async fn resolve_trackable(&self, code: &str) -> Result<TrackableRecord, ProviderError>;
}
