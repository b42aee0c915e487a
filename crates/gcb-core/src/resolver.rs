//! Identifier resolution: provider lookup + failure classification + rendering.

use std::{sync::Arc, time::Duration};

use crate::{
    formatting::{escape_html, star_rating},
    matcher::IdentifierKind,
    provider::{CacheRecord, DataProvider, ProviderError, TrackableRecord},
    templates::{TemplateFields, TemplateName, TemplateRenderer},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    NotAuthorized,
    TransientError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionResult {
    /// Rendered reply, ready to send.
    Success(String),
    Failure { kind: FailureKind, detail: String },
}

impl ResolutionResult {
    fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            detail: detail.into(),
        }
    }

    /// The chat reply for this result. `code` is the normalized identifier.
    pub fn into_reply(self, kind: IdentifierKind, code: &str) -> String {
        let code = escape_html(code);
        match self {
            ResolutionResult::Success(text) => text,
            ResolutionResult::Failure {
                kind: FailureKind::NotAuthorized,
                ..
            } => format!(
                "{code}: for {}s, the bot needs to be logged in to the geocaching service",
                kind.label()
            ),
            ResolutionResult::Failure {
                kind: FailureKind::NotFound,
                ..
            } => format!("{code}: could not be found. Does it really exist?"),
            ResolutionResult::Failure {
                kind: FailureKind::TransientError,
                detail,
            } => format!("{code}: lookup failed ({})", escape_html(&detail)),
        }
    }
}

impl From<ProviderError> for ResolutionResult {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotFound => Self::failure(FailureKind::NotFound, e.to_string()),
            ProviderError::AuthRequired => {
                Self::failure(FailureKind::NotAuthorized, e.to_string())
            }
            ProviderError::Other(detail) => Self::failure(FailureKind::TransientError, detail),
        }
    }
}

/// Resolves one identifier against the data provider. Never retries.
pub struct Resolver {
    provider: Arc<dyn DataProvider>,
    renderer: Arc<dyn TemplateRenderer>,
    timeout: Duration,
}

impl Resolver {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        renderer: Arc<dyn TemplateRenderer>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            renderer,
            timeout,
        }
    }

    /// Upper-case form used for provider calls and replies. Grammars only match ASCII.
    pub fn normalize(raw: &str) -> String {
        raw.to_ascii_uppercase()
    }

    pub async fn resolve(&self, kind: IdentifierKind, raw: &str) -> ResolutionResult {
        let code = Self::normalize(raw);
        tracing::info!(kind = %kind, code = %code, "resolving identifier");

        let lookup = async {
            match kind {
                IdentifierKind::Cache => self
                    .provider
                    .resolve_cache(&code)
                    .await
                    .map(|c| self.render_cache(&c)),
                IdentifierKind::Trackable => self
                    .provider
                    .resolve_trackable(&code)
                    .await
                    .map(|t| self.render_trackable(&t)),
            }
        };

        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(text)) => ResolutionResult::Success(text),
            Ok(Err(e)) => {
                tracing::warn!(kind = %kind, code = %code, error = %e, "resolution failed");
                e.into()
            }
            Err(_) => {
                tracing::warn!(kind = %kind, code = %code, timeout = ?self.timeout, "resolution timed out");
                ResolutionResult::failure(
                    FailureKind::TransientError,
                    format!("timed out after {}s", self.timeout.as_secs_f32()),
                )
            }
        }
    }

    fn render_cache(&self, c: &CacheRecord) -> String {
        let fields = TemplateFields::new()
            .with("type", c.cache_type.as_str())
            .with("code", c.code.as_str())
            .with("name", c.name.as_str())
            .with("size", c.size.as_str())
            .with("favorites", c.favorites.to_string())
            .with("diff", star_rating(c.difficulty.value()))
            .with("terrain", star_rating(c.terrain.value()));
        self.renderer.render(TemplateName::CacheQuick, &fields)
    }

    fn render_trackable(&self, t: &TrackableRecord) -> String {
        let fields = TemplateFields::new()
            .with("type", t.trackable_type.as_str())
            .with("code", t.id.as_str())
            .with("name", t.name.as_str())
            .with("owner", t.owner.as_str())
            .with("location", t.location.as_str());
        self.renderer.render(TemplateName::Trackable, &fields)
    }
}
