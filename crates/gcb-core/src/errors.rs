/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type. Resolution failures are
/// not represented here: they are classified into `resolver::ResolutionResult` and always
/// end up as a chat reply.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("update fetch failed: {0}")]
    TransportFetch(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
