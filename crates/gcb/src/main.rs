use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use gcb_core::{config::Config, logging, templates::TemplateStore};
use gcb_geocaching::GeocachingClient;

#[tokio::main]
async fn main() -> Result<(), gcb_core::Error> {
    logging::init("gcb")?;

    let cfg = Arc::new(logging::fatal(Config::load(), "invalid configuration")?);

    let templates = TemplateStore::from_paths(&cfg.template_paths);
    for (name, path) in templates.missing_files() {
        // Not fatal: files are read on every render and may appear later.
        tracing::warn!(template = %name, path = %path.display(), "template file not found");
    }

    let provider = Arc::new(logging::fatal(
        GeocachingClient::new(&cfg.provider),
        "failed to set up data provider client",
    )?);
    tracing::info!(
        base_url = %cfg.provider.base_url,
        authenticated = cfg.provider.credentials().is_some(),
        "data provider configured"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                cancel.cancel();
            }
        });
    }

    // Startup failures (getMe, bind, setWebhook) come back here with their context chain.
    let outcome = gcb_telegram::router::run(cfg, provider, Arc::new(templates), cancel)
        .await
        .map_err(|e| gcb_core::Error::External(format!("{e:#}")));
    logging::fatal(outcome, "telegram bot failed")?;

    Ok(())
}
