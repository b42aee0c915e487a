use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use teloxide::prelude::*;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use gcb_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use gcb_core::{
    config::{Config, Delivery, WebhookConfig},
    dispatch::Dispatcher,
    intake::{PollingIntake, PushIntake},
    messaging::port::MessagingPort,
    provider::DataProvider,
    resolver::Resolver,
    templates::TemplateRenderer,
};

use crate::{
    updates::TelegramUpdates,
    webhook::{self, WebhookState},
    TelegramMessenger,
};

/// Slack on top of the long-poll timeout before the HTTP client gives up.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(15);

/// Start the bot with the configured delivery model and run until `cancel` fires.
pub async fn run(
    cfg: Arc<Config>,
    provider: Arc<dyn DataProvider>,
    templates: Arc<dyn TemplateRenderer>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let client_timeout = match &cfg.delivery {
        Delivery::Polling {
            long_poll_timeout, ..
        } => *long_poll_timeout + CLIENT_TIMEOUT_SLACK,
        Delivery::Webhook(_) => CLIENT_TIMEOUT_SLACK * 2,
    };
    let client = teloxide::net::default_reqwest_settings()
        .timeout(client_timeout)
        .build()
        .context("failed to build telegram http client")?;
    let bot = Bot::with_client(cfg.telegram_bot_token.clone(), client);

    let me = bot
        .get_me()
        .await
        .context("getMe failed; check TELEGRAM_BOT_TOKEN")?;
    tracing::info!(username = %me.username(), "gcb started");

    // Several codes in one message mean a burst of replies to one chat; the throttle keeps
    // that under Telegram's per-chat limit. RetryAfter is still retried once in the adapter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let resolver = Resolver::new(provider, templates.clone(), cfg.resolve_timeout);
    let dispatcher = Arc::new(
        Dispatcher::new(messenger, resolver, templates).with_bot_username(me.username()),
    );

    match &cfg.delivery {
        Delivery::Polling {
            interval,
            long_poll_timeout,
            skip_pending,
        } => {
            run_polling(
                bot,
                dispatcher,
                *interval,
                *long_poll_timeout,
                *skip_pending,
                cancel,
            )
            .await
        }
        Delivery::Webhook(hook) => run_webhook(bot, dispatcher, hook, cancel).await,
    }
}

async fn run_polling(
    bot: Bot,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    long_poll_timeout: Duration,
    skip_pending: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    // getUpdates is refused while a webhook is registered.
    bot.delete_webhook()
        .await
        .context("failed to remove webhook before polling")?;

    let source = Arc::new(TelegramUpdates::new(bot, long_poll_timeout, skip_pending));
    let intake = PollingIntake::start(source, dispatcher, interval)
        .await
        .context("failed to initialize polling cursor")?;

    intake.run(cancel).await;
    Ok(())
}

async fn run_webhook(
    bot: Bot,
    dispatcher: Arc<Dispatcher>,
    hook: &WebhookConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let endpoint = hook.endpoint();
    let url = reqwest::Url::parse(&endpoint)
        .context("WEBHOOK_PUBLIC_URL does not form a valid url")?;

    let listener = bind_then_register(hook.listen, move || async move {
        let mut req = bot.set_webhook(url);
        if let Some(secret) = &hook.secret {
            req = req.secret_token(secret.clone());
        }
        req.await.context("setWebhook failed")?;
        Ok::<(), anyhow::Error>(())
    })
    .await?;

    let state = Arc::new(WebhookState {
        intake: PushIntake::new(dispatcher),
        path: hook.path.clone(),
        secret: hook.secret.clone(),
    });
    tracing::info!(listen = %hook.listen, "webhook server listening");

    axum::serve(listener, webhook::routes(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("webhook server failed")?;

    tracing::info!("webhook server stopped");
    Ok(())
}

/// Bind the listener first and only then register the webhook, so Telegram never points at
/// a server that failed to start.
async fn bind_then_register<F, Fut>(listen: SocketAddr, register: F) -> anyhow::Result<TcpListener>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind webhook listener on {listen}"))?;
    register().await?;
    Ok(listener)
}
