use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use bpwatch::{
    ChainClient, ChatPoster, CleosChainClient, CleosManagement, Consume, HttpChainClient, HttpPoster,
    ProducerSource, RemediationManager, RemediationState, SchedulerConfig, Settings, StreamLogger,
    Supervisor, TelegramSink, Transport,
};

/// Watches block producers' missed-block counters.
#[derive(Debug, Parser)]
#[command(name = "bpwatch", version, about)]
struct Args {
    /// Path to the JSON settings file.
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings = Settings::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    info!(
        "bpwatch v{} starting against {}",
        env!("CARGO_PKG_VERSION"),
        settings.api_endpoint
    );

    let client: Arc<dyn ChainClient> = match settings.transport {
        Transport::Http => Arc::new(
            HttpChainClient::new(&settings.api_endpoint, settings.request_timeout())
                .context("building chain HTTP client")?,
        ),
        Transport::Cleos => Arc::new(
            CleosChainClient::new(settings.cleos_path.clone(), settings.api_endpoint.clone())
                .with_timeout(settings.request_timeout()),
        ),
    };
    let source = ProducerSource::new(client)
        .with_page_limit(settings.page_limit)
        .with_max_pages(settings.max_pages);

    let mut builder = Supervisor::builder(source)
        .with_scheduler(SchedulerConfig::from(&settings))
        .with_consumers(consumers(&settings)?)
        .with_grace(settings.grace());

    if let Some(managed) = settings.managed_account.clone() {
        info!(account = %managed.account, "remediation enabled");
        let actions = Arc::new(
            CleosManagement::new(settings.cleos_path.clone(), settings.api_endpoint.clone())
                .with_timeout(settings.request_timeout()),
        );
        builder = builder.with_remediation(RemediationManager::new(
            managed,
            RemediationState::default(),
            actions,
        ));
    }

    builder.build().run().await?;
    info!("bpwatch stopped");
    Ok(())
}

fn consumers(settings: &Settings) -> anyhow::Result<Vec<Arc<dyn Consume>>> {
    let mut out: Vec<Arc<dyn Consume>> = Vec::new();

    if settings.stream_log {
        out.push(Arc::new(StreamLogger::new()));
    }
    if let Some(tg) = &settings.telegram {
        let sink = Arc::new(
            TelegramSink::new(&tg.api_base, &tg.bot_token).context("building Telegram client")?,
        );
        out.push(Arc::new(
            ChatPoster::new(sink, tg.channel_id.clone())
                .with_batch_size(tg.batch_size)
                .with_interval(tg.interval())
                .with_announce_start(tg.announce_start),
        ));
    }
    if let Some(post) = &settings.http_post {
        let poster = HttpPoster::new(post.url.clone()).context("building HTTP poster")?;
        out.push(Arc::new(poster.with_interval(post.interval())));
    }

    Ok(out)
}
