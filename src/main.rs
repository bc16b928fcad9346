//! Medical×IT News Notifier — Binary Entrypoint
//! One run of the harvest→filter→dedup→notify pipeline; scheduling lives
//! outside (cron/launchd).

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use medtech_news_notifier::config::Settings;
use medtech_news_notifier::filter::KeywordFilter;
use medtech_news_notifier::ingest::providers::google_news::GoogleNewsProvider;
use medtech_news_notifier::ingest::providers::htwatch::HtWatchProvider;
use medtech_news_notifier::ingest::providers::medicaltech::MedicalTechProvider;
use medtech_news_notifier::ingest::providers::prtimes_rss::PrTimesRssProvider;
use medtech_news_notifier::ingest::types::SourceProvider;
use medtech_news_notifier::ledger::DeliveryLedger;
use medtech_news_notifier::notify::slack::SlackNotifier;
use medtech_news_notifier::notify::{ConsoleNotifier, Notifier};
use medtech_news_notifier::selector::{run_once, RunOptions};
use medtech_news_notifier::{PipelineError, Source};

const AGGREGATOR_QUERY: &str = "医療 IT";

#[derive(Debug, Parser)]
#[command(
    name = "medtech-news-notifier",
    about = "医療×ITニュースをフィルタして Slack に投稿します。"
)]
struct Cli {
    /// Print the digest to stdout instead of posting; the ledger is not
    /// committed.
    #[arg(long)]
    dry_run: bool,

    /// Skip the already-sent check (the delivery is still recorded), use the
    /// reduced cap, and drop the manual-excluded sources.
    #[arg(long)]
    manual: bool,

    /// Enable debug-level diagnostics.
    #[arg(long)]
    verbose: bool,

    /// Config file path (default: config/notifier.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Delivered-identity store path (overrides config).
    #[arg(long)]
    ledger_path: Option<PathBuf>,

    /// Cap on articles per digest (overrides config).
    #[arg(long)]
    max_items: Option<usize>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "medtech_news_notifier=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn build_providers(settings: &Settings, excluded: &[Source]) -> Result<Vec<Box<dyn SourceProvider>>> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(settings.fetch.timeout_secs))
        .user_agent(concat!("medtech-news-notifier/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;

    let mut providers: Vec<Box<dyn SourceProvider>> = Vec::new();
    if !excluded.contains(&Source::PressRelease) {
        providers.push(Box::new(PrTimesRssProvider::new(
            settings.sources.prtimes_feeds.clone(),
            client.clone(),
        )));
    }
    if !excluded.contains(&Source::MedicalTechNews) {
        providers.push(Box::new(MedicalTechProvider::new(client.clone())));
    }
    if !excluded.contains(&Source::HealthTechWatch) {
        providers.push(Box::new(HtWatchProvider::new(client.clone())));
    }
    if !excluded.contains(&Source::NewsAggregator) {
        providers.push(Box::new(GoogleNewsProvider::new(AGGREGATOR_QUERY, client)));
    }
    Ok(providers)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::load_with_path(cli.config.as_deref())?;
    if let Some(path) = cli.ledger_path {
        settings.ledger.path = path;
    }

    if settings.sources.prtimes_feeds.is_empty() {
        return Err(anyhow!(
            "no press-release feeds configured; set PRTIMES_RSS_URLS or sources.prtimes_feeds"
        ));
    }

    let filter = KeywordFilter::new(&settings.keywords);
    let ranks = settings.source_ranks()?;
    let excluded = if cli.manual {
        settings.manual_excluded_sources()?
    } else {
        Vec::new()
    };
    let providers = build_providers(&settings, &excluded)?;

    // A corrupt store must abort here, before anything is delivered.
    let mut ledger = DeliveryLedger::load(&settings.ledger.path).map_err(|e| {
        PipelineError::LedgerLoad {
            path: settings.ledger.path.clone(),
            source: e,
        }
    })?;

    let notifier: Box<dyn Notifier> = if cli.dry_run {
        Box::new(ConsoleNotifier)
    } else {
        let webhook = settings
            .slack_webhook_url
            .clone()
            .ok_or_else(|| anyhow!("SLACK_WEBHOOK_URL is not set"))?;
        Box::new(
            SlackNotifier::new(webhook)
                .with_timeout(settings.fetch.timeout_secs)
                .with_retries(3),
        )
    };

    let opts = RunOptions {
        skip_ledger_check: cli.manual,
        commit: !cli.dry_run,
        max_items: cli.max_items.unwrap_or(if cli.manual {
            settings.selection.manual_max_items
        } else {
            settings.selection.max_items
        }),
        lookback: if cli.manual || cli.dry_run {
            None
        } else {
            Some(chrono::Duration::hours(settings.selection.lookback_hours))
        },
        include_undated: settings.selection.include_undated,
    };

    match run_once(
        &providers,
        &filter,
        &ranks,
        &mut ledger,
        notifier.as_ref(),
        &opts,
    )
    .await
    {
        Ok(summary) => {
            info!(?summary, "run complete");
            Ok(())
        }
        Err(e @ PipelineError::LedgerPersist { .. }) => {
            // Loudest failure: articles went out but were not recorded.
            error!(error = %e, "DELIVERED BUT NOT RECORDED — fix the ledger store before the next scheduled run");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "run failed");
            Err(e.into())
        }
    }
}
