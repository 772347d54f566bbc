//! Transliteration daemon: HTTP transliteration and learning, plus background corpus sync.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use translit_daemon::{
    config::{self, DispatchConfig, SyncConfig},
    dispatch::Dispatcher,
    engine::{EngineRegistry, LexiconEngine},
    server::{AppState, DaemonServer},
    settings::{self, SettingsStore},
    sync::{CorpusSyncer, LogReporter, ProgressReporter, StatusStoreReporter, SyncHandle, SyncStart},
    upstream::{self, HttpUpstream},
};

#[derive(Parser)]
#[command(name = "translit-daemon", about = "Transliteration and learning daemon")]
struct Cli {
    /// Start a learn-only daemon (no transliteration endpoints).
    #[arg(short = 'l', long)]
    learn_only: bool,

    /// Port to listen on.
    #[arg(short, long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Workers per language for transliteration. Ignored with --learn-only.
    #[arg(short = 'n', long = "max-procs", default_value_t = config::DEFAULT_FAN_OUT)]
    max_procs: usize,

    /// Languages to serve, comma separated.
    #[arg(long, value_delimiter = ',', default_values_t = config::DEFAULT_LANGUAGES.iter().map(|l| l.to_string()))]
    languages: Vec<String>,

    /// Settings file holding the upstream URL and sync status.
    #[arg(long, env = "TRANSLIT_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds a request waits for its job.
    #[arg(long, default_value_t = config::REQUEST_TIMEOUT_SECS)]
    request_timeout: u64,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings_path = cli.config.clone().unwrap_or_else(settings::default_path);
    let store = Arc::new(SettingsStore::load_or_default(&settings_path)?);
    info!("using settings at {}", settings_path.display());

    let registry = Arc::new(EngineRegistry::new(Arc::new(LexiconEngine)));

    let dispatcher = Arc::new(Dispatcher::start(
        DispatchConfig {
            languages: cli.languages.clone(),
            fan_out: cli.max_procs,
            learn_only: cli.learn_only,
            ..Default::default()
        },
        Arc::clone(&registry),
    ));

    let reporters: Vec<Arc<dyn ProgressReporter>> = vec![
        Arc::new(LogReporter),
        Arc::new(StatusStoreReporter::new(Arc::clone(&store))),
    ];
    let syncer = CorpusSyncer::new(Arc::clone(&registry), &SyncConfig::default())
        .with_reporter(Arc::new(reporters));
    let runs = start_sync_runs(&syncer, &store).await?;

    let state = AppState::new(
        Arc::clone(&dispatcher),
        Duration::from_secs(cli.request_timeout),
    );
    let server = DaemonServer::start(&format!("0.0.0.0:{}", cli.port), state, cli.learn_only).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    server.shutdown();
    syncer.shutdown();
    for run in runs {
        let language = run.language().to_string();
        let state = run.join().await;
        info!("[{}] sync run ended in {:?}", language, state);
    }
    dispatcher.shutdown();

    Ok(())
}

/// One run per enabled language, resuming from its stored offset.
async fn start_sync_runs(syncer: &CorpusSyncer, store: &SettingsStore) -> Result<Vec<SyncHandle>> {
    let upstream_url = store.upstream_url();
    let client = upstream::default_client()?;
    let mut runs = Vec::new();

    for (language, status) in store.enabled_schemes() {
        let upstream = Arc::new(HttpUpstream::with_client(
            client.clone(),
            upstream_url.clone(),
            language.clone(),
        ));
        match syncer.start(upstream, &language, status.offset).await {
            Ok(SyncStart::Started(handle)) => runs.push(handle),
            Ok(SyncStart::NothingToSync {
                offset,
                words_count,
            }) => info!(
                "[{}] already in sync at offset {} of {}",
                language, offset, words_count
            ),
            Err(e) => error!("[{}] sync not started: {}", language, e),
        }
    }

    if runs.is_empty() {
        warn!("no corpus sync running");
    }
    Ok(runs)
}
