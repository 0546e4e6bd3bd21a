use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use dirs::{config_dir, data_local_dir};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt::time::LocalTime, layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};

use abr_config::{ConfigStore, keys};
use abr_core::{Importer, Monitor, Processor, RequestService};
use abr_db::Store;
use abr_indexer::{EnricherRegistry, IndexerGateway};
use abr_meta::{MetadataClient, PrimaryProvider, SecondaryProvider};
use abr_torrent::{QbitClient, TorrentClient};

/// Process-start settings: where things live on disk and how to reach
/// the metadata providers. Distinct from the dynamic `Config store`
/// (library path, qbit/prowlarr credentials, ranking weights), which
/// lives in the database and is mutable at runtime — this just tells
/// the process where that database is.
#[derive(Debug, Deserialize)]
struct BootstrapConfig {
    #[serde(default = "default_primary_provider")]
    primary_provider_base_url: String,
    #[serde(default = "default_secondary_provider")]
    secondary_provider_base_url: String,
    #[serde(default = "default_monitor_interval")]
    monitor_interval_secs: u64,
}

fn default_primary_provider() -> String {
    "https://api.audnex.us".to_string()
}

fn default_secondary_provider() -> String {
    "https://openlibrary.org".to_string()
}

fn default_monitor_interval() -> u64 {
    30
}

#[tokio::main]
async fn main() {
    if let Err(err) = app_main().await {
        error!("fatal startup error: {err:?}");
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

async fn app_main() -> Result<()> {
    let log_dir = std::env::var("ABR_LOG_DIR")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            #[cfg(debug_assertions)]
            return None;
            #[allow(unreachable_code)]
            data_local_dir().map(|d| d.join("abr-server").join("logs"))
        });

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    let file_layer = log_dir
        .as_ref()
        .map(|dir| {
            Result::<_, anyhow::Error>::Ok(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(
                RollingFileAppender::builder()
                    .rotation(Rotation::DAILY)
                    .filename_prefix("abr-server")
                    .filename_suffix("log")
                    .build(dir)?,
            ))
        })
        .transpose()?;

    tracing_subscriber::registry()
        .with(stderr_layer.with_timer(LocalTime::rfc_3339()).with_filter(
            EnvFilter::builder()
                .with_default_directive("abr_server=info".parse()?)
                .with_env_var("ABR_LOG")
                .from_env_lossy(),
        ))
        .with(file_layer.map(|layer| {
            layer.with_timer(LocalTime::rfc_3339()).with_filter(
                EnvFilter::builder()
                    .with_default_directive("abr_server=info".parse().unwrap())
                    .with_env_var("ABR_LOG")
                    .from_env_lossy(),
            )
        }))
        .try_init()?;
    std::panic::set_hook(Box::new(tracing_panic::panic_hook));

    let config_file = std::env::var("ABR_CONFIG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(debug_assertions)]
            return "abr-server.toml".into();
            #[allow(unreachable_code)]
            config_dir()
                .map(|d| d.join("abr-server").join("config.toml"))
                .unwrap_or_else(|| "abr-server.toml".into())
        });
    let database_file = std::env::var("ABR_DB_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(debug_assertions)]
            return "abr-server.db".into();
            #[allow(unreachable_code)]
            data_local_dir()
                .map(|d| d.join("abr-server").join("data.db"))
                .unwrap_or_else(|| "abr-server.db".into())
        });
    if let Some(dir) = database_file.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }

    let bootstrap: BootstrapConfig = Figment::new()
        .merge(Toml::file(&config_file))
        .merge(Env::prefixed("ABR_CONF_"))
        .extract()
        .context("reading bootstrap config")?;

    let store = Arc::new(Store::open(&database_file).context("opening database")?);
    let config = Arc::new(ConfigStore::new(store.clone()));

    let meta = Arc::new(MetadataClient::new(
        Box::new(PrimaryProvider::new(bootstrap.primary_provider_base_url)),
        Box::new(SecondaryProvider::new(bootstrap.secondary_provider_base_url)),
    ));

    let prowlarr_base = config.get(keys::PROWLARR_BASE_URL).await.unwrap_or_default().unwrap_or_default();
    let prowlarr_key = config.get(keys::PROWLARR_API_KEY).await.unwrap_or_default().unwrap_or_default();
    let gateway = Arc::new(IndexerGateway::new(prowlarr_base, prowlarr_key));

    // No indexer adapters are registered by default; this is the
    // extension point named in the source-enricher contract.
    let enrichers = Arc::new(EnricherRegistry::new(Vec::new()));

    let qbit_enabled = config.get_bool(keys::QBIT_ENABLED, false).await.unwrap_or(false);
    let qbit_host = config.get(keys::QBIT_HOST).await.unwrap_or_default().unwrap_or_default();
    let qbit_user = config.get(keys::QBIT_USER).await.unwrap_or_default().unwrap_or_default();
    let qbit_pass = config.get(keys::QBIT_PASS).await.unwrap_or_default().unwrap_or_default();
    let torrent: Arc<dyn TorrentClient> = Arc::new(QbitClient::new(qbit_host, qbit_user, qbit_pass));
    if qbit_enabled {
        let login = torrent.login().await;
        if !login.ok {
            error!(status = login.status_code, "qbit login failed at startup, will retry lazily");
        }
    } else {
        info!("qbit_enabled is false; torrent dispatch will fail until configured");
    }

    let processor = Arc::new(Processor::new(store.clone()));
    let request_service = RequestService::new(store.clone(), config.clone(), meta.clone(), gateway, enrichers, torrent.clone());
    let importer = Importer::new(store.clone(), config.clone(), meta, processor.clone());
    let monitor = Monitor::new(store.clone(), config.clone(), torrent, processor);

    // Mirrors the teacher's one-off CLI-flag mode (`--update-search-title`):
    // a subcommand runs a single request/import action and exits without
    // entering the long-lived monitor loop. No subcommand starts the
    // daemon. There is no web layer in this binary (out of scope); a
    // future one would call `RequestService`/`Importer` the same way.
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return run_command(&request_service, &importer, &args).await;
    }

    let interval = Duration::from_secs(bootstrap.monitor_interval_secs.max(1));
    tokio::spawn(async move {
        loop {
            monitor.tick().await;
            sleep(interval).await;
        }
    });

    info!("abr-server started");
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutting down");
    Ok(())
}

async fn run_command(request_service: &RequestService, importer: &Importer, args: &[String]) -> Result<()> {
    match args {
        [cmd, identifier, user] if cmd == "request" => {
            let (record, outcome) = request_service
                .create_request(identifier, user, abr_model::Region::from_code("us"))
                .await
                .context("create_request")?;
            info!(asin = %record.asin, status = ?record.status(), outcome = ?outcome, "request processed");
            Ok(())
        }
        [cmd, identifier, user, region] if cmd == "request" => {
            let (record, outcome) = request_service
                .create_request(identifier, user, abr_model::Region::from_code(region))
                .await
                .context("create_request")?;
            info!(asin = %record.asin, status = ?record.status(), outcome = ?outcome, "request processed");
            Ok(())
        }
        [cmd, root, owner] if cmd == "import-scan" => {
            let session = importer.start_session(root.clone(), owner.clone()).await.context("start_session")?;
            importer.run_scan(&session, abr_model::Region::Us).await.context("run_scan")?;
            info!(session_id = %session.id, "import scan complete, session ready for review");
            Ok(())
        }
        [cmd, session_id, owner] if cmd == "import-run" => {
            importer.run_import(session_id, owner).await.context("run_import")?;
            info!(session_id = %session_id, "import run complete");
            Ok(())
        }
        _ => {
            anyhow::bail!(
                "unrecognized command; expected one of: request <asin> <user> [region], import-scan <root> <owner>, import-run <session_id> <owner>"
            )
        }
    }
}
