//! Ingestion router server.
//!
//! Accepts object-upload notifications over HTTP, matches them against the
//! routing rules, and dispatches each match to its backend.
//!
//! # Usage
//!
//! ```text
//! ROUTING_RULES_FILE=rules.json FAST_PATH_ENDPOINT=http://localhost:9000 ingest-router-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:4580` | Bind address |
//! | `ROUTING_RULES_FILE` | `rules.json` | Routing rules document |
//! | `FAST_PATH_ENDPOINT` | *(unset)* | FastPath function endpoint |
//! | `BATCH_ENDPOINT` | *(unset)* | Workflow engine endpoint |
//! | `HEAVY_COMPUTE_ENDPOINT` | *(unset)* | Job queue endpoint |
//! | `DEAD_LETTER_FILE` | *(unset = in memory)* | JSON-lines dead-letter file |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `LOG_FORMAT` | `text` | `json` for structured output |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ingest_router_core::{
    Backends, DeadLetterSink, DispatchTimeouts, FileDeadLetterStore, InMemoryDeadLetterStore,
    IngestRouter, RetryPolicies, RouterConfig, RouterHandler, RouterParts, RuleTable,
    RulesDocument,
};
use ingest_router_http::service::{IngestHttpConfig, IngestHttpService};

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

type RouterService = IngestHttpService<RouterHandler>;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Open the dead-letter store named by the configuration.
async fn open_dead_letters(config: &RouterConfig) -> Result<Arc<dyn DeadLetterSink>> {
    match &config.dead_letter_file {
        Some(path) => {
            let store = FileDeadLetterStore::open(path)
                .await
                .with_context(|| format!("failed to open dead-letter file {path}"))?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DEAD_LETTER_FILE unset, dead letters are kept in memory only");
            Ok(Arc::new(InMemoryDeadLetterStore::new()))
        }
    }
}

/// Load the rules document and assemble the router.
async fn build_router(config: &RouterConfig) -> Result<IngestRouter> {
    let document = RulesDocument::load(&config.rules_file)
        .with_context(|| format!("failed to load routing rules from {}", config.rules_file))?;
    let rules = RuleTable::new(document.rules, config.exclusive_backends)?;
    let policies = RetryPolicies::from_config(config, &document.retry)?;
    let backends = Backends::from_config(config)?;
    let dead_letters = open_dead_letters(config).await?;

    let router = RouterParts::builder()
        .rules(rules)
        .backends(backends)
        .policies(policies)
        .timeouts(DispatchTimeouts::from_config(config))
        .dead_letters(dead_letters)
        .build()
        .into_router()?;
    Ok(router)
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve(listener: TcpListener, service: RouterService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // In-flight chains finish before exit.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Perform a health check by connecting to the server and requesting `/health`.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RouterConfig::from_env();

    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let healthy = run_health_check(&config.gateway_listen).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level, config.json_logs())?;

    let router = build_router(&config).await?;
    let rule_count = router.rules().len();
    let handler = RouterHandler::new(router);
    let service = IngestHttpService::new(Arc::new(handler), IngestHttpConfig::default());

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        rules = rule_count,
        max_attempts = config.max_attempts,
        max_event_age_secs = config.max_event_age_secs,
        version = VERSION,
        "starting ingestion router",
    );

    serve(listener, service).await
}
