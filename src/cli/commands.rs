//! CLI Command Implementations.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{info, warn};

use super::{Cli, Commands, OutputFormatter};
use crate::core::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::monitoring::{SystemSnapshot, Verdict};
use crate::probe::HttpProbe;
use crate::scheduler::MonitorService;

/// Execute the parsed command
pub async fn execute(cli: &Cli) -> Result<ExitCode> {
    let output = cli.output();

    match &cli.command {
        Commands::Run { bind, no_api } => run(&cli.config, *bind, *no_api).await,
        Commands::Check => check(&cli.config, &output).await,
        Commands::Validate => validate(&cli.config, &output),
        Commands::Snapshot { url } => snapshot(url, &output).await,
    }
}

fn load_config(path: &Path) -> Result<MonitorConfig> {
    let config = MonitorConfig::load(path)?;
    info!(path = %path.display(), services = config.services.len(), "configuration loaded");
    Ok(config)
}

/// Process exit status for a verdict: 0 only when healthy
pub fn verdict_exit_status(verdict: Verdict) -> u8 {
    match verdict {
        Verdict::Healthy => 0,
        Verdict::Degraded | Verdict::Critical => 1,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUN
// ═══════════════════════════════════════════════════════════════════════════════

async fn run(path: &Path, bind: Option<std::net::SocketAddr>, no_api: bool) -> Result<ExitCode> {
    let config = load_config(path)?;
    let serve_api = config.http.enabled && !no_api;
    let bind = match bind {
        Some(addr) => addr,
        None => config.bind_addr()?,
    };

    let mut service = MonitorService::new(config)?;
    service.start();

    let mut api = if serve_api { api::start(&service, bind) } else { None };

    let outcome = match api.as_mut() {
        Some(server) => tokio::select! {
            signal = tokio::signal::ctrl_c() => signal.map_err(Error::from),
            stopped = server.wait() => stopped,
        },
        None => tokio::signal::ctrl_c().await.map_err(Error::from),
    };

    match &outcome {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => warn!(error = %e, "stopping after error"),
    }

    if let Some(server) = api {
        server.stop().await;
    }
    service.shutdown().await;

    outcome.map(|()| ExitCode::SUCCESS)
}

#[cfg(feature = "http-api")]
mod api {
    use std::net::SocketAddr;

    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use tracing::error;

    use crate::error::{Error, Result};
    use crate::rpc::{self, ApiState};
    use crate::scheduler::MonitorService;

    /// Snapshot API running next to the monitor
    pub(super) struct ApiServer {
        stop: Option<oneshot::Sender<()>>,
        task: Option<JoinHandle<Result<()>>>,
    }

    pub(super) fn start(service: &MonitorService, bind: SocketAddr) -> Option<ApiServer> {
        let state = ApiState::new(service.aggregator().clone(), service.metrics().clone());
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(rpc::serve(bind, state, async {
            let _ = stopped.await;
        }));

        Some(ApiServer {
            stop: Some(stop),
            task: Some(task),
        })
    }

    impl ApiServer {
        /// Resolves only if the server exits on its own
        pub(super) async fn wait(&mut self) -> Result<()> {
            let result = match self.task.as_mut() {
                Some(task) => join(task.await),
                None => std::future::pending().await,
            };
            self.task = None;
            result
        }

        pub(super) async fn stop(mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
            if let Some(task) = self.task.take() {
                if let Err(e) = join(task.await) {
                    error!(error = %e, "snapshot API failed");
                }
            }
        }
    }

    fn join(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
        joined.map_err(|e| Error::Internal(format!("snapshot API task: {}", e)))?
    }
}

#[cfg(not(feature = "http-api"))]
mod api {
    use std::net::SocketAddr;

    use tracing::warn;

    use crate::error::Result;
    use crate::scheduler::MonitorService;

    pub(super) struct ApiServer;

    pub(super) fn start(_service: &MonitorService, bind: SocketAddr) -> Option<ApiServer> {
        warn!(%bind, "built without the http-api feature; snapshot API disabled");
        None
    }

    impl ApiServer {
        pub(super) async fn wait(&mut self) -> Result<()> {
            std::future::pending().await
        }

        pub(super) async fn stop(self) {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHECK
// ═══════════════════════════════════════════════════════════════════════════════

/// One probe cycle without alert delivery
async fn check(path: &Path, output: &OutputFormatter) -> Result<ExitCode> {
    let config = load_config(path)?;
    let probe = Arc::new(HttpProbe::new()?);
    let service = MonitorService::with_parts(config, probe, Vec::new());

    let snapshot = service.check_once().await;
    service.shutdown().await;

    output.snapshot(&snapshot);
    Ok(ExitCode::from(verdict_exit_status(snapshot.verdict)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATE
// ═══════════════════════════════════════════════════════════════════════════════

fn validate(path: &Path, output: &OutputFormatter) -> Result<ExitCode> {
    let config = load_config(path)?;

    output.services(&config);
    if config.alerts.channel_count() == 0 {
        output.warning("no alert channels enabled");
    }
    output.success(&format!(
        "{} valid: {} service(s), {} alert channel(s)",
        path.display(),
        config.services.len(),
        config.alerts.channel_count()
    ));

    Ok(ExitCode::SUCCESS)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Fetch `GET {base}/snapshot` from a running monitor
pub async fn fetch_snapshot(base: &str) -> Result<SystemSnapshot> {
    let url = format!("{}/snapshot", base.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .map_err(|e| Error::HttpClient(format!("GET {}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpClient(format!("GET {}: status {}", url, status)));
    }

    let mut body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| Error::HttpClient(format!("GET {}: {}", url, e)))?;

    let data = body
        .get_mut("data")
        .map(serde_json::Value::take)
        .filter(|data| !data.is_null())
        .ok_or_else(|| Error::HttpClient(format!("GET {}: reply carries no snapshot", url)))?;

    Ok(serde_json::from_value(data)?)
}

async fn snapshot(base: &str, output: &OutputFormatter) -> Result<ExitCode> {
    let snapshot = fetch_snapshot(base).await?;
    output.snapshot(&snapshot);
    Ok(ExitCode::from(verdict_exit_status(snapshot.verdict)))
}
