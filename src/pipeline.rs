//! End-to-end pipeline: load, analyze, render, build, deploy.
//!
//! Stages run strictly in sequence and each consumes the previous stage's
//! output. The sandbox is provisioned only after the report is fully built, so
//! a bad data reference never costs a sandbox. After provisioning, any failure
//! destroys the sandbox before the error propagates; on success the sandbox is
//! left running so the preview URL stays live.

use std::time::Duration;

use tracing::{info, warn};

use crate::analyzer;
use crate::charts;
use crate::config::Config;
use crate::errors::{PipelineError, SandboxError, Stage};
use crate::loader::Loader;
use crate::report::{self, ReportBundle, SERVER_DEPENDENCIES};
use crate::sandbox::{SandboxClient, SandboxHandle};
use crate::table::DataReference;

/// Interval between readiness probes of the deployed report.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Per-probe timeout. Probes are cheap; a hung probe should not eat the
/// readiness budget.
const READY_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Successful pipeline run: where the report lives and what it covers.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub preview_url: String,
    pub sandbox_id: String,
    pub rows: usize,
    pub columns: usize,
    pub chart_count: usize,
}

impl RunOutcome {
    /// One-line summary for chat replies and CLI output.
    pub fn summary(&self) -> String {
        format!(
            "Analyzed {} rows x {} columns ({} charts). Report is live at {}",
            self.rows, self.columns, self.chart_count, self.preview_url
        )
    }
}

pub struct Pipeline {
    config: Config,
    loader: Loader,
    sandbox: SandboxClient,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let loader = Loader::new(config.http_timeout).map_err(|e| PipelineError::Internal {
            stage: Stage::Loader,
            source: e,
        })?;
        let sandbox = SandboxClient::new(&config)?;
        Ok(Self {
            config,
            loader,
            sandbox,
        })
    }

    /// Run the full pipeline for one data reference.
    pub async fn run(&self, reference: &DataReference) -> Result<RunOutcome, PipelineError> {
        info!(source = %reference.display(), "pipeline start");

        let table = self.loader.load(reference).await?;
        let (rows, columns) = table.shape();
        info!(rows, columns, "dataset loaded");

        let analysis = analyzer::analyze(&table);
        let artifacts = charts::render(&table, &analysis);
        info!(charts = artifacts.len(), "analysis complete");

        let bundle = report::build(
            &table,
            &analysis,
            &artifacts,
            reference,
            self.config.report_port,
        );

        let handle = self.sandbox.create().await?;
        info!(sandbox_id = %handle.id, "sandbox provisioned");

        let preview_url = match self.deploy(&handle, &bundle).await {
            Ok(url) => url,
            Err(err) => {
                // The sandbox is half-deployed and useless; reclaim it before
                // surfacing the original error.
                if let Err(cleanup) = self.sandbox.destroy(&handle).await {
                    warn!(sandbox_id = %handle.id, error = %cleanup, "cleanup failed");
                }
                return Err(err.into());
            }
        };

        info!(sandbox_id = %handle.id, url = %preview_url, "report deployed");
        Ok(RunOutcome {
            preview_url,
            sandbox_id: handle.id,
            rows,
            columns,
            chart_count: artifacts.len(),
        })
    }

    /// Upload the serving program, install its dependencies, start it, and
    /// give it a bounded window to start answering.
    async fn deploy(
        &self,
        handle: &SandboxHandle,
        bundle: &ReportBundle,
    ) -> Result<String, SandboxError> {
        self.sandbox
            .upload_file(handle, "app.py", &bundle.serving_app)
            .await?;

        let install = format!("pip install {}", SERVER_DEPENDENCIES.join(" "));
        self.sandbox.exec(handle, &install, false).await?;
        self.sandbox.exec(handle, "python3 app.py", true).await?;

        let url = self
            .sandbox
            .preview_url(handle, self.config.report_port)
            .await?;
        self.wait_until_ready(handle, &url).await;
        Ok(url)
    }

    /// Poll the report's `/callback` route until it answers or the readiness
    /// budget is spent. The wait is informational only: a server still warming
    /// up past the budget is logged, not failed — the URL is already valid and
    /// the report itself tells the reader to refresh on a 502.
    async fn wait_until_ready(&self, handle: &SandboxHandle, preview_url: &str) {
        let probe_url = format!("{}/callback", preview_url.trim_end_matches('/'));
        let client = reqwest::Client::new();

        for attempt in 1..=self.config.ready_wait_secs {
            match client
                .get(&probe_url)
                .timeout(READY_PROBE_TIMEOUT)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    info!(attempt, "report server is up");
                    return;
                }
                Ok(resp) => {
                    warn!(attempt, status = %resp.status(), "report not ready yet");
                }
                Err(_) => {}
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        warn!(
            sandbox_id = %handle.id,
            waited_secs = self.config.ready_wait_secs,
            "report server not confirmed up; the preview URL may 502 briefly"
        );
    }
}
