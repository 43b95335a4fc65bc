//! Typed error hierarchy for the Tabula pipeline.
//!
//! Three top-level enums cover the three fallible subsystems:
//! - `ConfigError` — startup-time configuration failures (fatal, process does not start)
//! - `LoadError` — data loader failures
//! - `SandboxError` — sandbox provisioning and deployment failures
//!
//! `PipelineError` wraps all of these with stage attribution so a failure can
//! be reported to the user as a single line naming the stage that failed.

use thiserror::Error;

/// The pipeline stage a failure is attributed to in user-facing replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loader,
    Analyzer,
    Renderer,
    Builder,
    Orchestrator,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Loader => "Loader",
            Stage::Analyzer => "Analyzer",
            Stage::Renderer => "Renderer",
            Stage::Builder => "Builder",
            Stage::Orchestrator => "Orchestrator",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from startup configuration. These are fatal: the process refuses to
/// start rather than failing per-run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "SANDBOX_API_KEY is not set. The sandbox provider credential is required at startup \
         (set it in the environment or a .env file)"
    )]
    MissingCredential,

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

/// Errors from the data loader.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not reach data source {url}: {reason}")]
    UnreachableSource { url: String, reason: String },

    #[error("Payload is neither valid CSV nor valid JSON: {0}")]
    UnsupportedFormat(String),

    #[error("Dataset contains no rows")]
    EmptyDataset,
}

/// Errors from the sandbox orchestrator.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Failed to provision sandbox: {0}")]
    Provision(String),

    #[error("Failed to deploy report into sandbox {id}: {reason}")]
    Deploy { id: String, reason: String },

    #[error("Could not obtain a preview URL for sandbox {id}: {reason}")]
    PreviewUnavailable { id: String, reason: String },
}

/// A pipeline run failure, carrying enough to name the failing stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("{stage} stage failed: {source}")]
    Internal {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    /// The stage this error is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Load(_) => Stage::Loader,
            PipelineError::Sandbox(_) => Stage::Orchestrator,
            PipelineError::Internal { stage, .. } => *stage,
        }
    }

    /// One-line human-readable message for chat replies, naming the stage.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Internal { .. } => self.to_string(),
            _ => format!("{} stage failed: {}", self.stage(), self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_unreachable_carries_url() {
        let err = LoadError::UnreachableSource {
            url: "https://example.com/data.csv".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("https://example.com/data.csv"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn load_error_maps_to_loader_stage() {
        let err: PipelineError = LoadError::EmptyDataset.into();
        assert_eq!(err.stage(), Stage::Loader);
        assert!(err.user_message().starts_with("Loader stage failed"));
    }

    #[test]
    fn sandbox_error_maps_to_orchestrator_stage() {
        let err: PipelineError = SandboxError::Provision("quota exceeded".to_string()).into();
        assert_eq!(err.stage(), Stage::Orchestrator);
        assert!(err.user_message().contains("Orchestrator stage failed"));
        assert!(err.user_message().contains("quota exceeded"));
    }

    #[test]
    fn preview_unavailable_carries_id_and_reason() {
        let err = SandboxError::PreviewUnavailable {
            id: "sb-123".to_string(),
            reason: "HTTP status 404".to_string(),
        };
        assert!(err.to_string().contains("sb-123"));
        assert!(err.to_string().contains("HTTP status 404"));
    }

    #[test]
    fn internal_error_keeps_its_stage() {
        let err = PipelineError::Internal {
            stage: Stage::Builder,
            source: anyhow::anyhow!("template exploded"),
        };
        assert_eq!(err.stage(), Stage::Builder);
        assert!(err.user_message().contains("Builder"));
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(Stage::Loader.name(), "Loader");
        assert_eq!(Stage::Analyzer.name(), "Analyzer");
        assert_eq!(Stage::Renderer.name(), "Renderer");
        assert_eq!(Stage::Builder.name(), "Builder");
        assert_eq!(Stage::Orchestrator.name(), "Orchestrator");
    }

    #[test]
    fn missing_credential_message_names_the_variable() {
        let err = ConfigError::MissingCredential;
        assert!(err.to_string().contains("SANDBOX_API_KEY"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ConfigError::MissingCredential);
        assert_std_error(&LoadError::EmptyDataset);
        assert_std_error(&SandboxError::Provision("x".into()));
        let pipeline_err: PipelineError = LoadError::EmptyDataset.into();
        assert_std_error(&pipeline_err);
    }
}
