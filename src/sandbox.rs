//! Sandbox provider client (Daytona-style REST API).
//!
//! Thin typed wrapper over the provider's HTTP API: create a sandbox, upload
//! files, run commands, resolve the preview URL for a port, and delete the
//! sandbox. Lifecycle policy (when to destroy, when to leave running) lives in
//! the pipeline, not here.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::errors::SandboxError;

/// Per-request timeout for command execution. Installing the report server's
/// dependencies routinely exceeds the default HTTP timeout.
const EXEC_TIMEOUT: Duration = Duration::from_secs(180);

/// A provisioned sandbox, identified by the provider-assigned id.
#[derive(Debug, Clone)]
pub struct SandboxHandle {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSandboxRequest {
    language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CreateSandboxResponse {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecRequest<'a> {
    command: &'a str,
    run_async: bool,
}

/// Result of a synchronous command execution.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutput {
    #[serde(default)]
    pub exit_code: i64,
    #[serde(default)]
    pub result: String,
}

#[derive(Debug, Deserialize)]
struct PreviewUrlResponse {
    url: String,
}

/// Client for the sandbox provider API.
pub struct SandboxClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SandboxClient {
    pub fn new(config: &Config) -> Result<Self, SandboxError> {
        let http = reqwest::Client::builder()
            .user_agent("tabula")
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| SandboxError::Provision(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Provision a fresh sandbox.
    pub async fn create(&self) -> Result<SandboxHandle, SandboxError> {
        let request = CreateSandboxRequest {
            language: "python".to_string(),
            labels: Some(serde_json::json!({ "app": "tabula-report" })),
        };
        let resp = self
            .http
            .post(format!("{}/sandbox", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SandboxError::Provision(e.to_string()))?;

        let resp = check_status(resp)
            .await
            .map_err(SandboxError::Provision)?;
        let created: CreateSandboxResponse = resp
            .json()
            .await
            .map_err(|e| SandboxError::Provision(format!("invalid create response: {e}")))?;

        debug!(sandbox_id = %created.id, "sandbox provisioned");
        Ok(SandboxHandle { id: created.id })
    }

    /// Upload a file into the sandbox at `path` (relative to the workspace
    /// root inside the sandbox).
    pub async fn upload_file(
        &self,
        handle: &SandboxHandle,
        path: &str,
        contents: &str,
    ) -> Result<(), SandboxError> {
        let resp = self
            .http
            .post(format!(
                "{}/toolbox/{}/files/upload",
                self.base_url, handle.id
            ))
            .bearer_auth(&self.api_key)
            .query(&[("path", path)])
            .body(contents.to_string())
            .send()
            .await
            .map_err(|e| self.deploy_err(handle, format!("upload {path}: {e}")))?;

        check_status(resp)
            .await
            .map_err(|reason| self.deploy_err(handle, format!("upload {path}: {reason}")))?;
        debug!(sandbox_id = %handle.id, path, "file uploaded");
        Ok(())
    }

    /// Run a command inside the sandbox. With `run_async` the provider starts
    /// the process and returns immediately; the reported exit code and output
    /// are then meaningless and only the HTTP status matters.
    pub async fn exec(
        &self,
        handle: &SandboxHandle,
        command: &str,
        run_async: bool,
    ) -> Result<ExecOutput, SandboxError> {
        let resp = self
            .http
            .post(format!(
                "{}/toolbox/{}/process/execute",
                self.base_url, handle.id
            ))
            .bearer_auth(&self.api_key)
            .timeout(EXEC_TIMEOUT)
            .json(&ExecRequest { command, run_async })
            .send()
            .await
            .map_err(|e| self.deploy_err(handle, format!("exec `{command}`: {e}")))?;

        let resp = check_status(resp)
            .await
            .map_err(|reason| self.deploy_err(handle, format!("exec `{command}`: {reason}")))?;

        if run_async {
            return Ok(ExecOutput {
                exit_code: 0,
                result: String::new(),
            });
        }

        let output: ExecOutput = resp
            .json()
            .await
            .map_err(|e| self.deploy_err(handle, format!("exec `{command}`: bad response: {e}")))?;
        if output.exit_code != 0 {
            return Err(self.deploy_err(
                handle,
                format!(
                    "exec `{command}` exited with {}: {}",
                    output.exit_code,
                    output.result.trim()
                ),
            ));
        }
        Ok(output)
    }

    /// Resolve the public preview URL for a port inside the sandbox. Failure
    /// here means no URL could be obtained at all.
    pub async fn preview_url(
        &self,
        handle: &SandboxHandle,
        port: u16,
    ) -> Result<String, SandboxError> {
        let unavailable = |reason: String| SandboxError::PreviewUnavailable {
            id: handle.id.clone(),
            reason,
        };

        let resp = self
            .http
            .get(format!(
                "{}/sandbox/{}/ports/{}/preview-url",
                self.base_url, handle.id, port
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let resp = check_status(resp).await.map_err(unavailable)?;
        let preview: PreviewUrlResponse = resp
            .json()
            .await
            .map_err(|e| unavailable(format!("bad response: {e}")))?;
        Ok(preview.url)
    }

    /// Delete the sandbox. Errors are returned, not swallowed; callers on a
    /// cleanup path log and move on.
    pub async fn destroy(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        let resp = self
            .http
            .delete(format!("{}/sandbox/{}", self.base_url, handle.id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.deploy_err(handle, format!("destroy: {e}")))?;
        check_status(resp)
            .await
            .map_err(|reason| self.deploy_err(handle, format!("destroy: {reason}")))?;
        debug!(sandbox_id = %handle.id, "sandbox destroyed");
        Ok(())
    }

    fn deploy_err(&self, handle: &SandboxHandle, reason: String) -> SandboxError {
        SandboxError::Deploy {
            id: handle.id.clone(),
            reason,
        }
    }
}

/// Turn a non-2xx response into an error message carrying status and body.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        Err(format!("HTTP status {status}"))
    } else {
        Err(format!("HTTP status {status}: {body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_request_serializes_camel_case() {
        let req = ExecRequest {
            command: "python3 app.py",
            run_async: true,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["command"], "python3 app.py");
        assert_eq!(json["runAsync"], true);
    }

    #[test]
    fn create_request_carries_language_and_labels() {
        let req = CreateSandboxRequest {
            language: "python".to_string(),
            labels: Some(serde_json::json!({ "app": "tabula-report" })),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["language"], "python");
        assert_eq!(json["labels"]["app"], "tabula-report");
    }

    #[test]
    fn exec_output_defaults_missing_fields() {
        let output: ExecOutput = serde_json::from_str("{}").unwrap();
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.result, "");
    }

    #[test]
    fn preview_response_parses() {
        let resp: PreviewUrlResponse =
            serde_json::from_str(r#"{"url":"https://3000-sb1.proxy.example.com"}"#).unwrap();
        assert_eq!(resp.url, "https://3000-sb1.proxy.example.com");
    }
}
