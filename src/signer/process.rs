use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ComplianceRequest, ComplianceResponse, ReportingRequest, ReportingResponse, Signer};
use crate::config::{SignerCommand, SignerConfig};
use crate::core::ZatcaError;

/// Runs the configured signer command once per call.
///
/// The request goes to the child's stdin as JSON and the response is read
/// back from stdout. A non-zero exit status does not by itself fail the
/// call: signers report rejections in the JSON body and may exit with an
/// error code at the same time. The child is killed if the call times out
/// or the future is dropped.
#[derive(Debug, Clone)]
pub struct ProcessSigner {
    compliance: SignerCommand,
    reporting: SignerCommand,
    timeout: Duration,
}

impl ProcessSigner {
    pub fn new(config: &SignerConfig) -> Self {
        Self {
            compliance: config.compliance.clone(),
            reporting: config.reporting.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call<Req, Resp>(&self, command: &SignerCommand, request: &Req) -> Result<Resp, ZatcaError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)
            .map_err(|e| ZatcaError::Signer(format!("cannot encode request: {e}")))?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            program = %command.program.display(),
            args = ?command.args,
            timeout_secs = %self.timeout.as_secs(),
            "running signer"
        );

        let mut child = cmd.spawn().map_err(|e| {
            ZatcaError::Signer(format!("cannot start {}: {e}", command.program.display()))
        })?;

        let exchange = async move {
            if let Some(mut stdin) = child.stdin.take() {
                match stdin.write_all(&payload).await {
                    Ok(()) => {}
                    // The signer may exit without reading its input.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(ZatcaError::Signer(format!("cannot write request: {e}"))),
                }
            }
            child
                .wait_with_output()
                .await
                .map_err(|e| ZatcaError::Signer(format!("signer I/O error: {e}")))
        };

        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                warn!(program = %command.program.display(), "signer timed out, killed");
                ZatcaError::Timeout(self.timeout)
            })??;

        if !output.status.success() {
            warn!(
                program = %command.program.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "signer exited with failure"
            );
        }

        decode_response(&output.stdout, &output.stderr).ok_or_else(|| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            ZatcaError::Signer(format!(
                "no JSON response from signer ({}): {}",
                output.status,
                stderr.trim()
            ))
        })
    }
}

/// Decode the response from stdout, or else from the last JSON object line
/// of stdout followed by stderr.
fn decode_response<Resp: DeserializeOwned>(stdout: &[u8], stderr: &[u8]) -> Option<Resp> {
    if let Ok(resp) = serde_json::from_slice(stdout) {
        return Some(resp);
    }
    let combined = format!(
        "{}\n{}",
        String::from_utf8_lossy(stdout),
        String::from_utf8_lossy(stderr)
    );
    combined
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{') && line.ends_with('}'))
        .find_map(|line| serde_json::from_str(line).ok())
}

#[async_trait]
impl Signer for ProcessSigner {
    async fn check_compliance(&self, request: ComplianceRequest) -> Result<ComplianceResponse, ZatcaError> {
        let response: ComplianceResponse = self.call(&self.compliance, &request).await?;
        response.into_result()
    }

    async fn report(&self, request: ReportingRequest) -> Result<ReportingResponse, ZatcaError> {
        let response: ReportingResponse = self.call(&self.reporting, &request).await?;
        response.into_result()
    }
}
