use solana_sdk::signature::Signature;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::classifier::{classify, parse_signature, Classification};
use crate::command::TransferRequest;
use crate::error::DistributorError;
use crate::logs::LogWriter;
use crate::runner::CommandRunner;

/// Terminal result for one recipient.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// `None` when the signature line could not be parsed
    Success { signature: Option<Signature> },
    Canceled,
    /// sent, but the tool could not tell whether it landed
    Unconfirmed(String),
    Failed(String),
}

impl TransferOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            TransferOutcome::Success { .. } => "SUCCESS",
            TransferOutcome::Canceled => "CANCELED",
            TransferOutcome::Unconfirmed(_) => "UNCONFIRMED",
            TransferOutcome::Failed(_) => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// retry on HTTP 429 instead of treating it as unconfirmed
    pub retry_rate_limit: bool,
    pub rpc_delay: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_rate_limit: false,
            rpc_delay: Duration::from_secs(5),
            rate_limit_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryReport {
    pub outcome: TransferOutcome,
    /// transient failures before the terminal attempt
    pub retries: usize,
}

/// Run the transfer until a non-transient classification is reached.
///
/// Transient failures are retried forever with a fixed delay. Every
/// attempt's raw output goes to the transcript. Only a spawn failure or a
/// log write failure ends the loop with an error.
pub fn send_with_retry(
    request: &TransferRequest,
    runner: &dyn CommandRunner,
    policy: &RetryPolicy,
    logs: &mut LogWriter,
) -> Result<RetryReport, DistributorError> {
    let mut retries = 0;

    loop {
        logs.transcript(&format!("Attempt {}: {}", retries + 1, request.command_line()))?;
        let output = runner.run(request.argv())?;
        let stdout = output.stdout_text();
        let stderr = output.stderr_text();

        logs.transcript(&stdout)?;
        logs.transcript(&stderr)?;

        let classification = classify(output.exit_code, &stderr, policy.retry_rate_limit);
        debug!(
            recipient = %request.recipient,
            exit_code = output.exit_code,
            ?classification,
            "transfer attempt finished"
        );

        let outcome = match classification {
            Classification::Success => TransferOutcome::Success {
                signature: parse_signature(&stdout),
            },
            Classification::TransientRateLimit => {
                print!("429 Too many requests, waiting {}s... ", policy.rate_limit_delay.as_secs());
                flush_stdout();
                warn!(recipient = %request.recipient, retries, "rate limited, retrying");
                retries += 1;
                thread::sleep(policy.rate_limit_delay);
                continue;
            }
            Classification::TransientRpc => {
                print!("-32005 RPC Error, waiting {}s... ", policy.rpc_delay.as_secs());
                flush_stdout();
                warn!(recipient = %request.recipient, retries, "RPC error, retrying");
                retries += 1;
                thread::sleep(policy.rpc_delay);
                continue;
            }
            Classification::Unconfirmed => TransferOutcome::Unconfirmed(stderr.trim_end().to_string()),
            Classification::Fatal(summary) => TransferOutcome::Failed(summary),
        };

        return Ok(RetryReport { outcome, retries });
    }
}

pub(crate) fn flush_stdout() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}
