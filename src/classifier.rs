//! Classification of failed wallet tool invocations.
//!
//! The wallet tool only reports failures as free text on stderr, so this is
//! substring matching against its current messages. If the tool changes its
//! wording, the markers below are the only place to update.

use solana_sdk::signature::Signature;
use std::str::FromStr;

/// HTTP 429 from the RPC node.
pub const RATE_LIMIT_MARKER: &str = "429 Too Many Requests";
/// Node-side RPC failure (e.g. -32005 node is behind).
pub const RPC_ERROR_MARKER: &str = "RPC response error -32005";
/// Transaction was sent but confirmation timed out.
pub const UNCONFIRMED_MARKER: &str = "unable to confirm transaction";

pub const ERROR_PARSE_PLACEHOLDER: &str = "Error parsing error description - read the full logs.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Success,
    TransientRateLimit,
    TransientRpc,
    Unconfirmed,
    /// carries the short, comma-free error summary
    Fatal(String),
}

/// Classify one invocation. First matching rule wins:
/// exit 0, RPC error, rate limit (only when retrying it), unconfirmed or
/// un-retried rate limit, anything else is fatal.
pub fn classify(exit_code: i32, stderr: &str, retry_rate_limit: bool) -> Classification {
    if exit_code == 0 {
        return Classification::Success;
    }
    if stderr.contains(RPC_ERROR_MARKER) {
        return Classification::TransientRpc;
    }

    let rate_limited = stderr.contains(RATE_LIMIT_MARKER);
    if rate_limited && retry_rate_limit {
        return Classification::TransientRateLimit;
    }
    if rate_limited || stderr.contains(UNCONFIRMED_MARKER) {
        return Classification::Unconfirmed;
    }

    Classification::Fatal(short_error(stderr))
}

/// First line of `stderr` with commas stripped, so it fits a CSV column.
pub fn short_error(stderr: &str) -> String {
    let first = stderr.lines().next().unwrap_or("").trim();
    if first.is_empty() {
        return ERROR_PARSE_PLACEHOLDER.to_string();
    }
    first.replace(',', " ")
}

/// Parse `Signature: <id>` from the last non-empty line of the tool's stdout.
pub fn parse_signature(stdout: &str) -> Option<Signature> {
    let last = stdout.lines().rev().find(|line| !line.trim().is_empty())?;
    let token = last.trim().strip_prefix("Signature:")?.trim();
    Signature::from_str(token).ok()
}
