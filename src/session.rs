use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::allocator::Allocation;
use crate::command::{TransferRequest, TransferTemplate};
use crate::error::DistributorError;
use crate::logs::LogWriter;
use crate::retry::{flush_stdout, send_with_retry, RetryPolicy, TransferOutcome};
use crate::runner::CommandRunner;

pub const SEPARATOR: &str = "--------------------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Interactive,
    NonInteractive,
}

impl Mode {
    pub fn describe(self) -> &'static str {
        match self {
            Mode::Interactive => "interactive",
            Mode::NonInteractive => "non-interactive",
        }
    }
}

/// Operator answer for one pending transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Cancel,
    /// confirm this one and stop asking for the rest of the run
    SwitchToNonInteractive,
}

/// The human in the loop.
pub trait Operator {
    /// Asked once before the first transfer; `false` aborts the run.
    fn confirm_start(&mut self, mode: Mode) -> anyhow::Result<bool>;

    /// Asked before each transfer while the session is interactive.
    fn review(&mut self, request: &TransferRequest) -> anyhow::Result<Decision>;

    /// Total drop amount, when none was configured.
    fn ask_drop_amount(&mut self) -> anyhow::Result<f64>;
}

/// Outcome counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub success: usize,
    pub canceled: usize,
    pub unconfirmed: usize,
    pub failed: usize,
}

impl SessionSummary {
    fn count(&mut self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Success { .. } => self.success += 1,
            TransferOutcome::Canceled => self.canceled += 1,
            TransferOutcome::Unconfirmed(_) => self.unconfirmed += 1,
            TransferOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.canceled + self.unconfirmed + self.failed
    }
}

/// Drives the per-recipient loop over the allocations, in order.
pub struct Session<'a> {
    template: &'a TransferTemplate,
    policy: RetryPolicy,
    allocations: Vec<Allocation>,
    mode: Mode,
    /// 1-based index of the next recipient
    cursor: usize,
    logs: LogWriter,
    interrupted: Arc<AtomicBool>,
}

impl<'a> Session<'a> {
    pub fn new(
        template: &'a TransferTemplate,
        policy: RetryPolicy,
        allocations: Vec<Allocation>,
        mode: Mode,
        logs: LogWriter,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            template,
            policy,
            allocations,
            mode,
            cursor: 1,
            logs,
            interrupted,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn logs(&self) -> &LogWriter {
        &self.logs
    }

    /// Process every recipient. Per-recipient failures are logged and the run
    /// continues; spawn, log-write and interrupt errors end it.
    pub fn run(
        &mut self,
        runner: &dyn CommandRunner,
        operator: &mut dyn Operator,
    ) -> anyhow::Result<SessionSummary> {
        let mut summary = SessionSummary::default();
        let allocations = std::mem::take(&mut self.allocations);

        for allocation in &allocations {
            if self.interrupted.load(Ordering::SeqCst) {
                return Err(DistributorError::Interrupted.into());
            }

            let request = TransferRequest::build(
                self.cursor,
                allocation.recipient,
                allocation.share,
                self.template,
            );
            let outcome = self.process(&request, runner, operator)?;
            summary.count(&outcome);
            self.cursor += 1;
        }

        Ok(summary)
    }

    fn process(
        &mut self,
        request: &TransferRequest,
        runner: &dyn CommandRunner,
        operator: &mut dyn Operator,
    ) -> anyhow::Result<TransferOutcome> {
        self.logs
            .transcript(&format!("{}. Cmdline: {}", request.index, request.command_line()))?;

        let decision = match self.mode {
            Mode::NonInteractive => {
                print!("{}. Airdrop to {}: ", request.index, request.recipient);
                flush_stdout();
                Decision::Confirm
            }
            Mode::Interactive => {
                print!("{}. ", request.index);
                flush_stdout();
                operator.review(request)?
            }
        };

        if decision == Decision::SwitchToNonInteractive {
            println!("Switching to non-interactive mode on next address.");
            info!(index = request.index, "switched to non-interactive mode");
            self.mode = Mode::NonInteractive;
        }

        let (outcome, retries) = if decision == Decision::Cancel {
            self.logs.transcript(&format!(
                "Cancel: {},{}",
                request.recipient, request.amount
            ))?;
            (TransferOutcome::Canceled, 0)
        } else {
            let report = send_with_retry(request, runner, &self.policy, &mut self.logs)?;
            (report.outcome, report.retries)
        };

        println!("{}", outcome.status());
        info!(
            index = request.index,
            recipient = %request.recipient,
            amount = %request.amount,
            status = outcome.status(),
            retries,
            "recipient processed"
        );

        self.logs.record(request, &outcome)?;
        self.logs.end_entry()?;

        if self.mode == Mode::Interactive || decision == Decision::SwitchToNonInteractive {
            println!("{}", SEPARATOR);
        }

        Ok(outcome)
    }
}
