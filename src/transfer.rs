use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

use crate::allocator::allocate;
use crate::command::format_amount;
use crate::config::Settings;
use crate::error::DistributorError;
use crate::ledger::RecipientLedger;
use crate::logs::{run_timestamp, LogWriter};
use crate::runner::CommandRunner;
use crate::session::{Mode, Operator, Session, SessionSummary};
use crate::wallet::resolve_wallet_address;

pub struct TransferService<'r> {
    settings: Settings,
    runner: &'r dyn CommandRunner,
    interrupted: Arc<AtomicBool>,
}

impl<'r> TransferService<'r> {
    pub fn new(settings: Settings, runner: &'r dyn CommandRunner, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            settings,
            runner,
            interrupted,
        }
    }

    /// Run a full distribution for the address list at `address_list`.
    ///
    /// Every precondition (wallet, drop amount, ledger, allocation) is checked
    /// before the log directory is created or any transfer is sent.
    pub fn distribute(&self, address_list: &Path, mode: Mode, operator: &mut dyn Operator) -> Result<SessionSummary> {
        let template = &self.settings.template;

        let wallet = resolve_wallet_address(self.runner, &self.settings.wallet_program)?;
        println!("WARNING: MAKE SURE YOU ARE USING THE CORRECT WALLET TO DISTRIBUTE.");
        println!("Your current wallet address is: {}", wallet);
        println!("Running airdrop for the Token Mint: {}", template.mint);

        let drop_amount = match (self.settings.drop_amount, mode) {
            (Some(amount), _) => amount,
            (None, Mode::Interactive) => operator.ask_drop_amount()?,
            (None, Mode::NonInteractive) => {
                return Err(DistributorError::Aborted(
                    "No airdrop amount was specified; use --drop in non-interactive mode".to_string(),
                )
                .into())
            }
        };
        println!(
            "Airdrop amount: {}\n",
            format_amount(drop_amount, template.decimals)
        );

        let ledger = RecipientLedger::load(address_list)?;
        let allocations = allocate(&ledger, drop_amount)?;
        info!(
            recipients = ledger.len(),
            total_balance = ledger.total_balance(),
            drop_amount,
            "allocation computed"
        );

        let logs = LogWriter::create(&self.settings.logs, &run_timestamp())
            .context("Failed to create log files")?;
        for line in logs.describe() {
            println!("{}", line);
        }
        println!();

        if !operator.confirm_start(mode)? {
            return Err(DistributorError::Aborted("Cancelling the airdrop.".to_string()).into());
        }

        let mut session = Session::new(
            template,
            self.settings.retry,
            allocations,
            mode,
            logs,
            self.interrupted.clone(),
        );
        let summary = session.run(self.runner, operator)?;

        info!(final_mode = session.mode().describe(), "session finished");
        println!(
            "Finished {} recipients: {} succeeded, {} failed, {} unconfirmed, {} canceled.",
            summary.total(),
            summary.success,
            summary.failed,
            summary.unconfirmed,
            summary.canceled
        );
        println!("Logs written to {}", session.logs().dir().display());
        println!("Done!");

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{TransferFlags, TransferTemplate};
    use crate::logs::LogLayout;
    use crate::retry::tests::{err_output, instant_policy, ok_output, ScriptedRunner};
    use crate::runner::ProcessOutput;
    use crate::session::tests::ScriptedOperator;
    use crate::session::Decision;
    use solana_sdk::{pubkey::Pubkey, signature::Signature};
    use std::fs;
    use url::Url;

    fn settings(log_dir: &Path, drop_amount: Option<f64>) -> Settings {
        Settings {
            template: TransferTemplate {
                program: "spl-token".to_string(),
                mint: Pubkey::new_unique(),
                decimals: 2,
                endpoint: Url::parse("http://localhost:8899").unwrap(),
                flags: TransferFlags::default(),
            },
            wallet_program: "solana".to_string(),
            retry: instant_policy(false),
            logs: LogLayout {
                base_dir: log_dir.to_path_buf(),
                ..LogLayout::default()
            },
            drop_amount,
        }
    }

    fn wallet_output() -> ProcessOutput {
        ProcessOutput {
            exit_code: 0,
            stdout: format!("{}\n", Pubkey::new_unique()).into_bytes(),
            stderr: Vec::new(),
        }
    }

    fn log_dir(base: &Path) -> std::path::PathBuf {
        fs::read_dir(base)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .find(|path| path.is_dir())
            .unwrap()
    }

    fn rows(dir: &Path, stream: &str) -> Vec<String> {
        fs::read_to_string(dir.join(stream))
            .unwrap()
            .lines()
            .skip(1)
            .map(str::to_string)
            .collect()
    }

    fn write_ledger(dir: &Path, entries: &[(Pubkey, f64)]) -> std::path::PathBuf {
        let path = dir.join("addresses.csv");
        let content: String = entries
            .iter()
            .map(|(address, balance)| format!("{},{}\n", address, balance))
            .collect();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn proportional_drop_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let list = write_ledger(tmp.path(), &[(a, 100.0), (b, 300.0)]);
        let sig_a = Signature::from([1u8; 64]);
        let sig_b = Signature::from([2u8; 64]);
        let runner = ScriptedRunner::new(vec![
            wallet_output(),
            ok_output(&sig_a.to_string()),
            ok_output(&sig_b.to_string()),
        ]);
        let logs = tmp.path().join("logs");
        let service = TransferService::new(settings(&logs, Some(40.0)), &runner, Arc::new(AtomicBool::new(false)));
        let mut operator = ScriptedOperator::new(vec![]);

        let summary = service.distribute(&list, Mode::NonInteractive, &mut operator).unwrap();

        assert_eq!(summary.success, 2);
        let calls = runner.calls.borrow();
        assert_eq!(calls[0], vec!["solana", "address"]);
        assert_eq!(calls[1][3], "10.00");
        assert_eq!(calls[1][4], a.to_string());
        assert_eq!(calls[2][3], "30.00");

        let success = rows(&log_dir(&logs), "success.log");
        assert_eq!(
            success,
            vec![format!("{},10.00,{}", a, sig_a), format!("{},30.00,{}", b, sig_b)]
        );
        let total: f64 = success
            .iter()
            .map(|row| row.split(',').nth(1).unwrap().parse::<f64>().unwrap())
            .sum();
        assert_eq!(format_amount(total, 2), "40.00");
    }

    #[test]
    fn all_on_third_recipient_stops_prompting() {
        let tmp = tempfile::tempdir().unwrap();
        let entries: Vec<_> = (1..=5).map(|i| (Pubkey::new_unique(), i as f64)).collect();
        let list = write_ledger(tmp.path(), &entries);
        let runner = ScriptedRunner::new(vec![wallet_output()]);
        let logs = tmp.path().join("logs");
        let service = TransferService::new(settings(&logs, Some(15.0)), &runner, Arc::new(AtomicBool::new(false)));
        let mut operator = ScriptedOperator::new(vec![
            Decision::Confirm,
            Decision::Cancel,
            Decision::SwitchToNonInteractive,
        ]);

        let summary = service.distribute(&list, Mode::Interactive, &mut operator).unwrap();

        assert_eq!(operator.reviews, 3);
        assert_eq!(summary.success, 4);
        assert_eq!(summary.canceled, 1);
        // wallet lookup plus four transfers
        assert_eq!(runner.call_count(), 5);
        assert_eq!(rows(&log_dir(&logs), "canceled.log"), vec![format!("{},2.00", entries[1].0)]);
    }

    #[test]
    fn rate_limit_without_retry_ends_unconfirmed() {
        let tmp = tempfile::tempdir().unwrap();
        let a = Pubkey::new_unique();
        let list = write_ledger(tmp.path(), &[(a, 1.0)]);
        let runner = ScriptedRunner::new(vec![wallet_output(), err_output("Error: 429 Too Many Requests")]);
        let logs = tmp.path().join("logs");
        let service = TransferService::new(settings(&logs, Some(3.0)), &runner, Arc::new(AtomicBool::new(false)));
        let mut operator = ScriptedOperator::new(vec![]);

        let summary = service.distribute(&list, Mode::NonInteractive, &mut operator).unwrap();

        assert_eq!(summary.unconfirmed, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(runner.call_count(), 2);
        let dir = log_dir(&logs);
        assert_eq!(
            rows(&dir, "unconfirmed.log"),
            vec![format!("{},3.00,Error: 429 Too Many Requests", a)]
        );
        assert!(rows(&dir, "failed.log").is_empty());
    }

    #[test]
    fn wallet_failure_aborts_before_any_transfer() {
        let tmp = tempfile::tempdir().unwrap();
        let list = write_ledger(tmp.path(), &[(Pubkey::new_unique(), 1.0)]);
        let runner = ScriptedRunner::new(vec![err_output("Error: no config file")]);
        let logs = tmp.path().join("logs");
        let service = TransferService::new(settings(&logs, Some(1.0)), &runner, Arc::new(AtomicBool::new(false)));
        let mut operator = ScriptedOperator::new(vec![]);

        let err = service.distribute(&list, Mode::NonInteractive, &mut operator).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DistributorError>(),
            Some(DistributorError::WalletAddress(_))
        ));
        assert_eq!(runner.call_count(), 1);
        assert!(!logs.exists());
    }

    #[test]
    fn zero_balances_abort_before_logs_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let list = write_ledger(tmp.path(), &[(Pubkey::new_unique(), 0.0), (Pubkey::new_unique(), 0.0)]);
        let runner = ScriptedRunner::new(vec![wallet_output()]);
        let logs = tmp.path().join("logs");
        let service = TransferService::new(settings(&logs, Some(1.0)), &runner, Arc::new(AtomicBool::new(false)));
        let mut operator = ScriptedOperator::new(vec![]);

        let err = service.distribute(&list, Mode::NonInteractive, &mut operator).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DistributorError>(),
            Some(DistributorError::ZeroTotalBalance)
        ));
        assert_eq!(runner.call_count(), 1);
        assert!(!logs.exists());
    }

    #[test]
    fn missing_drop_amount_is_asked_interactively() {
        let tmp = tempfile::tempdir().unwrap();
        let a = Pubkey::new_unique();
        let list = write_ledger(tmp.path(), &[(a, 7.0)]);
        let runner = ScriptedRunner::new(vec![wallet_output()]);
        let logs = tmp.path().join("logs");
        let service = TransferService::new(settings(&logs, None), &runner, Arc::new(AtomicBool::new(false)));
        let mut operator = ScriptedOperator::new(vec![]);

        service.distribute(&list, Mode::Interactive, &mut operator).unwrap();

        assert_eq!(runner.calls.borrow()[1][3], "40.00");

        let runner = ScriptedRunner::new(vec![wallet_output()]);
        let service = TransferService::new(settings(&logs, None), &runner, Arc::new(AtomicBool::new(false)));
        assert!(service.distribute(&list, Mode::NonInteractive, &mut operator).is_err());
    }

    #[test]
    fn declining_start_sends_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let list = write_ledger(tmp.path(), &[(Pubkey::new_unique(), 1.0)]);
        let runner = ScriptedRunner::new(vec![wallet_output()]);
        let logs = tmp.path().join("logs");
        let service = TransferService::new(settings(&logs, Some(1.0)), &runner, Arc::new(AtomicBool::new(false)));
        let mut operator = ScriptedOperator::new(vec![]);
        operator.start = false;

        let err = service.distribute(&list, Mode::Interactive, &mut operator).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DistributorError>(),
            Some(DistributorError::Aborted(_))
        ));
        assert_eq!(runner.call_count(), 1);
        assert_eq!(rows(&log_dir(&logs), "success.log").len(), 0);
    }
}
