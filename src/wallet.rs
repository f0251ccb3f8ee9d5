use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::error::DistributorError;
use crate::runner::CommandRunner;

// resolve the address of the wallet that pays for the distribution
pub fn resolve_wallet_address(runner: &dyn CommandRunner, wallet_program: &str) -> Result<Pubkey, DistributorError> {
    let argv = vec![wallet_program.to_string(), "address".to_string()];
    let output = runner.run(&argv)?;

    if !output.success() {
        return Err(DistributorError::WalletAddress(format!(
            "`{} address` exited with code {}: {}. Try checking the output of '{} address'.",
            wallet_program,
            output.exit_code,
            output.stderr_text().trim(),
            wallet_program
        )));
    }

    let stdout = output.stdout_text();
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| DistributorError::WalletAddress("empty output".to_string()))?;

    Pubkey::from_str(line)
        .map_err(|e| DistributorError::WalletAddress(format!("invalid address `{}`: {}", line, e)))
}
