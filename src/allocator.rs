use solana_sdk::pubkey::Pubkey;

use crate::error::DistributorError;
use crate::ledger::RecipientLedger;

/// One recipient's share of the drop, before rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    pub recipient: Pubkey,
    pub share: f64,
}

/// `drop_amount / sum(balances)`, computed once per run.
pub fn proportional_factor(ledger: &RecipientLedger, drop_amount: f64) -> Result<f64, DistributorError> {
    if !drop_amount.is_finite() || drop_amount <= 0.0 {
        return Err(DistributorError::InvalidDropAmount(drop_amount));
    }

    let total = ledger.total_balance();
    if total <= 0.0 {
        return Err(DistributorError::ZeroTotalBalance);
    }

    Ok(drop_amount / total)
}

/// Split `drop_amount` across the ledger proportionally to each balance.
///
/// Output keeps the ledger order. Shares are not rounded here; the amount
/// actually sent is fixed when the transfer command is built.
pub fn allocate(ledger: &RecipientLedger, drop_amount: f64) -> Result<Vec<Allocation>, DistributorError> {
    let factor = proportional_factor(ledger, drop_amount)?;

    Ok(ledger
        .iter()
        .map(|(recipient, balance)| Allocation {
            recipient: *recipient,
            share: balance * factor,
        })
        .collect())
}
