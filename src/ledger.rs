use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::DistributorError;

/// Recipient addresses and their recorded balances, in input order.
///
/// The order of entries is the processing order for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipientLedger {
    entries: Vec<(Pubkey, f64)>,
}

impl RecipientLedger {
    /// Parse the `address,balance` format, one pair per line, no header.
    pub fn parse(content: &str) -> Result<Self, DistributorError> {
        let mut entries = Vec::new();
        let mut seen: HashMap<Pubkey, usize> = HashMap::new();

        for (i, raw) in content.lines().enumerate() {
            let line = i + 1;
            if raw.trim().is_empty() {
                continue;
            }

            let (recipient, balance) = parse_line(raw)
                .map_err(|reason| DistributorError::InvalidLedgerLine { line, reason })?;

            if let Some(first_line) = seen.insert(recipient, line) {
                return Err(DistributorError::DuplicateRecipient {
                    recipient,
                    line,
                    first_line,
                });
            }
            entries.push((recipient, balance));
        }

        if entries.is_empty() {
            return Err(DistributorError::EmptyLedger);
        }

        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read address list {}", path.display()))?;
        let ledger = Self::parse(&content)?;
        Ok(ledger)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total_balance(&self) -> f64 {
        self.entries.iter().map(|(_, balance)| balance).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Pubkey, f64)> {
        self.entries.iter()
    }
}

fn parse_line(raw: &str) -> Result<(Pubkey, f64), String> {
    let mut fields = raw.split(',');
    let (address, balance) = match (fields.next(), fields.next(), fields.next()) {
        (Some(address), Some(balance), None) => (address.trim(), balance.trim()),
        _ => return Err(format!("expected `address,balance`, got `{}`", raw.trim())),
    };

    if address.is_empty() {
        return Err("empty address".to_string());
    }
    let recipient = Pubkey::from_str(address)
        .map_err(|e| format!("invalid address `{}`: {}", address, e))?;

    let balance: f64 = balance
        .parse()
        .map_err(|e| format!("invalid balance `{}`: {}", balance, e))?;
    if !balance.is_finite() || balance < 0.0 {
        return Err(format!("balance {} is not a non-negative number", balance));
    }

    Ok((recipient, balance))
}
