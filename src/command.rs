use solana_sdk::pubkey::Pubkey;
use url::Url;

/// Optional `transfer` switches, passed through to the wallet tool as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferFlags {
    /// create the recipient's token account if it does not exist yet
    pub fund_recipient: bool,
    /// allow sending to a recipient wallet with no SOL balance
    pub allow_unfunded_recipient: bool,
    pub extra: Vec<String>,
}

impl TransferFlags {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.fund_recipient {
            args.push("--fund-recipient".to_string());
        }
        if self.allow_unfunded_recipient {
            args.push("--allow-unfunded-recipient".to_string());
        }
        args.extend(self.extra.iter().cloned());
        args
    }
}

/// Everything except the recipient and the amount of a transfer invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferTemplate {
    pub program: String,
    pub mint: Pubkey,
    pub decimals: u8,
    pub endpoint: Url,
    pub flags: TransferFlags,
}

/// A fully resolved transfer for one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    /// 1-based position in the ledger
    pub index: usize,
    pub recipient: Pubkey,
    /// the amount actually sent, rounded to the token decimals
    pub amount: String,
    argv: Vec<String>,
}

impl TransferRequest {
    pub fn build(index: usize, recipient: Pubkey, share: f64, template: &TransferTemplate) -> Self {
        let amount = format_amount(share, template.decimals);

        let mut argv = vec![
            template.program.clone(),
            "transfer".to_string(),
            template.mint.to_string(),
            amount.clone(),
            recipient.to_string(),
            "--url".to_string(),
            template.endpoint.to_string(),
        ];
        argv.extend(template.flags.to_args());

        Self {
            index,
            recipient,
            amount,
            argv,
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Fixed-point rendering with exactly `decimals` fractional digits.
pub fn format_amount(amount: f64, decimals: u8) -> String {
    format!("{:.*}", decimals as usize, amount)
}
