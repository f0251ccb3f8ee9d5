use anyhow::{anyhow, Result};
use std::io::{self, BufRead, Write};

use crate::command::TransferRequest;
use crate::session::{Decision, Mode, Operator, SEPARATOR};

/// Operator prompts on a terminal (or any reader/writer pair).
pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
}

impl ConsoleOperator<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        if read == 0 {
            return Err(anyhow!("Input closed while waiting for an answer"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn confirm_start(&mut self, mode: Mode) -> Result<bool> {
        let detail = match mode {
            Mode::Interactive => "You will be prompted to confirm each transaction.",
            Mode::NonInteractive => "The airdrop will run without additional confirmations.",
        };
        writeln!(self.output, "Running the airdrop in {} mode. {}", mode.describe(), detail)?;
        writeln!(self.output, "{}", SEPARATOR)?;
        write!(self.output, "Enter Y to proceed\n> ")?;
        self.output.flush()?;

        Ok(self.read_line()? == "Y")
    }

    fn review(&mut self, request: &TransferRequest) -> Result<Decision> {
        writeln!(
            self.output,
            "Sending {} tokens to recipient at: {}.",
            request.amount, request.recipient
        )?;
        writeln!(self.output, "Cmd to be ran:\n    {}", request.command_line())?;
        write!(
            self.output,
            "Press ENTER to confirm | Type anything to CANCEL | Type ALL to switch to non-interactive mode\n> "
        )?;
        self.output.flush()?;

        let decision = match self.read_line()?.as_str() {
            "" => Decision::Confirm,
            "ALL" => Decision::SwitchToNonInteractive,
            _ => Decision::Cancel,
        };
        Ok(decision)
    }

    // re-ask until a positive number is entered
    fn ask_drop_amount(&mut self) -> Result<f64> {
        loop {
            write!(self.output, "No airdrop amount was specified. Please enter the amount.\n> ")?;
            self.output.flush()?;

            match self.read_line()?.trim().parse::<f64>() {
                Ok(value) if value.is_finite() && value > 0.0 => return Ok(value),
                Ok(_) => writeln!(self.output, "Airdrop amount must be greater than 0.")?,
                Err(_) => writeln!(self.output, "Not a number.")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{TransferFlags, TransferTemplate};
    use solana_sdk::pubkey::Pubkey;
    use url::Url;

    fn operator(input: &str) -> ConsoleOperator<&[u8], Vec<u8>> {
        ConsoleOperator::new(input.as_bytes(), Vec::new())
    }

    fn request() -> TransferRequest {
        let template = TransferTemplate {
            program: "spl-token".to_string(),
            mint: Pubkey::new_unique(),
            decimals: 2,
            endpoint: Url::parse("http://localhost:8899").unwrap(),
            flags: TransferFlags::default(),
        };
        TransferRequest::build(1, Pubkey::new_unique(), 2.5, &template)
    }

    #[test]
    fn review_answers() {
        let mut op = operator("\nALL\nno\n");
        let request = request();

        assert_eq!(op.review(&request).unwrap(), Decision::Confirm);
        assert_eq!(op.review(&request).unwrap(), Decision::SwitchToNonInteractive);
        assert_eq!(op.review(&request).unwrap(), Decision::Cancel);

        let shown = String::from_utf8(op.output).unwrap();
        assert!(shown.contains("Sending 2.50 tokens"));
        assert!(shown.contains(&request.command_line()));
    }

    #[test]
    fn closed_input_is_an_error() {
        assert!(operator("").review(&request()).is_err());
    }

    #[test]
    fn start_requires_capital_y() {
        assert!(operator("Y\n").confirm_start(Mode::Interactive).unwrap());
        assert!(!operator("y\n").confirm_start(Mode::NonInteractive).unwrap());
    }

    #[test]
    fn drop_amount_reprompts_until_positive() {
        let mut op = operator("abc\n-4\n0\n12.5\n");

        assert_eq!(op.ask_drop_amount().unwrap(), 12.5);

        let shown = String::from_utf8(op.output).unwrap();
        assert_eq!(shown.matches("Please enter the amount").count(), 4);
        assert_eq!(shown.matches("must be greater than 0").count(), 2);
    }
}
