use std::io::{BufRead, Write};

use anyhow::Result;
use rand::Rng;
use tracing::warn;

use crate::application::{AppError, BankService};
use crate::domain::{Amount, CardNumber, parse_amount};

const MAIN_MENU: &str = "1. Create an account\n2. Log into account\n0. Exit\n";

const ACCOUNT_MENU: &str = "1. Balance\n\
                            2. Add income\n\
                            3. Do transfer\n\
                            4. Close account\n\
                            5. Log out\n\
                            0. Exit\n";

const GENERIC_FAILURE: &str = "An error occurred, please try again.";

/// What the caller should do after a menu action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Line-based interactive session over any input and output streams.
///
/// The session only formats prompts and results; every decision about
/// accounts is made by [`BankService`].
pub struct Session<'a, R, I, O> {
    service: &'a BankService<R>,
    input: I,
    output: O,
}

impl<'a, R: Rng, I: BufRead, O: Write> Session<'a, R, I, O> {
    pub fn new(service: &'a BankService<R>, input: I, output: O) -> Self {
        Self {
            service,
            input,
            output,
        }
    }

    /// Run the main menu until the user exits or the input ends.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            write!(self.output, "{MAIN_MENU}")?;
            let Some(choice) = self.read_line()? else {
                break;
            };

            let flow = match choice.as_str() {
                "1" => self.create_account().await?,
                "2" => self.log_in().await?,
                "0" => Flow::Exit,
                _ => {
                    writeln!(self.output, "Unknown command, please try again")?;
                    Flow::Continue
                }
            };

            if flow == Flow::Exit {
                break;
            }
        }

        writeln!(self.output, "Bye!")?;
        self.output.flush()?;
        Ok(())
    }

    /// Consume the session and hand back the output stream.
    pub fn into_output(self) -> O {
        self.output
    }

    async fn create_account(&mut self) -> Result<Flow> {
        match self.service.create_account().await {
            Ok(card) => {
                write!(
                    self.output,
                    "\nYour card has been created\n\
                     Your card number:\n{}\n\
                     Your card PIN:\n{}\n\n",
                    card.card_number, card.pin
                )?;
            }
            Err(err) => self.report_failure(&err)?,
        }
        Ok(Flow::Continue)
    }

    async fn log_in(&mut self) -> Result<Flow> {
        writeln!(self.output, "\nEnter your card number:")?;
        let Some(card_number) = self.read_line()? else {
            return Ok(Flow::Exit);
        };
        writeln!(self.output, "Enter your PIN:")?;
        let Some(pin) = self.read_line()? else {
            return Ok(Flow::Exit);
        };

        match self.service.login(&card_number, &pin).await {
            Ok(card) => self.account_menu(card).await,
            Err(AppError::StorageUnavailable(err)) => {
                warn!(error = %err, "login failed on storage error");
                writeln!(self.output, "{GENERIC_FAILURE}\n")?;
                Ok(Flow::Continue)
            }
            Err(_) => {
                writeln!(self.output, "Wrong card number or PIN!\n")?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn account_menu(&mut self, card: CardNumber) -> Result<Flow> {
        writeln!(self.output, "\nYou have successfully logged in!\n")?;

        loop {
            write!(self.output, "{ACCOUNT_MENU}")?;
            let Some(choice) = self.read_line()? else {
                return Ok(Flow::Exit);
            };

            match choice.as_str() {
                "1" => self.show_balance(&card).await?,
                "2" => {
                    if self.deposit(&card).await? == Flow::Exit {
                        return Ok(Flow::Exit);
                    }
                }
                "3" => {
                    if self.transfer(&card).await? == Flow::Exit {
                        return Ok(Flow::Exit);
                    }
                }
                "4" => {
                    self.close_account(&card).await?;
                    return Ok(Flow::Continue);
                }
                "5" => {
                    writeln!(self.output, "\nYou have successfully logged out!\n")?;
                    return Ok(Flow::Continue);
                }
                "0" => return Ok(Flow::Exit),
                _ => writeln!(self.output, "Unknown command, please try again")?,
            }
        }
    }

    async fn show_balance(&mut self, card: &CardNumber) -> Result<()> {
        match self.service.get_balance(card).await {
            Ok(balance) => writeln!(self.output, "\nBalance: {balance}\n")?,
            Err(err) => self.report_failure(&err)?,
        }
        Ok(())
    }

    async fn deposit(&mut self, card: &CardNumber) -> Result<Flow> {
        writeln!(self.output, "\nEnter income:")?;
        let Some(amount) = self.read_amount()? else {
            return Ok(Flow::Exit);
        };

        match self.service.deposit(card, amount).await {
            Ok(()) => writeln!(self.output, "Income was added!\n")?,
            Err(err) => self.report_failure(&err)?,
        }
        Ok(Flow::Continue)
    }

    async fn transfer(&mut self, card: &CardNumber) -> Result<Flow> {
        writeln!(self.output, "\nTransfer\nEnter card number:")?;
        let Some(recipient) = self.read_line()? else {
            return Ok(Flow::Exit);
        };

        let Ok(to) = CardNumber::parse(&recipient) else {
            writeln!(
                self.output,
                "Probably you made a mistake in the card number. Please try again!\n"
            )?;
            return Ok(Flow::Continue);
        };

        match self.service.account_exists(&to).await {
            Ok(true) => {}
            Ok(false) => {
                writeln!(self.output, "Such a card does not exist.\n")?;
                return Ok(Flow::Continue);
            }
            Err(err) => {
                self.report_failure(&err)?;
                return Ok(Flow::Continue);
            }
        }

        writeln!(self.output, "Enter how much money you want to transfer:")?;
        let Some(amount) = self.read_amount()? else {
            return Ok(Flow::Exit);
        };

        match self.service.transfer_funds(card, &recipient, amount).await {
            Ok(()) => writeln!(self.output, "Success!\n")?,
            Err(AppError::InsufficientFunds { .. }) => writeln!(self.output, "Not enough money!\n")?,
            Err(AppError::AccountNotFound(_)) => {
                writeln!(self.output, "Such a card does not exist.\n")?
            }
            Err(err) => self.report_failure(&err)?,
        }
        Ok(Flow::Continue)
    }

    async fn close_account(&mut self, card: &CardNumber) -> Result<()> {
        match self.service.close_account(card).await {
            Ok(true) => writeln!(self.output, "\nThe account has been closed!\n")?,
            Ok(false) => writeln!(self.output, "\n{GENERIC_FAILURE}\n")?,
            Err(err) => self.report_failure(&err)?,
        }
        Ok(())
    }

    fn report_failure(&mut self, err: &AppError) -> Result<()> {
        warn!(error = %err, "operation failed");
        writeln!(self.output, "{GENERIC_FAILURE}\n")?;
        Ok(())
    }

    /// Prompt until the user types a non-negative whole number.
    /// Returns `None` at end of input.
    fn read_amount(&mut self) -> Result<Option<Amount>> {
        loop {
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            match parse_amount(&line) {
                Ok(amount) => return Ok(Some(amount)),
                Err(_) => writeln!(self.output, "Please enter a number:")?,
            }
        }
    }

    /// Read one trimmed line. Returns `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}
