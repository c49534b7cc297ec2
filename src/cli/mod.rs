mod session;

pub use session::Session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::application::{AppError, BankService};
use crate::domain::CardNumber;
use crate::logging::{self, LogFormat};

/// Initialisation attempts made before the program gives up.
pub const DEFAULT_INIT_ATTEMPTS: u32 = 5;

/// Cardbank - terminal banking simulator
#[derive(Parser)]
#[command(name = "cardbank")]
#[command(about = "Issue cards, log in with a PIN, deposit and transfer against a local ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(
        short,
        long,
        alias = "fileName",
        env = "CARDBANK_DB",
        default_value = "card.s3db"
    )]
    pub database: String,

    /// How many times to try opening the database before giving up
    #[arg(
        long,
        default_value_t = DEFAULT_INIT_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub init_attempts: u32,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive banking menu (default)
    Shell,

    /// Initialize the database and exit
    Init,

    /// Issue a new card and print its number and PIN
    Issue,

    /// Check whether a card number is well-formed
    Check {
        /// Card number to check
        card_number: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        logging::init_logging(logging::default_directive(self.verbose), self.log_format);

        match self.command.unwrap_or(Commands::Shell) {
            Commands::Shell => {
                let service = open_service(&self.database, self.init_attempts).await?;
                let stdin = std::io::stdin();
                let stdout = std::io::stdout();
                Session::new(&service, stdin.lock(), stdout.lock())
                    .run()
                    .await?;
            }

            Commands::Init => {
                let service = open_service(&self.database, self.init_attempts).await?;
                let count = service.account_count().await?;
                println!("Database initialized: {} ({} accounts)", self.database, count);
            }

            Commands::Issue => {
                let service = open_service(&self.database, self.init_attempts).await?;
                let card = service.create_account().await?;
                println!("Card number: {}", card.card_number);
                println!("PIN: {}", card.pin);
            }

            Commands::Check { card_number } => match CardNumber::parse(&card_number) {
                Ok(card) => println!("{}: valid", card),
                Err(err) => println!("{}: invalid ({})", card_number, err),
            },
        }

        Ok(())
    }
}

/// Initialize the ledger, retrying up to `attempts` times.
/// At least one attempt is always made.
pub async fn initialize_with_retries(
    database: &str,
    attempts: u32,
) -> Result<BankService, AppError> {
    let mut attempt = 1;
    loop {
        match BankService::init(database).await {
            Ok(service) => {
                info!(database, attempt, "database ready");
                return Ok(service);
            }
            Err(err) if attempt < attempts => {
                warn!(database, attempt, attempts, error = %err, "database initialisation failed, retrying");
                attempt += 1;
            }
            Err(err) => {
                warn!(database, attempt, error = %err, "database initialisation failed, giving up");
                return Err(err);
            }
        }
    }
}

async fn open_service(database: &str, attempts: u32) -> Result<BankService> {
    initialize_with_retries(database, attempts)
        .await
        .with_context(|| {
            format!(
                "Database '{}' failed to initialise after {} attempts. Please rerun the program and try again.",
                database, attempts
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_attempts_default() {
        let cli = Cli::try_parse_from(["cardbank"]).unwrap();
        assert_eq!(cli.init_attempts, DEFAULT_INIT_ATTEMPTS);
        assert_eq!(cli.database, "card.s3db");
    }

    #[test]
    fn test_init_attempts_rejects_zero() {
        assert!(Cli::try_parse_from(["cardbank", "--init-attempts", "0"]).is_err());
        let cli = Cli::try_parse_from(["cardbank", "--init-attempts", "1"]).unwrap();
        assert_eq!(cli.init_attempts, 1);
    }
}
