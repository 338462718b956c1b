use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use remit_core::cli::{self, AccountCommands, Cli, Commands, DbCommands};
use remit_core::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Worker) {
        Commands::Worker => cli::handle_worker(&config).await,
        Commands::Account(AccountCommands::Add {
            holder,
            account_number,
            deposit,
        }) => cli::handle_account_add(&config, holder, account_number, deposit).await,
        Commands::Account(AccountCommands::List) => cli::handle_account_list(&config).await,
        Commands::Transfer {
            sender_id,
            receiver_account,
            amount,
        } => cli::handle_transfer(&config, sender_id, receiver_account, amount).await,
        Commands::Schedule {
            sender_id,
            receiver_account,
            amount,
            eta,
        } => cli::handle_schedule(&config, sender_id, receiver_account, amount, eta).await,
        Commands::Status { job_id } => cli::handle_status(&config, job_id).await,
        Commands::Transactions { account_id } => {
            cli::handle_transactions(&config, account_id).await
        }
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
    }
}
