use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bankdesk")]
#[command(about = "Account console for Extra Credit Union")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        /// Defaults to the last username used
        username: Option<String>,
    },
    /// Remove the stored session
    Logout,
    /// Show who is signed in, after validating the stored session
    Status,
    /// Accounts overview and top spenders
    Dashboard,
    /// List accounts, or show one account in detail
    Accounts {
        id: Option<String>,
    },
    /// Open a new account
    OpenAccount {
        name: String,
        starting_balance: String,
        #[arg(long, default_value = "personal")]
        account_type: String,
        #[arg(long)]
        postcode: Option<String>,
        #[arg(long)]
        round_up: bool,
    },
    /// Current balance of an account
    Balance {
        id: String,
    },
    /// Toggle round-up savings for an account
    Roundup {
        id: String,
    },
    /// Move the round-up pot back into the account
    Reclaim {
        id: String,
    },
    /// Spending grouped by recipient
    Trends {
        id: String,
    },
    /// List transactions, optionally for one account
    Transactions {
        account_id: Option<String>,
    },
    /// Create a transaction
    Pay {
        from_account: String,
        amount: String,
        #[arg(long)]
        to: Option<String>,
        /// payment, withdrawal, deposit or transfer
        #[arg(long = "type", default_value = "payment")]
        transaction_type: String,
    },
    /// Top 10 spenders
    TopSpenders,
    /// List businesses, optionally filtered by name or category
    Businesses {
        filter: Option<String>,
    },
    /// Register a business
    AddBusiness {
        name: String,
        category: String,
    },
    /// Set or clear the sanction flag on a business
    Sanction {
        id: String,
        #[arg(action = clap::ArgAction::Set)]
        sanctioned: bool,
    },
    /// Print the config file path
    ConfigPath,
}
