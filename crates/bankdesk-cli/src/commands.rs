//! Subcommand handlers.
//!
//! Each handler only talks to the core through `BankClient` and the
//! session manager; output is plain text for the terminal.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use futures::future::{try_join, try_join4};
use tracing::warn;

use bankdesk_core::auth::Hydration;
use bankdesk_core::models::{
    Account, Business, Money, NewAccount, NewBusiness, NewTransaction, Transaction,
};
use bankdesk_core::{BankClient, Config, Session, SessionStatus};

use crate::cli::Commands;

pub async fn run(command: Commands, client: &BankClient, config: &mut Config) -> Result<()> {
    let session = client.gateway().session();

    match command {
        Commands::Login { username } => login(client, config, username).await,
        Commands::Logout => {
            session.logout();
            println!("Signed out.");
            Ok(())
        }
        Commands::Status => {
            let settled = session.hydrate().settled().await;
            print_status(&settled);
            Ok(())
        }
        Commands::ConfigPath => {
            println!("{}", Config::config_path()?.display());
            Ok(())
        }
        command => {
            let hydration = require_session(client)?;
            let result = dispatch(command, client).await;
            // Let background validation finish so a refreshed token is persisted
            hydration.settled().await;
            result
        }
    }
}

fn require_session(client: &BankClient) -> Result<Hydration> {
    let hydration = client.gateway().session().hydrate();
    if !hydration.session.is_authenticated() {
        bail!("Not signed in. Run `bankdesk login` first.");
    }
    Ok(hydration)
}

async fn login(client: &BankClient, config: &mut Config, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| config.last_username.clone()) {
        Some(name) => name.trim().to_string(),
        None => prompt("Username: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", username))
        .context("Failed to read password")?;
    check_credentials(&username, &password)?;

    match client.gateway().session().login(&username, &password).await {
        Ok(session) => {
            println!("Signed in as {}.", session.username().unwrap_or(&username));
            config.last_username = Some(username);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            Ok(())
        }
        Err(e) => bail!("{}", e),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Nothing is sent to the server unless both fields are filled in.
fn check_credentials(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() || password.is_empty() {
        bail!("Please enter both username and password");
    }
    Ok(())
}

fn status_lines(session: &Session) -> Vec<String> {
    let mut lines = vec![match session.status {
        SessionStatus::Authenticated => {
            format!("Signed in as {}.", session.username().unwrap_or("unknown"))
        }
        SessionStatus::RefreshFailed => "Session expired.".to_string(),
        SessionStatus::Authenticating => "Signing in...".to_string(),
        SessionStatus::Unauthenticated => "Not signed in.".to_string(),
    }];
    if let Some(ref error) = session.last_error {
        lines.push(error.clone());
    }
    lines
}

fn print_status(session: &Session) {
    for line in status_lines(session) {
        println!("{}", line);
    }
}

async fn dispatch(command: Commands, client: &BankClient) -> Result<()> {
    match command {
        Commands::Dashboard => {
            let (accounts, spenders) = try_join(client.accounts(), client.top_spenders()).await?;
            println!("Accounts");
            print_accounts(&accounts);
            println!();
            println!("Top spenders");
            if spenders.is_empty() {
                println!("  No spending data yet.");
            }
            for spender in spenders.iter().take(5) {
                println!("  {:<30} £{}", spender.name(), spender.total_spent.display());
            }
        }
        Commands::Accounts { id: None } => print_accounts(&client.accounts().await?),
        Commands::Accounts { id: Some(id) } => {
            let (account, balance, transactions, trends) = try_join4(
                client.account(&id),
                client.current_balance(&id),
                client.account_transactions(&id),
                client.spending_trends(&id),
            )
            .await?;
            print_account_detail(&account, &balance.current_balance);
            println!();
            print_transactions(&transactions);
            println!();
            println!("Spending trends");
            if trends.is_empty() {
                println!("  No spending trends data available.");
            }
            for trend in &trends {
                println!("  {:<30} £{}", trend.recipient(), trend.total.display());
            }
        }
        Commands::OpenAccount {
            name,
            starting_balance,
            account_type,
            postcode,
            round_up,
        } => {
            let new = NewAccount {
                name,
                starting_balance: Money::new(starting_balance),
                round_up_enabled: round_up,
                postcode,
                account_type,
            };
            new.validate().map_err(anyhow::Error::msg)?;
            let account = client.create_account(&new).await?;
            println!("Opened account {} ({}).", account.name, account.id);
        }
        Commands::Balance { id } => {
            let balance = client.current_balance(&id).await?;
            println!("£{}", balance.current_balance.display());
        }
        Commands::Roundup { id } => {
            let status = client.toggle_round_up(&id).await?;
            println!("{}", status.message());
        }
        Commands::Reclaim { id } => {
            let account = client.account(&id).await?;
            if !account.can_reclaim_round_up() {
                bail!("Round Up is disabled for {}; enable it before reclaiming.", account.name);
            }
            let reclaim = client.reclaim_round_up(&id).await?;
            println!(
                "Round Up reclaimed successfully: £{}",
                reclaim.reclaim_amount.display()
            );
            let balance = client.current_balance(&id).await?;
            println!("Current balance: £{}", balance.current_balance.display());
        }
        Commands::Trends { id } => {
            for trend in client.spending_trends(&id).await? {
                println!("{:<30} £{}", trend.recipient(), trend.total.display());
            }
        }
        Commands::Transactions { account_id } => {
            let transactions = match account_id {
                Some(id) => client.account_transactions(&id).await?,
                None => client.transactions().await?,
            };
            print_transactions(&transactions);
        }
        Commands::Pay {
            from_account,
            amount,
            to,
            transaction_type,
        } => {
            let new = NewTransaction {
                transaction_type: transaction_type.into(),
                amount: Money::new(amount),
                from_account,
                to_account: to.filter(|t| !t.is_empty()),
            };
            new.validate().map_err(anyhow::Error::msg)?;
            let created = client.create_transaction(&new).await?;
            println!(
                "Created {} of £{} from account {}.",
                created.transaction_type,
                created.amount.display(),
                created.from_account
            );
        }
        Commands::TopSpenders => {
            for spender in client.top_spenders().await? {
                println!("{:<30} £{}", spender.name(), spender.total_spent.display());
            }
        }
        Commands::Businesses { filter } => {
            let query = filter.unwrap_or_default();
            let businesses = client.businesses().await?;
            let matching: Vec<&Business> = businesses.iter().filter(|b| b.matches(&query)).collect();
            if matching.is_empty() {
                println!("No businesses found.");
            }
            for business in matching {
                println!(
                    "{:<6} {:<30} {:<20} {}",
                    business.id,
                    business.name,
                    business.category,
                    business.sanction_display()
                );
            }
        }
        Commands::AddBusiness { name, category } => {
            let new = NewBusiness {
                name,
                category,
                sanctioned: false,
            };
            new.validate().map_err(anyhow::Error::msg)?;
            let business = client.create_business(&new).await?;
            println!("Added business {} ({}).", business.name, business.id);
        }
        Commands::Sanction { id, sanctioned } => {
            let business = client.set_business_sanction(&id, sanctioned).await?;
            println!("{} is now {}.", business.name, business.sanction_display().to_lowercase());
        }
        Commands::Login { .. } | Commands::Logout | Commands::Status | Commands::ConfigPath => {
            unreachable!("handled before session hydration")
        }
    }
    Ok(())
}

fn print_accounts(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("  No accounts found.");
    }
    for account in accounts {
        println!(
            "  {:<6} {:<24} {:<10} £{:>10}  Round Up: {}",
            account.id,
            account.name,
            account.account_type,
            account.starting_balance.display(),
            account.round_up_display()
        );
    }
}

fn print_account_detail(account: &Account, balance: &Money) {
    println!("{} ({})", account.name, account.account_type);
    println!("  Starting balance: £{}", account.starting_balance.display());
    println!("  Current balance:  £{}", balance.display());
    println!("  Round Up:         {}", account.round_up_display());
    if let Some(ref pot) = account.round_up_pot {
        println!("  Round Up pot:     £{}", pot.display());
    }
    if let Some(ref postcode) = account.postcode {
        println!("  Postcode:         {}", postcode);
    }
}

fn print_transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions found.");
    }
    for t in transactions {
        println!(
            "{}  {:<10} £{:>10}  {} -> {}",
            t.timestamp.format("%Y-%m-%d %H:%M"),
            t.transaction_type.display_name(),
            t.amount.display(),
            t.from_account,
            t.to_account.as_deref().unwrap_or("-")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use bankdesk_core::api::{HttpRequest, HttpResponse, NoopNavigator, Transport, TransportError};
    use bankdesk_core::auth::{CredentialPair, MemoryStore, User};
    use bankdesk_core::{Gateway, SessionManager, TokenStore};
    use reqwest::StatusCode;

    /// Accepts every refresh and counts what reached the network.
    #[derive(Default)]
    struct RefreshingServer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for RefreshingServer {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse::new(StatusCode::OK, r#"{"access":"a2"}"#))
        }
    }

    fn client(store: Arc<MemoryStore>) -> (BankClient, Arc<RefreshingServer>) {
        let server = Arc::new(RefreshingServer::default());
        let session = Arc::new(SessionManager::new(server.clone(), store, "http://bank.test/api"));
        let gateway = Gateway::new(session, server.clone(), Arc::new(NoopNavigator), "/login");
        (BankClient::new(gateway), server)
    }

    fn signed_in_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .save_session(
                &CredentialPair {
                    access_token: "a1".to_string(),
                    refresh_token: "r1".to_string(),
                },
                &User {
                    username: "alice".to_string(),
                },
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_require_session_rejects_empty_store() {
        let (client, server) = client(Arc::new(MemoryStore::new()));

        let err = require_session(&client).err().unwrap();

        assert!(err.to_string().contains("bankdesk login"));
        assert_eq!(server.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_require_session_accepts_stored_session() {
        let store = signed_in_store();
        let (client, server) = client(store.clone());

        let hydration = require_session(&client).unwrap();
        assert_eq!(hydration.session.username(), Some("alice"));

        let settled = hydration.settled().await;
        assert!(settled.is_authenticated());
        assert_eq!(server.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("accessToken").unwrap().as_deref(), Some("a2"));
    }

    #[test]
    fn test_check_credentials_requires_both_fields() {
        for (username, password) in [("", "secret"), ("   ", "secret"), ("alice", "")] {
            let err = check_credentials(username, password).unwrap_err();
            assert_eq!(err.to_string(), "Please enter both username and password");
        }
        assert!(check_credentials("alice", "secret").is_ok());
    }

    #[test]
    fn test_status_lines() {
        let signed_in = Session {
            user: Some(User {
                username: "alice".to_string(),
            }),
            status: SessionStatus::Authenticated,
            last_error: None,
        };
        assert_eq!(status_lines(&signed_in), vec!["Signed in as alice."]);

        let expired = Session {
            user: None,
            status: SessionStatus::RefreshFailed,
            last_error: Some("Your session has expired. Please sign in again.".to_string()),
        };
        assert_eq!(
            status_lines(&expired),
            vec![
                "Session expired.",
                "Your session has expired. Please sign in again."
            ]
        );

        assert_eq!(status_lines(&Session::default()), vec!["Not signed in."]);
    }
}
