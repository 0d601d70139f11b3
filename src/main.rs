// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sleek::{
    export_order_history_csv, AppIdentity, Config, LocalProgram, MockWallet, SleekApp,
    SubscriptionStatus, WalletAddress, WalletService,
};
use sleek::wallet::RECOMMENDED_WALLETS;

#[derive(Parser, Debug)]
#[command(author, version, about = "Subscriptions with crypto payments and cashback", long_about = None)]
struct Cli {
    #[clap(flatten)]
    verbose: clap_verbosity_flag::Verbosity,
    /// Config file (defaults to ./sleek.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List categories and plans
    Catalog {
        #[arg(long)]
        category: Option<String>,
    },
    /// Search plans by name
    Search { query: String },
    /// Pay for a plan and activate it
    Buy {
        name: String,
        /// Paying wallet (base58 or base64)
        #[arg(long, env = "SLEEK_WALLET")]
        wallet: String,
    },
    /// Cashback balance and redemption
    Cashback {
        #[command(subcommand)]
        action: CashbackAction,
    },
    /// Activated subscriptions
    Subscriptions {
        /// Include expired
        #[arg(long)]
        all: bool,
        /// Only those expiring within N days
        #[arg(long)]
        expiring: Option<i64>,
    },
    /// Push a subscription's expiry out by N days
    Extend {
        id: String,
        #[arg(long)]
        days: i64,
    },
    /// Order history
    History {
        /// Also write it to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Decode a wallet address (base64 or base58)
    DecodeAddress { address: String },
    /// Recommended wallet apps
    Wallets,
    /// Interactive terminal UI
    Ui,
}

#[derive(Subcommand, Debug)]
enum CashbackAction {
    Balance,
    History,
    Redeem { amount: f64 },
    /// Add sample cashback entries
    Seed,
    /// Wipe the cashback log
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Command::Catalog { category } => run_catalog(category.as_deref()),
        Command::Search { query } => run_search(&query),
        Command::Buy { name, wallet } => run_buy(&config, &name, &wallet),
        Command::Cashback { action } => run_cashback(&config, action),
        Command::Subscriptions { all, expiring } => run_subscriptions(&config, all, expiring),
        Command::Extend { id, days } => run_extend(&config, &id, days),
        Command::History { csv } => run_history(&config, csv),
        Command::DecodeAddress { address } => run_decode(&address),
        Command::Wallets => run_wallets(),
        Command::Ui => run_ui_mode(&config),
    }
}

fn open_app(config: &Config) -> Result<SleekApp<LocalProgram>> {
    SleekApp::open(config, LocalProgram::from_config(config))
        .with_context(|| format!("Failed to open store at {}", config.database_path.display()))
}

fn run_catalog(category: Option<&str>) -> Result<()> {
    let catalog = sleek::Catalog::with_defaults();

    let categories: Vec<&sleek::Category> = match category {
        Some(name) => match catalog.category(name) {
            Some(c) => vec![c],
            None => bail!("Unknown category: {}", name),
        },
        None => catalog.categories().iter().collect(),
    };

    for category in categories {
        println!("\n📂 {}  ({})", category.name, category.brands.join(", "));
        for sub in &category.subscriptions {
            let mut flags = Vec::new();
            if sub.estimated {
                flags.push("est.".to_string());
            }
            if let Some(region) = &sub.region {
                flags.push(region.clone());
            }
            println!(
                "   {:<32} ${:>9.2}  {:>7.3} SOL / {}  {}",
                sub.name,
                sub.price,
                sub.sol_price,
                sub.period,
                flags.join(" ")
            );
        }
    }

    Ok(())
}

fn run_search(query: &str) -> Result<()> {
    let catalog = sleek::Catalog::with_defaults();
    let results = catalog.search(query);

    if results.is_empty() {
        println!("No plans match '{}'", query);
        return Ok(());
    }

    for sub in results {
        println!("{:<32} {:<18} ${:>9.2}", sub.name, sub.category, sub.price);
    }
    Ok(())
}

fn run_buy(config: &Config, name: &str, wallet_address: &str) -> Result<()> {
    let identity = AppIdentity {
        name: config.app_name.clone(),
        uri: config.app_uri.clone(),
    };
    let mut wallet = WalletService::new(MockWallet::new(wallet_address), &config.cluster, identity);
    let connection = wallet.connect()?;
    println!("👛 Wallet connected: {}", connection.public_key.short());

    let mut app = open_app(config)?;
    let receipt = app.buy(wallet.public_key(), name)?;

    println!("\n✅ Payment successful");
    println!("   Plan:       {}", receipt.subscription.name);
    println!("   Paid:       {:.3} SOL", receipt.subscription.sol_price);
    println!("   Cashback:   {:.2} BONK", receipt.cashback);
    println!("   Expires:    {}", receipt.subscription.expires_at.format("%b %d, %Y"));
    println!("   Signature:  {}", receipt.transaction_hash);

    wallet.disconnect()?;
    Ok(())
}

fn run_cashback(config: &Config, action: CashbackAction) -> Result<()> {
    let mut app = open_app(config)?;

    match action {
        CashbackAction::Balance => {
            let balance = app.cashback_balance();
            let stats = app.cashback_stats();
            println!("💰 Available:  ${:.2} BONK", balance.available_balance);
            println!("   Earned:     ${:.2}", balance.total_earned);
            println!("   Redeemed:   ${:.2}", balance.total_redeemed);
            println!("   Pending:    ${:.2}", balance.pending_balance);
            println!("   Entries:    {}", stats.total_transactions);
            println!("   Average:    ${:.2}", stats.average_cashback);
        }
        CashbackAction::History => {
            let transactions = app.cashback_transactions();
            if transactions.is_empty() {
                println!("No cashback yet");
            }
            for tx in transactions {
                let icon = if tx.is_earned() { "💰" } else { "💸" };
                println!(
                    "{} {}  {:<28} {:>9.2}  {}",
                    icon,
                    tx.timestamp.format("%b %d, %Y %H:%M"),
                    tx.subscription_name,
                    tx.cashback_amount,
                    tx.status.as_str()
                );
            }
        }
        CashbackAction::Redeem { amount } => {
            if app.cashback_balance().available_balance <= 0.0 {
                bail!("You have no BONK cashback available for redemption.");
            }
            let tx = app.redeem(amount, "Manual Redemption")?;
            println!("✅ Successfully redeemed ${:.2} BONK cashback!", tx.cashback_amount);
            println!("   Remaining: ${:.2}", app.cashback_balance().available_balance);
        }
        CashbackAction::Seed => {
            app.seed_demo_data()?;
            println!("✓ Added sample cashback");
        }
        CashbackAction::Clear => {
            app.clear_cashback()?;
            println!("✓ Cashback log cleared");
        }
    }

    Ok(())
}

fn run_subscriptions(config: &Config, all: bool, expiring: Option<i64>) -> Result<()> {
    let app = open_app(config)?;
    let now = Utc::now();

    let records: Vec<&sleek::ActivatedSubscription> = match expiring {
        Some(days) => app.book().expiring_within(now, days),
        None if all => app.book().all().iter().collect(),
        None => app.active_subscriptions(now),
    };

    if records.is_empty() {
        println!("No subscriptions");
    }

    for sub in records {
        let status = sub.status(now);
        let marker = match status {
            SubscriptionStatus::Active if sub.days_remaining(now) <= 7 => "🔴",
            SubscriptionStatus::Active => "🟢",
            SubscriptionStatus::Expired => "⚪",
        };
        println!(
            "{} {:<32} {:<9} {:>5} days  ${:>9.2}  {}",
            marker,
            sub.name,
            status.as_str(),
            sub.days_remaining(now).max(0),
            sub.price,
            sub.id
        );
    }

    let stats = app.subscription_stats(now);
    println!(
        "\nActive: {}   Total value: ${:.2}",
        stats.active_subscriptions, stats.total_value
    );
    Ok(())
}

fn run_extend(config: &Config, id: &str, days: i64) -> Result<()> {
    let mut app = open_app(config)?;
    let current = app
        .book()
        .find(id)
        .map(|s| s.expires_at)
        .with_context(|| format!("Subscription not found: {}", id))?;

    let new_expiry = extended_expiry(current, days)
        .with_context(|| format!("Cannot extend by {} days: date out of range", days))?;
    app.extend(id, new_expiry)?;
    println!("✓ {} now expires {}", id, new_expiry.format("%b %d, %Y"));
    Ok(())
}

/// `expiry` pushed out by `days`, or None past the representable calendar
fn extended_expiry(expiry: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|d| expiry.checked_add_signed(d))
}

fn run_history(config: &Config, csv: Option<PathBuf>) -> Result<()> {
    let app = open_app(config)?;
    let history = app.order_history();

    for item in &history {
        println!(
            "{}  {:<32} ${:>9.2}  {:>7.3} SOL  +{:.2} BONK  {}",
            item.date.format("%b %d, %Y"),
            item.subscription_name,
            item.price,
            item.sol_price,
            item.cashback_earned,
            item.status
        );
    }

    if let Some(path) = csv {
        let written = export_order_history_csv(&path, &history)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\n✓ Wrote {} orders to {}", written, path.display());
    }

    Ok(())
}

fn run_decode(address: &str) -> Result<()> {
    let parsed = WalletAddress::parse(address).context("Invalid wallet address")?;
    println!("{}", parsed);
    Ok(())
}

fn run_wallets() -> Result<()> {
    println!("Recommended wallets: {}", RECOMMENDED_WALLETS.join(", "));
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    let app = open_app(config)?;
    let mut ui_app = ui::App::new(app);
    ui::run_ui(&mut ui_app)?;
    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin sleek-server --features server");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_extended_expiry() {
        let expiry = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(extended_expiry(expiry, 30), Some(expiry + Duration::days(30)));
        assert_eq!(extended_expiry(expiry, -1), Some(expiry - Duration::days(1)));
        assert_eq!(extended_expiry(expiry, i64::MAX), None);
        assert_eq!(extended_expiry(expiry, i64::MIN), None);
        assert_eq!(extended_expiry(expiry, i64::MAX / 1000), None);
        assert_eq!(extended_expiry(expiry, 1_000_000_000), None);
    }

    #[test]
    fn test_cli_parses_extend() {
        let cli = Cli::try_parse_from(["sleek", "extend", "walmart+-1", "--days", "30"]).unwrap();
        assert!(matches!(cli.command, Command::Extend { days: 30, .. }));
    }
}
