// 🛍️ Subscription Catalog
//
// The storefront: ten categories, five plans each, priced in USD with a
// pre-computed SOL price. Plans are looked up by name from the CLI, the TUI
// and the HTTP API, so the registry keeps matching forgiving (case-insensitive,
// substring search).

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PERIOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    /// Parse a billing period. Unknown strings fall back to a year.
    pub fn parse(period: &str) -> Self {
        match period.trim().to_lowercase().as_str() {
            "day" => Period::Day,
            "week" => Period::Week,
            "month" => Period::Month,
            "year" => Period::Year,
            other => {
                log::warn!("Unknown period '{}', defaulting to year", other);
                Period::Year
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    /// How long one billing period keeps a subscription active
    pub fn duration(&self) -> Duration {
        Duration::days(self.duration_days() as i64)
    }

    /// Period length in days
    pub fn duration_days(&self) -> u64 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
            Period::Year => 365,
        }
    }

    /// Duration the subscription NFT records. The program only knows weekly,
    /// monthly and yearly passes; anything else is minted as a month.
    pub fn nft_duration_days(&self) -> u64 {
        match self {
            Period::Week => 7,
            Period::Year => 365,
            Period::Month | Period::Day => 30,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SUBSCRIPTION
// ============================================================================

/// A purchasable plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub name: String,
    /// Price in USD
    pub price: f64,
    /// Price in SOL
    pub sol_price: f64,
    pub period: Period,
    /// Price is an estimate (no public list price)
    #[serde(default)]
    pub estimated: bool,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub category: String,
}

impl Subscription {
    pub fn new(name: &str, price: f64, sol_price: f64, period: Period, category: &str) -> Self {
        Subscription {
            id: slugify(name),
            name: name.to_string(),
            price,
            sol_price,
            period,
            estimated: false,
            region: None,
            category: category.to_string(),
        }
    }

    pub fn estimated(mut self) -> Self {
        self.estimated = true;
        self
    }

    pub fn in_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }
}

/// "Spotify Premium  (US)" → "spotify-premium-(us)"
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Accent color (hex)
    pub color: String,
    /// Featured brands shown on the category card
    pub brands: Vec<String>,
    pub subscriptions: Vec<Subscription>,
}

impl Category {
    fn new(name: &str, color: &str, brands: &[&str]) -> Self {
        Category {
            name: name.to_string(),
            color: color.to_string(),
            brands: brands.iter().map(|b| b.to_string()).collect(),
            subscriptions: Vec::new(),
        }
    }

    fn plan(mut self, name: &str, price: f64, sol_price: f64) -> Self {
        let subscription = Subscription::new(name, price, sol_price, Period::Year, &self.name);
        self.subscriptions.push(subscription);
        self
    }

    fn plan_with<F>(mut self, name: &str, price: f64, sol_price: f64, f: F) -> Self
    where
        F: FnOnce(Subscription) -> Subscription,
    {
        let subscription = Subscription::new(name, price, sol_price, Period::Year, &self.name);
        self.subscriptions.push(f(subscription));
        self
    }
}

// ============================================================================
// CATALOG
// ============================================================================

pub struct Catalog {
    categories: Vec<Category>,
}

impl Catalog {
    pub fn new(categories: Vec<Category>) -> Self {
        Catalog { categories }
    }

    /// Catalog with the built-in storefront
    pub fn with_defaults() -> Self {
        Catalog::new(default_categories())
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Category by name (case-insensitive)
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }

    /// All plans across categories, in catalog order
    pub fn all(&self) -> Vec<&Subscription> {
        self.categories
            .iter()
            .flat_map(|c| c.subscriptions.iter())
            .collect()
    }

    /// Plan by exact name or id (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&Subscription> {
        let needle = name.trim();
        self.all()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(needle) || s.id == slugify(needle))
    }

    /// Plans whose name contains `query` (case-insensitive)
    pub fn search(&self, query: &str) -> Vec<&Subscription> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.all()
            .into_iter()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.categories.iter().map(|c| c.subscriptions.len()).sum()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_categories() -> Vec<Category> {
    vec![
        Category::new("Crypto Analytics", "#f59e0b", &["TradingView", "CoinGecko"])
            .plan("TradingView Premium (Annual)", 599.40, 3.39)
            .plan("TradingView Plus", 299.40, 1.69)
            .plan("CoinGecko Premium", 99.90, 0.57)
            .plan_with("Token Terminal", 120.0, 0.68, Subscription::estimated)
            .plan_with("CryptoRank Pro", 110.0, 0.63, Subscription::estimated),
        Category::new("Productivity", "#6366f1", &["Notion", "Microsoft", "Grammarly"])
            .plan("Superhuman Email", 360.0, 2.04)
            .plan("Notion Plus", 96.0, 0.54)
            .plan("Microsoft 365 Personal", 69.99, 0.40)
            .plan("Grammarly Premium", 144.0, 0.81)
            .plan("Todoist Pro", 36.0, 0.20),
        Category::new("OTT", "#4a5568", &["Netflix", "Disney+", "Prime"])
            .plan_with("Netflix (Standard)", 72.0, 0.41, |s| s.in_region("India"))
            .plan_with("Disney+ Hotstar Premium", 18.0, 0.10, |s| s.in_region("India"))
            .plan_with("Amazon Prime Video", 18.0, 0.10, |s| s.in_region("India"))
            .plan_with("Zee5 Premium 4K", 15.0, 0.085, |s| s.in_region("India"))
            .plan_with("Sony LIV Premium", 12.0, 0.068, |s| s.in_region("India")),
        Category::new("Music", "#4299e1", &["Spotify", "Youtube Music"])
            .plan("Apple Music Individual", 109.0, 0.62)
            .plan("Spotify Premium (US)", 119.88, 0.68)
            .plan("Pandora Premium", 54.89, 0.31)
            .plan("YouTube Music Premium", 119.88, 0.68)
            .plan("Tidal HiFi", 199.99, 1.13),
        Category::new("Socials", "#e53e3e", &["LinkedIn"])
            .plan("LinkedIn Premium Career", 239.88, 1.36)
            .plan("Twitter Blue", 84.0, 0.48)
            .plan("Discord Nitro", 99.99, 0.57)
            .plan("Reddit Premium", 49.99, 0.28)
            .plan_with("Pixelfed/Mastodon Pro", 60.0, 0.34, Subscription::estimated),
        Category::new("Food & Drinks", "#dd6b20", &["HelloFresh", "Everyplate"])
            .plan("HelloFresh", 2880.0, 16.28)
            .plan("EveryPlate", 1800.0, 10.18)
            .plan("Blue Apron", 3120.0, 17.64)
            .plan_with("Green Chef", 1750.0, 9.9, Subscription::estimated)
            .plan_with("Factor", 2500.0, 14.1, Subscription::estimated),
        Category::new("Health", "#38a169", &["BetterHelp", "Whoop", "Function"])
            .plan("BetterHelp Online Therapy", 2880.0, 16.28)
            .plan("Love.Life Optimize", 9000.0, 50.9)
            .plan("Extension Health Diagnostic", 999.0, 5.65)
            .plan("Function Health Annual", 499.0, 2.82)
            .plan("Whoop Life", 359.0, 2.03),
        Category::new("Lifestyle", "#d69e2e", &["Peloton"])
            .plan("Peloton App+Membership", 179.0, 1.0)
            .plan("Apple One Premier Bundle", 455.40, 2.57)
            .plan("Calm Premium", 69.99, 0.40)
            .plan("MasterClass Annual", 180.0, 1.02)
            .plan("FabFitFun Annual Bundle", 200.0, 1.13),
        Category::new("News", "#8b5cf6", &["Bloomberg"])
            .plan("The New York Times Digital", 99.0, 0.56)
            .plan("The Washington Post Digital", 95.0, 0.54)
            .plan("Financial Times", 355.0, 2.0)
            .plan("The Economist", 199.0, 1.13)
            .plan("Bloomberg Digital", 179.0, 1.01),
        Category::new("Shopping", "#ec4899", &["Amazon", "Walmart"])
            .plan("Amazon Prime", 139.0, 0.79)
            .plan_with("Flipkart Plus", 6.0, 0.034, |s| s.in_region("India"))
            .plan_with("Target Circle RedCard", 30.0, 0.17, Subscription::estimated)
            .plan("Walmart+", 98.0, 0.55)
            .plan("Costco Membership", 60.0, 0.34),
    ]
}
