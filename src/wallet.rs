// 👛 Wallet connection
//
// The wallet authorization protocol and the RPC transport live outside this
// crate. They are reached through two traits:
//
// - WalletAdapter:  authorize / deauthorize against a wallet app
// - BalanceSource:  lamport balance of an address
//
// WalletService owns the session (auth token + decoded address) and turns
// raw adapter failures into messages a user can act on.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::address::WalletAddress;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Wallet apps we point users at when none is installed
pub const RECOMMENDED_WALLETS: [&str; 6] = [
    "Phantom",
    "Solflare",
    "Backpack",
    "Glow",
    "Exodus",
    "Trust Wallet",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("No Solana mobile wallet found. Please install a wallet like Phantom or Solflare from the app store.")]
    NoWalletFound,
    #[error("Wallet connection was cancelled by the user.")]
    UserRejected,
    #[error("Invalid wallet address format. Please try again.")]
    InvalidAddress,
    #[error("No wallet accounts available. Please make sure your wallet has at least one account.")]
    NoAccounts,
    #[error("Failed to connect wallet. Please make sure you have a Solana wallet app installed (like Phantom, Solflare, Backpack, or Glow).")]
    ConnectionFailed,
    #[error("Failed to disconnect wallet")]
    DisconnectFailed,
    #[error("Failed to get balance")]
    BalanceFailed,
    #[error("Wallet not connected")]
    NotConnected,
}

/// Raw failure reported by an adapter or RPC source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct AdapterError(pub String);

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        AdapterError(message.into())
    }
}

/// App identity shown by the wallet on the authorization prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub name: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedAccount {
    /// Address as handed back by the wallet (base58 or base64)
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub accounts: Vec<AuthorizedAccount>,
    pub auth_token: String,
}

pub trait WalletAdapter {
    fn authorize(&mut self, cluster: &str, identity: &AppIdentity) -> Result<Authorization, AdapterError>;

    fn deauthorize(&mut self, auth_token: &str) -> Result<(), AdapterError>;

    /// Whether a wallet app can be reached at all
    fn is_available(&self) -> bool;
}

pub trait BalanceSource {
    /// Balance in lamports
    fn get_balance(&self, address: &WalletAddress) -> Result<u64, AdapterError>;
}

/// An established session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConnection {
    pub public_key: WalletAddress,
    pub connected: bool,
    pub auth_token: String,
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct WalletService<A: WalletAdapter> {
    adapter: A,
    cluster: String,
    identity: AppIdentity,
    connection: Option<WalletConnection>,
}

impl<A: WalletAdapter> WalletService<A> {
    pub fn new(adapter: A, cluster: &str, identity: AppIdentity) -> Self {
        WalletService {
            adapter,
            cluster: cluster.to_string(),
            identity,
            connection: None,
        }
    }

    pub fn connect(&mut self) -> Result<WalletConnection, WalletError> {
        match self.try_connect() {
            Ok(connection) => {
                log::info!("Wallet connected: {}", connection.public_key);
                self.connection = Some(connection.clone());
                Ok(connection)
            }
            Err(message) => {
                log::error!("Error connecting wallet: {}", message);
                Err(classify_connect_error(&message))
            }
        }
    }

    fn try_connect(&mut self) -> Result<WalletConnection, String> {
        let authorization = self
            .adapter
            .authorize(&self.cluster, &self.identity)
            .map_err(|e| e.0)?;

        let account = authorization
            .accounts
            .first()
            .ok_or_else(|| "No accounts found in authorization result".to_string())?;

        let public_key = WalletAddress::parse(&account.address).map_err(|e| {
            log::error!("Raw account address: {}", account.address);
            format!("Invalid wallet address: {}", e)
        })?;

        Ok(WalletConnection {
            public_key,
            connected: true,
            auth_token: authorization.auth_token,
        })
    }

    /// Deauthorize the current session. No-op when not connected.
    pub fn disconnect(&mut self) -> Result<(), WalletError> {
        let Some(connection) = self.connection.as_ref() else {
            return Ok(());
        };

        self.adapter
            .deauthorize(&connection.auth_token)
            .map_err(|e| {
                log::error!("Error disconnecting wallet: {}", e);
                WalletError::DisconnectFailed
            })?;

        log::info!("Wallet disconnected: {}", connection.public_key);
        self.connection = None;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection(&self) -> Option<&WalletConnection> {
        self.connection.as_ref()
    }

    pub fn public_key(&self) -> Option<&WalletAddress> {
        self.connection.as_ref().map(|c| &c.public_key)
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.auth_token.as_str())
    }

    pub fn test_availability(&self) -> bool {
        let available = self.adapter.is_available();
        if !available {
            log::warn!("Mobile wallet adapter not available");
        }
        available
    }

    pub fn available_wallets(&self) -> Vec<String> {
        RECOMMENDED_WALLETS.iter().map(|w| w.to_string()).collect()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }
}

/// Balance in SOL
pub fn get_balance<B: BalanceSource>(source: &B, address: &WalletAddress) -> Result<f64, WalletError> {
    let lamports = source.get_balance(address).map_err(|e| {
        log::error!("Error getting balance: {}", e);
        WalletError::BalanceFailed
    })?;
    Ok(lamports as f64 / LAMPORTS_PER_SOL as f64)
}

/// Map a raw connect failure onto a user-facing error
pub fn classify_connect_error(message: &str) -> WalletError {
    if message.contains("No mobile wallet") {
        WalletError::NoWalletFound
    } else if message.contains("User rejected") {
        WalletError::UserRejected
    } else if message.contains("Non-base58") || message.contains("Invalid wallet address") {
        WalletError::InvalidAddress
    } else if message.contains("No accounts found") {
        WalletError::NoAccounts
    } else if message.contains("transact") {
        WalletError::NoWalletFound
    } else {
        WalletError::ConnectionFailed
    }
}

// ============================================================================
// MOCK WALLET
// ============================================================================

/// In-process wallet for demos and tests
#[derive(Debug, Clone)]
pub struct MockWallet {
    accounts: Vec<AuthorizedAccount>,
    /// Lamport balances by base58 address
    balances: HashMap<String, u64>,
    fail_with: Option<String>,
    available: bool,
    active_tokens: Vec<String>,
    issued: u64,
}

impl MockWallet {
    pub fn new(address: &str) -> Self {
        MockWallet {
            accounts: vec![AuthorizedAccount {
                address: address.to_string(),
            }],
            balances: HashMap::new(),
            fail_with: None,
            available: true,
            active_tokens: Vec::new(),
            issued: 0,
        }
    }

    /// Wallet with no accounts
    pub fn empty() -> Self {
        MockWallet {
            accounts: Vec::new(),
            ..MockWallet::new("")
        }
    }

    /// Wallet that cannot be reached
    pub fn unavailable() -> Self {
        MockWallet {
            available: false,
            fail_with: Some("No mobile wallet found".to_string()),
            ..MockWallet::new("")
        }
    }

    /// Every authorize call fails with `message`
    pub fn failing(message: &str) -> Self {
        MockWallet {
            fail_with: Some(message.to_string()),
            ..MockWallet::new("")
        }
    }

    pub fn with_balance(mut self, address: &str, lamports: u64) -> Self {
        self.balances.insert(address.to_string(), lamports);
        self
    }

    pub fn active_sessions(&self) -> usize {
        self.active_tokens.len()
    }
}

impl WalletAdapter for MockWallet {
    fn authorize(&mut self, cluster: &str, identity: &AppIdentity) -> Result<Authorization, AdapterError> {
        if let Some(message) = &self.fail_with {
            return Err(AdapterError::new(message.clone()));
        }
        log::debug!("Authorizing {} on {}", identity.name, cluster);

        self.issued += 1;
        let auth_token = format!("mock-token-{}", self.issued);
        self.active_tokens.push(auth_token.clone());

        Ok(Authorization {
            accounts: self.accounts.clone(),
            auth_token,
        })
    }

    fn deauthorize(&mut self, auth_token: &str) -> Result<(), AdapterError> {
        let before = self.active_tokens.len();
        self.active_tokens.retain(|t| t != auth_token);
        if self.active_tokens.len() == before {
            return Err(AdapterError::new(format!("unknown auth token {}", auth_token)));
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

impl BalanceSource for MockWallet {
    fn get_balance(&self, address: &WalletAddress) -> Result<u64, AdapterError> {
        self.balances
            .get(address.as_str())
            .copied()
            .ok_or_else(|| AdapterError::new(format!("account {} not found", address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

    fn identity() -> AppIdentity {
        AppIdentity {
            name: "Sleek App".to_string(),
            uri: "https://sleek.app".to_string(),
        }
    }

    fn service(wallet: MockWallet) -> WalletService<MockWallet> {
        WalletService::new(wallet, "devnet", identity())
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut wallet = service(MockWallet::new(ADDRESS));
        assert!(!wallet.is_connected());

        let connection = wallet.connect().unwrap();
        assert_eq!(connection.public_key.as_str(), ADDRESS);
        assert!(connection.connected);
        assert!(wallet.is_connected());
        assert_eq!(wallet.adapter().active_sessions(), 1);

        wallet.disconnect().unwrap();
        assert!(!wallet.is_connected());
        assert!(wallet.auth_token().is_none());
        assert_eq!(wallet.adapter().active_sessions(), 0);
    }

    #[test]
    fn test_disconnect_when_not_connected_is_noop() {
        let mut wallet = service(MockWallet::new(ADDRESS));
        assert!(wallet.disconnect().is_ok());
    }

    #[test]
    fn test_connect_decodes_base64_address() {
        use base64::Engine;
        let bytes = WalletAddress::parse(ADDRESS).unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes.as_bytes());

        let mut wallet = service(MockWallet::new(&encoded));
        let connection = wallet.connect().unwrap();
        assert_eq!(connection.public_key.as_str(), ADDRESS);
    }

    #[test]
    fn test_connect_without_accounts() {
        let mut wallet = service(MockWallet::empty());
        assert_eq!(wallet.connect().unwrap_err(), WalletError::NoAccounts);
        assert!(!wallet.is_connected());
    }

    #[test]
    fn test_connect_with_bad_address() {
        let mut wallet = service(MockWallet::new("not-a-real-address"));
        assert_eq!(wallet.connect().unwrap_err(), WalletError::InvalidAddress);
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(classify_connect_error("No mobile wallet found"), WalletError::NoWalletFound);
        assert_eq!(classify_connect_error("User rejected the request"), WalletError::UserRejected);
        assert_eq!(classify_connect_error("Non-base58 character"), WalletError::InvalidAddress);
        assert_eq!(classify_connect_error("No accounts found in result"), WalletError::NoAccounts);
        assert_eq!(classify_connect_error("transact failed"), WalletError::NoWalletFound);
        assert_eq!(classify_connect_error("socket closed"), WalletError::ConnectionFailed);
    }

    #[test]
    fn test_adapter_failures_are_mapped() {
        let mut wallet = service(MockWallet::failing("User rejected"));
        assert_eq!(wallet.connect().unwrap_err(), WalletError::UserRejected);

        let mut wallet = service(MockWallet::unavailable());
        assert!(!wallet.test_availability());
        assert_eq!(wallet.connect().unwrap_err(), WalletError::NoWalletFound);
    }

    #[test]
    fn test_balance_in_sol() {
        let mock = MockWallet::new(ADDRESS).with_balance(ADDRESS, 2_500_000_000);
        let address = WalletAddress::parse(ADDRESS).unwrap();
        assert_eq!(get_balance(&mock, &address).unwrap(), 2.5);

        let other = WalletAddress::from_bytes([1u8; 32]);
        assert_eq!(get_balance(&mock, &other).unwrap_err(), WalletError::BalanceFailed);
    }

    #[test]
    fn test_available_wallets() {
        let wallet = service(MockWallet::new(ADDRESS));
        let wallets = wallet.available_wallets();
        assert_eq!(wallets.len(), 6);
        assert_eq!(wallets[0], "Phantom");
    }
}
