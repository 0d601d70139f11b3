// 💳 Subscription payment
//
// Paying for a plan is three program instructions, in order:
//
//   1. process_subscription_payment  (SOL: user → treasury)
//   2. mint_cashback                 (BONK: price × rate, 6 decimals)
//   3. mint_subscription_nft         (1 token + metadata, amount in cents)
//
// Only when all three succeed is the purchase recorded locally and the
// cashback credited to the ledger. Any failure leaves local state untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::address::{base58_encode, WalletAddress};
use crate::cashback::CashbackLedger;
use crate::catalog::Subscription;
use crate::config::Config;
use crate::subscriptions::{ActivatedSubscription, SubscriptionBook};
use crate::wallet::LAMPORTS_PER_SOL;

/// BONK has 5 decimals on mainnet; the program mints with 6
pub const BONK_BASE_UNITS: u64 = 1_000_000;

pub const DEFAULT_PROGRAM_ID: &str = "sleek123456789012345678901234567890123456789";
pub const DEFAULT_TREASURY: &str = "treasury123456789012345678901234567890123456789";
pub const BONK_MINT: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("Wallet not connected")]
    WalletNotConnected,
    #[error("invalid price {0} for {1}")]
    InvalidPrice(String, String),
    #[error("payment failed: {0}")]
    Payment(String),
    #[error("cashback minting failed: {0}")]
    CashbackMint(String),
    #[error("subscription NFT minting failed: {0}")]
    NftMint(String),
}

/// Raw failure from the program client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProgramError(pub String);

/// Arguments of the mint_subscription_nft instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionNftData {
    pub subscription_id: u64,
    pub name: String,
    /// Price in cents
    pub amount: u64,
    pub duration_days: u64,
    pub category: String,
}

/// Client side of the on-chain subscription program
pub trait SubscriptionProgram {
    /// Transfer `lamports` to the treasury. Returns the transaction signature.
    fn process_subscription_payment(
        &mut self,
        user: &WalletAddress,
        subscription_id: u64,
        lamports: u64,
    ) -> Result<String, ProgramError>;

    fn mint_cashback(&mut self, user: &WalletAddress, amount: u64) -> Result<String, ProgramError>;

    fn mint_subscription_nft(
        &mut self,
        user: &WalletAddress,
        data: &SubscriptionNftData,
    ) -> Result<String, ProgramError>;
}

// ============================================================================
// UNIT CONVERSION
// ============================================================================

fn to_units(value: f64, scale: f64) -> Option<u64> {
    let units = (value * scale).round();
    if units.is_finite() && units >= 0.0 && units <= u64::MAX as f64 {
        Some(units as u64)
    } else {
        None
    }
}

pub fn sol_to_lamports(sol: f64) -> Option<u64> {
    to_units(sol, LAMPORTS_PER_SOL as f64)
}

/// Cashback in BONK base units for a purchase at `price`
pub fn cashback_base_units(price: f64, rate: f64) -> Option<u64> {
    to_units(price * rate, BONK_BASE_UNITS as f64)
}

pub fn usd_to_cents(usd: f64) -> Option<u64> {
    to_units(usd, 100.0)
}

// ============================================================================
// PAYMENT SERVICE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub subscription: ActivatedSubscription,
    pub transaction_hash: String,
    pub cashback: f64,
}

pub struct PaymentService<P: SubscriptionProgram> {
    program: P,
    cashback_rate: f64,
}

impl<P: SubscriptionProgram> PaymentService<P> {
    pub fn new(program: P, cashback_rate: f64) -> Self {
        PaymentService {
            program,
            cashback_rate,
        }
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut P {
        &mut self.program
    }

    pub fn process_payment(
        &mut self,
        payer: Option<&WalletAddress>,
        subscription: &Subscription,
        ledger: &mut CashbackLedger,
        book: &mut SubscriptionBook,
    ) -> Result<PaymentReceipt, PaymentError> {
        self.process_payment_at(payer, subscription, ledger, book, Utc::now())
    }

    pub fn process_payment_at(
        &mut self,
        payer: Option<&WalletAddress>,
        subscription: &Subscription,
        ledger: &mut CashbackLedger,
        book: &mut SubscriptionBook,
        now: DateTime<Utc>,
    ) -> Result<PaymentReceipt, PaymentError> {
        let user = payer.ok_or(PaymentError::WalletNotConnected)?;

        let invalid_price = || {
            PaymentError::InvalidPrice(
                format!("{} / {} SOL", subscription.price, subscription.sol_price),
                subscription.name.clone(),
            )
        };
        let lamports = sol_to_lamports(subscription.sol_price).ok_or_else(invalid_price)?;
        let cashback_units =
            cashback_base_units(subscription.price, self.cashback_rate).ok_or_else(invalid_price)?;
        let cents = usd_to_cents(subscription.price).ok_or_else(invalid_price)?;

        // Timestamp doubles as the subscription id
        let subscription_id = now.timestamp_millis().max(0) as u64;

        let signature = self
            .program
            .process_subscription_payment(user, subscription_id, lamports)
            .map_err(|e| {
                log::error!("Payment processing error: {}", e);
                PaymentError::Payment(e.0)
            })?;

        self.program.mint_cashback(user, cashback_units).map_err(|e| {
            log::error!("Cashback minting error: {}", e);
            PaymentError::CashbackMint(e.0)
        })?;

        let nft = SubscriptionNftData {
            subscription_id,
            name: subscription.name.clone(),
            amount: cents,
            duration_days: subscription.period.nft_duration_days(),
            category: subscription.category.clone(),
        };
        self.program.mint_subscription_nft(user, &nft).map_err(|e| {
            log::error!("NFT minting error: {}", e);
            PaymentError::NftMint(e.0)
        })?;

        let cashback = ledger.earn_cashback_at(&subscription.name, subscription.price, now);
        let activated = ActivatedSubscription::activate(
            subscription,
            now,
            Some(cashback.cashback_amount),
            Some(signature.clone()),
        );
        book.record(activated.clone());

        Ok(PaymentReceipt {
            subscription: activated,
            transaction_hash: signature,
            cashback: cashback.cashback_amount,
        })
    }
}

// ============================================================================
// LOCAL PROGRAM
// ============================================================================

/// Which instruction a LocalProgram call was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    ProcessSubscriptionPayment,
    MintCashback,
    MintSubscriptionNft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramCall {
    pub instruction: Instruction,
    pub user: String,
    pub payload: serde_json::Value,
    pub signature: String,
}

/// In-process program: records instructions and signs them with a
/// deterministic hash. Used offline, in demos and in tests.
#[derive(Debug, Clone)]
pub struct LocalProgram {
    program_id: String,
    treasury: String,
    bonk_mint: String,
    calls: Vec<ProgramCall>,
    fail_on: Option<Instruction>,
}

impl Default for LocalProgram {
    fn default() -> Self {
        LocalProgram::with_accounts(DEFAULT_PROGRAM_ID, DEFAULT_TREASURY, BONK_MINT)
    }
}

impl LocalProgram {
    pub fn new() -> Self {
        LocalProgram::default()
    }

    pub fn with_accounts(program_id: &str, treasury: &str, bonk_mint: &str) -> Self {
        LocalProgram {
            program_id: program_id.to_string(),
            treasury: treasury.to_string(),
            bonk_mint: bonk_mint.to_string(),
            calls: Vec::new(),
            fail_on: None,
        }
    }

    /// Program bound to the configured program id, treasury and BONK mint
    pub fn from_config(config: &Config) -> Self {
        LocalProgram::with_accounts(&config.program_id, &config.treasury, &config.bonk_mint)
    }

    /// Program that rejects every `instruction`
    pub fn failing_on(instruction: Instruction) -> Self {
        LocalProgram {
            fail_on: Some(instruction),
            ..LocalProgram::default()
        }
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    pub fn calls(&self) -> &[ProgramCall] {
        &self.calls
    }

    /// Lamports transferred to the treasury so far
    pub fn treasury_lamports(&self) -> u64 {
        self.calls
            .iter()
            .filter(|c| c.instruction == Instruction::ProcessSubscriptionPayment)
            .filter_map(|c| c.payload["lamports"].as_u64())
            .sum()
    }

    fn execute(
        &mut self,
        instruction: Instruction,
        user: &WalletAddress,
        payload: serde_json::Value,
    ) -> Result<String, ProgramError> {
        if self.fail_on == Some(instruction) {
            return Err(ProgramError(format!("{:?} rejected by program", instruction)));
        }

        let mut hasher = Sha512::new();
        hasher.update(&self.program_id);
        hasher.update(format!("{:?}", instruction));
        hasher.update(user.as_bytes());
        hasher.update(payload.to_string());
        hasher.update(self.calls.len().to_le_bytes());
        let signature = base58_encode(&hasher.finalize());

        log::debug!("{:?} for {} -> {}", instruction, user.short(), signature);
        self.calls.push(ProgramCall {
            instruction,
            user: user.to_string(),
            payload,
            signature: signature.clone(),
        });
        Ok(signature)
    }
}

impl SubscriptionProgram for LocalProgram {
    fn process_subscription_payment(
        &mut self,
        user: &WalletAddress,
        subscription_id: u64,
        lamports: u64,
    ) -> Result<String, ProgramError> {
        self.execute(
            Instruction::ProcessSubscriptionPayment,
            user,
            serde_json::json!({
                "subscription_id": subscription_id,
                "lamports": lamports,
                "treasury": self.treasury,
            }),
        )
    }

    fn mint_cashback(&mut self, user: &WalletAddress, amount: u64) -> Result<String, ProgramError> {
        self.execute(
            Instruction::MintCashback,
            user,
            serde_json::json!({ "amount": amount, "mint": self.bonk_mint }),
        )
    }

    fn mint_subscription_nft(
        &mut self,
        user: &WalletAddress,
        data: &SubscriptionNftData,
    ) -> Result<String, ProgramError> {
        let payload = serde_json::to_value(data).map_err(|e| ProgramError(e.to_string()))?;
        self.execute(Instruction::MintSubscriptionNft, user, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Period;
    use chrono::{Duration, TimeZone};

    fn user() -> WalletAddress {
        WalletAddress::from_bytes([9u8; 32])
    }

    fn notion() -> Subscription {
        Subscription::new("Notion Plus", 96.0, 0.54, Period::Year, "Productivity")
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(sol_to_lamports(0.54), Some(540_000_000));
        assert_eq!(sol_to_lamports(3.39), Some(3_390_000_000));
        assert_eq!(cashback_base_units(96.0, 0.1), Some(9_600_000));
        assert_eq!(usd_to_cents(69.99), Some(6999));
        assert_eq!(sol_to_lamports(-1.0), None);
        assert_eq!(usd_to_cents(f64::NAN), None);
    }

    #[test]
    fn test_payment_requires_wallet() {
        let mut service = PaymentService::new(LocalProgram::new(), 0.1);
        let mut ledger = CashbackLedger::new();
        let mut book = SubscriptionBook::new();

        let err = service
            .process_payment(None, &notion(), &mut ledger, &mut book)
            .unwrap_err();
        assert_eq!(err, PaymentError::WalletNotConnected);
        assert!(service.program().calls().is_empty());
    }

    #[test]
    fn test_successful_payment_records_everything() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let mut service = PaymentService::new(LocalProgram::new(), 0.1);
        let mut ledger = CashbackLedger::new();
        let mut book = SubscriptionBook::new();

        let receipt = service
            .process_payment_at(Some(&user()), &notion(), &mut ledger, &mut book, now)
            .unwrap();

        let calls = service.program().calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].instruction, Instruction::ProcessSubscriptionPayment);
        assert_eq!(calls[1].instruction, Instruction::MintCashback);
        assert_eq!(calls[2].instruction, Instruction::MintSubscriptionNft);
        assert_eq!(calls[2].payload["amount"], 9600);
        assert_eq!(calls[2].payload["duration_days"], 365);
        assert_eq!(service.program().treasury_lamports(), 540_000_000);

        assert_eq!(receipt.transaction_hash, calls[0].signature);
        assert_eq!(receipt.subscription.nft_mint.as_deref(), Some(calls[0].signature.as_str()));
        assert_eq!(receipt.subscription.expires_at, now + Duration::days(365));
        assert!((receipt.cashback - 9.6).abs() < 1e-9);

        assert_eq!(book.len(), 1);
        assert!((ledger.available_balance() - 9.6).abs() < 1e-9);
    }

    #[test]
    fn test_failed_instruction_leaves_state_untouched() {
        for instruction in [
            Instruction::ProcessSubscriptionPayment,
            Instruction::MintCashback,
            Instruction::MintSubscriptionNft,
        ] {
            let mut service = PaymentService::new(LocalProgram::failing_on(instruction), 0.1);
            let mut ledger = CashbackLedger::new();
            let mut book = SubscriptionBook::new();

            let result = service.process_payment(Some(&user()), &notion(), &mut ledger, &mut book);
            assert!(result.is_err(), "{:?} should fail", instruction);
            assert!(ledger.is_empty());
            assert!(book.is_empty());
        }
    }

    #[test]
    fn test_failure_maps_to_step() {
        let mut service =
            PaymentService::new(LocalProgram::failing_on(Instruction::MintCashback), 0.1);
        let mut ledger = CashbackLedger::new();
        let mut book = SubscriptionBook::new();

        let err = service
            .process_payment(Some(&user()), &notion(), &mut ledger, &mut book)
            .unwrap_err();
        assert!(matches!(err, PaymentError::CashbackMint(_)));
    }

    #[test]
    fn test_invalid_price_rejected_before_any_call() {
        let mut plan = notion();
        plan.sol_price = -0.5;
        let mut service = PaymentService::new(LocalProgram::new(), 0.1);
        let mut ledger = CashbackLedger::new();
        let mut book = SubscriptionBook::new();

        let err = service
            .process_payment(Some(&user()), &plan, &mut ledger, &mut book)
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidPrice(..)));
        assert!(service.program().calls().is_empty());
    }

    #[test]
    fn test_configured_accounts_reach_instructions() {
        let config = Config {
            program_id: "prog".to_string(),
            treasury: "vault".to_string(),
            bonk_mint: "mint".to_string(),
            ..Config::default()
        };
        let mut program = LocalProgram::from_config(&config);
        program.process_subscription_payment(&user(), 1, 10).unwrap();
        program.mint_cashback(&user(), 5).unwrap();

        assert_eq!(program.program_id(), "prog");
        assert_eq!(program.calls()[0].payload["treasury"], "vault");
        assert_eq!(program.calls()[1].payload["mint"], "mint");

        let mut other = LocalProgram::new();
        other.process_subscription_payment(&user(), 1, 10).unwrap();
        assert_ne!(other.calls()[0].signature, program.calls()[0].signature);
    }

    #[test]
    fn test_signatures_are_distinct_base58() {
        let mut program = LocalProgram::new();
        let a = program.mint_cashback(&user(), 1).unwrap();
        let b = program.mint_cashback(&user(), 1).unwrap();
        assert_ne!(a, b);
        assert!(crate::address::base58_decode(&a).unwrap().len() == 64);
    }
}
