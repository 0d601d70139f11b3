use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use sleek::{
    base58_decode, base58_encode, base64_to_base58, ActivatedSubscription, CashbackError,
    CashbackLedger, Period, Subscription,
};

#[derive(Debug, Clone)]
enum Op {
    Earn(f64),
    Redeem(f64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1.0f64..500.0).prop_map(Op::Earn),
        (0.01f64..200.0).prop_map(Op::Redeem),
    ]
}

fn period() -> impl Strategy<Value = Period> {
    prop_oneof![
        Just(Period::Day),
        Just(Period::Week),
        Just(Period::Month),
        Just(Period::Year),
    ]
}

proptest! {
    #[test]
    fn available_is_earned_minus_redeemed(ops in prop::collection::vec(op(), 0..40)) {
        let mut ledger = CashbackLedger::with_rate(0.1);
        let mut earned = 0.0f64;
        let mut redeemed = 0.0f64;

        for op in ops {
            match op {
                Op::Earn(price) => {
                    let tx = ledger.earn_cashback("Plan", price);
                    earned += tx.cashback_amount;
                }
                Op::Redeem(amount) => {
                    let before = ledger.available_balance();
                    match ledger.redeem_cashback(amount, "Manual Redemption") {
                        Ok(_) => {
                            prop_assert!(amount <= before);
                            redeemed += amount;
                        }
                        Err(CashbackError::InsufficientBalance { available, requested }) => {
                            prop_assert!(amount > before);
                            prop_assert_eq!(available, before);
                            prop_assert_eq!(requested, amount);
                        }
                        Err(e) => prop_assert!(false, "unexpected error: {}", e),
                    }
                }
            }

            let balance = ledger.balance();
            prop_assert!(balance.available_balance >= 0.0);
            prop_assert!((balance.available_balance - (earned - redeemed).max(0.0)).abs() < 1e-6);
            prop_assert!((balance.total_earned - earned).abs() < 1e-6);
            prop_assert!((balance.total_redeemed - redeemed).abs() < 1e-6);
        }
    }

    #[test]
    fn failed_redemption_leaves_log_untouched(price in 1.0f64..100.0, extra in 0.01f64..100.0) {
        let mut ledger = CashbackLedger::with_rate(0.1);
        ledger.earn_cashback("Plan", price);
        let available = ledger.available_balance();

        prop_assert!(ledger.redeem_cashback(available + extra, "Manual Redemption").is_err());
        prop_assert_eq!(ledger.len(), 1);
        prop_assert_eq!(ledger.available_balance(), available);
    }

    #[test]
    fn active_iff_now_before_expiry(period in period(), offset_secs in -40_000_000i64..40_000_000) {
        let activated = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let plan = Subscription::new("Plan", 9.99, 0.05, period, "Streaming");
        let record = ActivatedSubscription::activate(&plan, activated, None, None);
        let now = activated + Duration::seconds(offset_secs);

        prop_assert_eq!(record.expires_at, activated + period.duration());
        prop_assert_eq!(record.is_active(now), now < record.expires_at);
        prop_assert_eq!(record.days_remaining(now) > 0, record.is_active(now));
    }

    #[test]
    fn base58_round_trips_bytes(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let encoded = base58_encode(&bytes);
        prop_assert_eq!(base58_decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn base64_and_base58_agree(bytes in prop::collection::vec(any::<u8>(), 1..48)) {
        let base64 = STANDARD.encode(&bytes);
        prop_assert_eq!(base64_to_base58(&base64).unwrap(), base58_encode(&bytes));
    }
}
