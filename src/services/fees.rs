use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::job::PaymentProvider;

/// Processor fee rate for a payment provider name. Unknown names fall back
/// to the default rate.
pub fn processor_fee_rate(provider: &str) -> Decimal {
    match provider.to_ascii_lowercase().as_str() {
        "konnect" => Decimal::new(2, 2),
        "paymee" => Decimal::new(25, 3),
        "paymaster" => Decimal::new(2, 2),
        "zitouna" => Decimal::new(15, 3),
        "gpg" => Decimal::new(2, 2),
        "stripe" => Decimal::new(29, 3),
        _ => default_rate(),
    }
}

pub fn default_rate() -> Decimal {
    Decimal::new(2, 2)
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeBreakdown {
    pub budget: Decimal,
    pub processor_fee: Decimal,
    pub platform_fee: Decimal,
    pub total: Decimal,
}

impl FeeBreakdown {
    /// The platform takes no commission; the client pays the processor fee
    /// on top of the budget.
    pub fn compute(budget: Decimal, provider: PaymentProvider) -> Self {
        let processor_fee = money(budget * processor_fee_rate(provider.as_str()));
        Self {
            budget,
            processor_fee,
            platform_fee: Decimal::ZERO,
            total: money(budget + processor_fee),
        }
    }
}
