use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::DateOnly;
use crate::decimal::{Money, Rate};
use crate::errors::{LedgerError, Result};
use crate::ledger::row::{Chargeable, PaymentEntry, SurchargeLockState};
use crate::types::{ContractId, PaymentInstrument};

/// one-time charge due at property handover
///
/// `amount` mirrors the contract's possession amount and is refreshed
/// whenever the contract terms change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PossessionCharge {
    pub amount: Money,
    pub due_date: Option<DateOnly>,
    pub amount_paid: Money,
    pub payment_date: Option<DateOnly>,
    pub instrument: PaymentInstrument,
    pub payment_proof: Option<String>,
    pub surcharge: SurchargeLockState,
}

impl Chargeable for PossessionCharge {
    fn face_value(&self) -> Money {
        self.amount
    }

    fn due_date(&self) -> Option<DateOnly> {
        self.due_date
    }

    fn payments(&self) -> Vec<PaymentEntry> {
        vec![PaymentEntry {
            amount: self.amount_paid,
            date: self.payment_date,
        }]
    }

    fn lock_state(&self) -> &SurchargeLockState {
        &self.surcharge
    }

    fn lock_state_mut(&mut self) -> &mut SurchargeLockState {
        &mut self.surcharge
    }

    fn label(&self) -> String {
        "possession".to_string()
    }
}

/// contract header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub total_amount: Money,
    pub down_payment: Money,
    /// percent of the total due at possession (e.g. 10 for 10%)
    pub possession_percentage: Decimal,
    pub months: u32,
    pub start_date: Option<DateOnly>,
    pub booking_date: Option<DateOnly>,
    pub possession: PossessionCharge,
}

impl Contract {
    pub fn new(
        total_amount: Money,
        down_payment: Money,
        possession_percentage: Decimal,
        months: u32,
        start_date: Option<DateOnly>,
    ) -> Result<Self> {
        let mut contract = Self {
            id: Uuid::new_v4(),
            total_amount,
            down_payment,
            possession_percentage,
            months,
            start_date,
            booking_date: None,
            possession: PossessionCharge::default(),
        };
        contract.validate()?;
        contract.refresh_possession();
        Ok(contract)
    }

    pub fn validate(&self) -> Result<()> {
        if self.months == 0 {
            return Err(LedgerError::NonPositiveMonths { months: 0 });
        }
        for (field, amount) in [("total amount", self.total_amount), ("down payment", self.down_payment)] {
            if amount.is_negative() {
                return Err(LedgerError::NegativeAmount {
                    field: field.to_string(),
                    amount,
                });
            }
        }
        Ok(())
    }

    /// round(total * possession% / 100)
    pub fn possession_amount(&self) -> Money {
        self.total_amount
            .percent_of(Rate::from_percentage_decimal(self.possession_percentage))
    }

    /// what is left for monthly installments, never negative
    pub fn monthly_pool_amount(&self) -> Money {
        self.total_amount
            .saturating_sub(self.down_payment + self.possession_amount())
    }

    pub fn refresh_possession(&mut self) {
        self.possession.amount = self.possession_amount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_possession_and_pool() {
        let contract = Contract::new(
            Money::from_major(10_000_000),
            Money::from_major(2_000_000),
            dec!(10),
            36,
            None,
        )
        .unwrap();

        assert_eq!(contract.possession_amount(), Money::from_major(1_000_000));
        assert_eq!(contract.monthly_pool_amount(), Money::from_major(7_000_000));
        assert_eq!(contract.possession.amount, Money::from_major(1_000_000));
    }

    #[test]
    fn test_possession_rounding() {
        // 12.5% of 1_001 = 125.125 -> 125
        let contract = Contract::new(Money::from_major(1_001), Money::ZERO, dec!(12.5), 1, None).unwrap();
        assert_eq!(contract.possession_amount(), Money::from_major(125));
    }

    #[test]
    fn test_pool_never_negative() {
        let contract = Contract::new(
            Money::from_major(1_000),
            Money::from_major(900),
            dec!(20),
            12,
            None,
        )
        .unwrap();

        assert_eq!(contract.monthly_pool_amount(), Money::ZERO);
    }

    #[test]
    fn test_zero_months_rejected() {
        let err = Contract::new(Money::from_major(1_000), Money::ZERO, dec!(0), 0, None).unwrap_err();
        assert!(matches!(err, LedgerError::NonPositiveMonths { months: 0 }));
    }
}
