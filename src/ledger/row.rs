use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::DateOnly;
use crate::decimal::Money;
use crate::types::{ChildId, PaymentInstrument, RowId};

/// surcharge already locked on a row
///
/// `locked_amount` and `cycles_applied` only ever grow. `balance_base` is the
/// outstanding balance captured when the first cycle was applied; `None`
/// means no cycle has ever been triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SurchargeLockState {
    pub locked_amount: Money,
    pub cycles_applied: u32,
    pub balance_base: Option<Money>,
}

impl SurchargeLockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_triggered(&self) -> bool {
        self.cycles_applied > 0
    }

    /// true when `next` does not move any locked field backwards
    pub fn permits(&self, next: &SurchargeLockState) -> bool {
        let base_kept = match self.balance_base {
            Some(base) => next.balance_base == Some(base),
            None => true,
        };
        next.locked_amount >= self.locked_amount
            && next.cycles_applied >= self.cycles_applied
            && base_kept
    }
}

/// one recorded payment against a chargeable item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentEntry {
    pub amount: Money,
    pub date: Option<DateOnly>,
}

/// anything that carries a face value, payments, and its own surcharge lock
pub trait Chargeable {
    fn face_value(&self) -> Money;
    fn due_date(&self) -> Option<DateOnly>;
    fn payments(&self) -> Vec<PaymentEntry>;
    fn lock_state(&self) -> &SurchargeLockState;
    fn lock_state_mut(&mut self) -> &mut SurchargeLockState;
    fn label(&self) -> String;
}

/// partial payment recorded against a parent row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildPayment {
    pub id: ChildId,
    pub line: u32,
    pub description: String,
    pub amount_paid: Money,
    pub payment_date: Option<DateOnly>,
    pub instrument: PaymentInstrument,
    pub payment_proof: Option<String>,
}

impl ChildPayment {
    pub fn new(line: u32, amount_paid: Money, payment_date: Option<DateOnly>) -> Self {
        Self {
            id: Uuid::new_v4(),
            line,
            description: String::new(),
            amount_paid,
            payment_date,
            instrument: PaymentInstrument::default(),
            payment_proof: None,
        }
    }
}

/// one scheduled charge of a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRow {
    pub id: RowId,
    pub sequence: u32,
    pub description: String,
    pub installment_amount: Money,
    pub due_date: DateOnly,
    pub amount_paid: Money,
    pub payment_date: Option<DateOnly>,
    pub instrument: PaymentInstrument,
    pub payment_proof: Option<String>,
    pub surcharge: SurchargeLockState,
    pub children: Vec<ChildPayment>,
}

impl BillingRow {
    pub fn new(sequence: u32, description: String, installment_amount: Money, due_date: DateOnly) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            description,
            installment_amount,
            due_date,
            amount_paid: Money::ZERO,
            payment_date: None,
            instrument: PaymentInstrument::default(),
            payment_proof: None,
            surcharge: SurchargeLockState::new(),
            children: Vec::new(),
        }
    }

    /// record a direct payment on the row itself
    pub fn with_payment(mut self, amount: Money, date: DateOnly) -> Self {
        self.amount_paid = amount;
        self.payment_date = Some(date);
        self
    }

    /// append a split payment with the next free line number
    pub fn add_child(&mut self, amount: Money, date: DateOnly) -> &ChildPayment {
        let line = self.children.iter().map(|c| c.line).max().unwrap_or(0) + 1;
        self.children.push(ChildPayment::new(line, amount, Some(date)));
        &self.children[self.children.len() - 1]
    }

    pub fn child(&self, id: ChildId) -> Option<&ChildPayment> {
        self.children.iter().find(|c| c.id == id)
    }

    pub fn child_mut(&mut self, id: ChildId) -> Option<&mut ChildPayment> {
        self.children.iter_mut().find(|c| c.id == id)
    }
}

impl Chargeable for BillingRow {
    fn face_value(&self) -> Money {
        self.installment_amount
    }

    fn due_date(&self) -> Option<DateOnly> {
        Some(self.due_date)
    }

    fn payments(&self) -> Vec<PaymentEntry> {
        let direct = PaymentEntry {
            amount: self.amount_paid,
            date: self.payment_date,
        };
        std::iter::once(direct)
            .chain(self.children.iter().map(|c| PaymentEntry {
                amount: c.amount_paid,
                date: c.payment_date,
            }))
            .collect()
    }

    fn lock_state(&self) -> &SurchargeLockState {
        &self.surcharge
    }

    fn lock_state_mut(&mut self) -> &mut SurchargeLockState {
        &mut self.surcharge
    }

    fn label(&self) -> String {
        format!("row {}", self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> DateOnly {
        DateOnly::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn test_child_line_numbers_increment() {
        let mut row = BillingRow::new(1, "1st INSTALLMENT".to_string(), Money::from_major(5_000), date(2025, 1, 1));
        row.add_child(Money::from_major(1_000), date(2025, 1, 5));
        row.add_child(Money::from_major(1_000), date(2025, 1, 9));

        let lines: Vec<u32> = row.children.iter().map(|c| c.line).collect();
        assert_eq!(lines, vec![1, 2]);
    }

    #[test]
    fn test_payments_include_direct_and_children() {
        let mut row = BillingRow::new(1, String::new(), Money::from_major(5_000), date(2025, 1, 1))
            .with_payment(Money::from_major(2_000), date(2025, 1, 3));
        row.add_child(Money::from_major(500), date(2025, 2, 1));

        let payments = row.payments();
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].amount, Money::from_major(2_000));
        assert_eq!(payments[1].date, Some(date(2025, 2, 1)));
    }

    #[test]
    fn test_lock_state_permits() {
        let untouched = SurchargeLockState::new();
        let locked = SurchargeLockState {
            locked_amount: Money::from_major(5_000),
            cycles_applied: 1,
            balance_base: Some(Money::from_major(80_000)),
        };

        assert!(untouched.permits(&locked));
        assert!(!locked.permits(&untouched));

        let rebased = SurchargeLockState {
            balance_base: Some(Money::from_major(70_000)),
            ..locked
        };
        assert!(!locked.permits(&rebased));
    }
}
