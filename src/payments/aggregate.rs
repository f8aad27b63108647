use crate::calendar::DateOnly;
use crate::decimal::Money;
use crate::ledger::Chargeable;

/// direct payment plus every split payment
pub fn effective_paid<C: Chargeable + ?Sized>(item: &C) -> Money {
    item.payments().iter().map(|p| p.amount).sum()
}

/// latest payment date across the item and its split payments
pub fn effective_payment_date<C: Chargeable + ?Sized>(item: &C) -> Option<DateOnly> {
    item.payments().iter().filter_map(|p| p.date).max()
}

/// face value minus effective paid, floored at zero
pub fn outstanding_balance<C: Chargeable + ?Sized>(item: &C) -> Money {
    item.face_value().saturating_sub(effective_paid(item))
}

/// balance shown to staff and clients
///
/// An item nobody has paid against yet shows 0, not its face value. The
/// balance only appears after the first payment.
pub fn display_balance<C: Chargeable + ?Sized>(item: &C) -> Money {
    let paid = effective_paid(item);
    if paid.is_zero() {
        return Money::ZERO;
    }
    item.face_value().saturating_sub(paid)
}

/// everything the aggregator knows about one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentSummary {
    pub face_value: Money,
    pub effective_paid: Money,
    pub effective_payment_date: Option<DateOnly>,
    pub outstanding: Money,
    pub display_balance: Money,
}

impl PaymentSummary {
    pub fn of<C: Chargeable + ?Sized>(item: &C) -> Self {
        let paid = effective_paid(item);
        let outstanding = item.face_value().saturating_sub(paid);
        Self {
            face_value: item.face_value(),
            effective_paid: paid,
            effective_payment_date: effective_payment_date(item),
            outstanding,
            display_balance: if paid.is_zero() { Money::ZERO } else { outstanding },
        }
    }

    pub fn is_settled(&self) -> bool {
        self.outstanding.is_zero()
    }
}
