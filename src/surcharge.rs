use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calendar::{days_between, DateOnly};
use crate::config::SurchargeConfig;
use crate::decimal::Money;
use crate::events::{Event, EventStore};
use crate::ledger::{Chargeable, SurchargeLockState};
use crate::payments::aggregate::{effective_paid, effective_payment_date};
use crate::types::ContractId;

/// why an evaluation left the lock state untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// zero-value items never accrue surcharge
    ZeroFaceValue,
    /// no due date known
    NoDueDate,
    /// nothing has been paid yet, so the clock has not started
    NoPaymentDate,
    /// already locked up to the current cycle
    NoNewCycle,
}

/// one locked surcharge cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurchargeBlock {
    pub cycle: u32,
    pub days_from: u32,
    pub days_to: u32,
    pub base: Money,
    pub amount: Money,
}

/// result of running the engine over one item
#[derive(Debug, Clone, PartialEq)]
pub struct SurchargeEvaluation {
    pub previous: SurchargeLockState,
    pub state: SurchargeLockState,
    pub current_balance: Money,
    pub cutoff: Option<DateOnly>,
    pub days_late: u32,
    pub preview_cycles: u32,
    pub blocks: Vec<SurchargeBlock>,
    pub skipped: Option<SkipReason>,
}

impl SurchargeEvaluation {
    fn unchanged(previous: SurchargeLockState, current_balance: Money, reason: SkipReason) -> Self {
        Self {
            previous,
            state: previous,
            current_balance,
            cutoff: None,
            days_late: 0,
            preview_cycles: 0,
            blocks: Vec::new(),
            skipped: Some(reason),
        }
    }

    pub fn increment(&self) -> Money {
        self.blocks.iter().map(|b| b.amount).sum()
    }

    pub fn cycles_added(&self) -> u32 {
        self.state.cycles_applied - self.previous.cycles_applied
    }

    pub fn changed(&self) -> bool {
        self.state != self.previous
    }

    pub fn froze_base(&self) -> bool {
        self.previous.balance_base.is_none() && self.state.balance_base.is_some()
    }
}

/// engine for locking late-payment surcharge in fixed cycles
///
/// Every completed cycle past the due date adds `percentage` of a base
/// amount. The first cycle uses the full face value; later cycles use the
/// balance frozen when the first cycle was locked. Nothing is ever
/// recomputed downwards: an evaluation only appends cycles.
#[derive(Debug, Clone)]
pub struct SurchargeEngine {
    pub config: SurchargeConfig,
}

impl SurchargeEngine {
    pub fn new(config: SurchargeConfig) -> Self {
        Self { config }
    }

    /// completed cycles in a late period
    pub fn cycles_for(&self, days_late: u32) -> u32 {
        days_late / self.config.cycle_length_days.max(1)
    }

    /// days past due for display, measured up to `today`
    pub fn late_days_display(&self, due_date: Option<DateOnly>, today: DateOnly) -> u32 {
        due_date.map(|due| days_between(due, today)).unwrap_or(0)
    }

    /// compute the next lock state without touching the item
    pub fn evaluate<C: Chargeable + ?Sized>(&self, item: &C, today: DateOnly) -> SurchargeEvaluation {
        let previous = *item.lock_state();
        let face = item.face_value();
        let paid = effective_paid(item);
        let current_balance = face.saturating_sub(paid);

        if !face.is_positive() {
            return SurchargeEvaluation::unchanged(previous, current_balance, SkipReason::ZeroFaceValue);
        }

        let Some(latest_payment) = effective_payment_date(item) else {
            return SurchargeEvaluation::unchanged(previous, current_balance, SkipReason::NoPaymentDate);
        };

        let Some(due) = item.due_date() else {
            return SurchargeEvaluation::unchanged(previous, current_balance, SkipReason::NoDueDate);
        };

        // still owing: the clock runs until today; settled: it stops at the last payment
        let cutoff = if current_balance.is_positive() { today } else { latest_payment };
        let days_late = days_between(due, cutoff);
        let preview_cycles = self.cycles_for(days_late);

        if preview_cycles <= previous.cycles_applied {
            return SurchargeEvaluation {
                cutoff: Some(cutoff),
                days_late,
                preview_cycles,
                ..SurchargeEvaluation::unchanged(previous, current_balance, SkipReason::NoNewCycle)
            };
        }

        let balance_base = previous.balance_base.unwrap_or(current_balance);
        let cycle_len = self.config.cycle_length_days;

        let blocks: Vec<SurchargeBlock> = (previous.cycles_applied + 1..=preview_cycles)
            .map(|cycle| {
                let base = if cycle == 1 { face } else { balance_base };
                let amount = if base.is_positive() {
                    base.percent_of(self.config.percentage)
                } else {
                    Money::ZERO
                };
                SurchargeBlock {
                    cycle,
                    days_from: (cycle - 1) * cycle_len + 1,
                    days_to: cycle * cycle_len,
                    base,
                    amount,
                }
            })
            .collect();

        let increment: Money = blocks.iter().map(|b| b.amount).sum();
        let state = SurchargeLockState {
            locked_amount: previous.locked_amount + increment,
            cycles_applied: preview_cycles,
            balance_base: Some(balance_base),
        };

        SurchargeEvaluation {
            previous,
            state,
            current_balance,
            cutoff: Some(cutoff),
            days_late,
            preview_cycles,
            blocks,
            skipped: None,
        }
    }

    /// evaluate and store the new lock state on the item
    pub fn lock<C: Chargeable + ?Sized>(
        &self,
        contract_id: ContractId,
        item: &mut C,
        today: DateOnly,
        events: &mut EventStore,
    ) -> SurchargeEvaluation {
        let evaluation = self.evaluate(item, today);
        let label = item.label();

        debug!(
            contract = %contract_id,
            item = %label,
            days_late = evaluation.days_late,
            cycles = evaluation.preview_cycles,
            skipped = ?evaluation.skipped,
            "surcharge evaluated"
        );

        if !evaluation.changed() {
            return evaluation;
        }

        if evaluation.froze_base() {
            if let Some(balance_base) = evaluation.state.balance_base {
                events.emit(Event::BalanceBaseFrozen {
                    contract_id,
                    item: label.clone(),
                    balance_base,
                    as_of: today,
                });
            }
        }

        for block in &evaluation.blocks {
            events.emit(Event::SurchargeCycleLocked {
                contract_id,
                item: label.clone(),
                cycle: block.cycle,
                base: block.base,
                amount: block.amount,
                days_late: evaluation.days_late,
                as_of: today,
            });
        }

        info!(
            contract = %contract_id,
            item = %label,
            cycles_added = evaluation.cycles_added(),
            increment = %evaluation.increment(),
            locked = %evaluation.state.locked_amount,
            "surcharge locked"
        );

        *item.lock_state_mut() = evaluation.state;
        evaluation
    }
}

impl Default for SurchargeEngine {
    fn default() -> Self {
        Self::new(SurchargeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::ledger::{BillingRow, PossessionCharge};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> DateOnly {
        DateOnly::from_ymd(y, m, d).unwrap()
    }

    fn due() -> DateOnly {
        date(2025, 1, 1)
    }

    fn day(n: i64) -> DateOnly {
        due().add_days(n).unwrap()
    }

    fn row(amount: i64) -> BillingRow {
        BillingRow::new(1, "1st INSTALLMENT".to_string(), Money::from_major(amount), due())
    }

    #[test]
    fn test_no_payment_date_means_no_surcharge() {
        let engine = SurchargeEngine::default();
        let r = row(10_000);

        let eval = engine.evaluate(&r, day(35));

        assert_eq!(eval.skipped, Some(SkipReason::NoPaymentDate));
        assert_eq!(eval.state, SurchargeLockState::new());
    }

    #[test]
    fn test_zero_value_row() {
        let engine = SurchargeEngine::default();
        let r = row(0).with_payment(Money::ZERO, day(90));

        let eval = engine.evaluate(&r, day(120));

        assert_eq!(eval.skipped, Some(SkipReason::ZeroFaceValue));
        assert!(!eval.changed());
    }

    #[test]
    fn test_first_cycle_uses_face_value_and_freezes_balance() {
        let engine = SurchargeEngine::default();
        let r = row(100_000).with_payment(Money::from_major(20_000), day(31));

        let eval = engine.evaluate(&r, day(31));

        assert_eq!(eval.days_late, 31);
        assert_eq!(eval.state.cycles_applied, 1);
        assert_eq!(eval.state.locked_amount, Money::from_major(5_000));
        assert_eq!(eval.state.balance_base, Some(Money::from_major(80_000)));
        assert!(eval.froze_base());
    }

    #[test]
    fn test_second_cycle_uses_frozen_balance() {
        let engine = SurchargeEngine::default();
        let mut events = EventStore::new();
        let contract_id = Uuid::new_v4();
        let mut r = row(100_000).with_payment(Money::from_major(20_000), day(31));

        engine.lock(contract_id, &mut r, day(31), &mut events);
        let eval = engine.lock(contract_id, &mut r, day(61), &mut events);

        assert_eq!(eval.increment(), Money::from_major(4_000));
        assert_eq!(r.surcharge.cycles_applied, 2);
        assert_eq!(r.surcharge.locked_amount, Money::from_major(9_000));
        assert_eq!(r.surcharge.balance_base, Some(Money::from_major(80_000)));
        assert_eq!(events.surcharge_locks().count(), 2);
    }

    #[test]
    fn test_frozen_balance_survives_later_payments() {
        let engine = SurchargeEngine::default();
        let mut events = EventStore::new();
        let contract_id = Uuid::new_v4();
        let mut r = row(100_000).with_payment(Money::from_major(20_000), day(31));
        engine.lock(contract_id, &mut r, day(31), &mut events);

        // another 50_000 arrives but 10_000 is still owed
        r.add_child(Money::from_major(50_000), day(40));
        engine.lock(contract_id, &mut r, day(61), &mut events);

        // second cycle still charged on the 80_000 snapshot
        assert_eq!(r.surcharge.locked_amount, Money::from_major(9_000));
        assert_eq!(r.surcharge.balance_base, Some(Money::from_major(80_000)));
    }

    #[test]
    fn test_several_cycles_at_once() {
        let engine = SurchargeEngine::default();
        let r = row(10_000).with_payment(Money::from_major(4_000), day(5));

        let eval = engine.evaluate(&r, day(95));

        // cycle 1 on 10_000, cycles 2-3 on the 6_000 balance
        assert_eq!(eval.blocks.len(), 3);
        assert_eq!(eval.blocks[0].amount, Money::from_major(500));
        assert_eq!(eval.blocks[1].amount, Money::from_major(300));
        assert_eq!(eval.blocks[2].days_from, 61);
        assert_eq!(eval.blocks[2].days_to, 90);
        assert_eq!(eval.state.locked_amount, Money::from_major(1_100));
    }

    #[test]
    fn test_full_payment_stops_the_clock() {
        let engine = SurchargeEngine::default();
        let mut events = EventStore::new();
        let contract_id = Uuid::new_v4();
        let mut r = row(10_000).with_payment(Money::from_major(10_000), day(45));

        let eval = engine.lock(contract_id, &mut r, day(400), &mut events);

        assert_eq!(eval.cutoff, Some(day(45)));
        assert_eq!(r.surcharge.cycles_applied, 1);
        assert_eq!(r.surcharge.locked_amount, Money::from_major(500));
        // fully paid at first trigger: later cycles would use a zero base
        assert_eq!(r.surcharge.balance_base, Some(Money::ZERO));

        let again = engine.lock(contract_id, &mut r, day(800), &mut events);
        assert!(!again.changed());
    }

    #[test]
    fn test_zero_base_adds_cycles_without_amount() {
        let engine = SurchargeEngine::default();
        let mut r = row(10_000).with_payment(Money::from_major(10_000), day(75));
        r.surcharge = SurchargeLockState {
            locked_amount: Money::from_major(500),
            cycles_applied: 1,
            balance_base: Some(Money::ZERO),
        };

        let eval = engine.evaluate(&r, day(75));

        assert_eq!(eval.state.cycles_applied, 2);
        assert_eq!(eval.state.locked_amount, Money::from_major(500));
    }

    #[test]
    fn test_monotonic_when_payment_edited_earlier() {
        let engine = SurchargeEngine::default();
        let mut events = EventStore::new();
        let contract_id = Uuid::new_v4();
        let mut r = row(10_000).with_payment(Money::from_major(10_000), day(70));
        engine.lock(contract_id, &mut r, day(70), &mut events);
        let locked = r.surcharge;
        assert_eq!(locked.cycles_applied, 2);

        // payment re-entered as on time
        r.payment_date = Some(day(1));
        let eval = engine.lock(contract_id, &mut r, day(71), &mut events);

        assert_eq!(eval.skipped, Some(SkipReason::NoNewCycle));
        assert_eq!(r.surcharge, locked);

        // payment removed entirely
        r.amount_paid = Money::ZERO;
        r.payment_date = None;
        engine.lock(contract_id, &mut r, day(72), &mut events);
        assert_eq!(r.surcharge, locked);
    }

    #[test]
    fn test_monotonic_over_time() {
        let engine = SurchargeEngine::default();
        let mut events = EventStore::new();
        let contract_id = Uuid::new_v4();
        let mut r = row(7_777).with_payment(Money::from_major(1_111), day(3));

        let mut previous = r.surcharge;
        for n in (0..400).step_by(7) {
            engine.lock(contract_id, &mut r, day(n), &mut events);
            assert!(previous.permits(&r.surcharge));
            previous = r.surcharge;
        }
        assert_eq!(r.surcharge.cycles_applied, engine.cycles_for(399));
    }

    #[test]
    fn test_cycle_boundary() {
        let engine = SurchargeEngine::default();
        let r = row(10_000).with_payment(Money::from_major(1_000), day(1));

        assert_eq!(engine.evaluate(&r, day(29)).state.cycles_applied, 0);
        assert_eq!(engine.evaluate(&r, day(30)).state.cycles_applied, 1);
        assert_eq!(engine.evaluate(&r, day(59)).state.cycles_applied, 1);
        assert_eq!(engine.evaluate(&r, day(60)).state.cycles_applied, 2);
    }

    #[test]
    fn test_configured_rate_and_cycle() {
        let engine = SurchargeEngine::new(SurchargeConfig {
            percentage: Rate::from_percentage(2),
            cycle_length_days: 15,
        });
        let r = row(10_000).with_payment(Money::from_major(5_000), day(1));

        let eval = engine.evaluate(&r, day(31));

        // 2% of 10_000, then 2% of 5_000
        assert_eq!(eval.state.cycles_applied, 2);
        assert_eq!(eval.state.locked_amount, Money::from_major(300));
    }

    #[test]
    fn test_possession_uses_same_engine() {
        let engine = SurchargeEngine::default();
        let mut events = EventStore::new();
        let mut possession = PossessionCharge {
            amount: Money::from_major(1_000_000),
            due_date: Some(due()),
            amount_paid: Money::from_major(400_000),
            payment_date: Some(day(10)),
            ..PossessionCharge::default()
        };

        engine.lock(Uuid::new_v4(), &mut possession, day(65), &mut events);

        // 50_000 on the face value, then 30_000 on the 600_000 balance
        assert_eq!(possession.surcharge.cycles_applied, 2);
        assert_eq!(possession.surcharge.locked_amount, Money::from_major(80_000));
    }

    #[test]
    fn test_possession_without_due_date() {
        let engine = SurchargeEngine::default();
        let possession = PossessionCharge {
            amount: Money::from_major(1_000),
            amount_paid: Money::from_major(10),
            payment_date: Some(day(10)),
            ..PossessionCharge::default()
        };

        let eval = engine.evaluate(&possession, day(100));
        assert_eq!(eval.skipped, Some(SkipReason::NoDueDate));
    }

    #[test]
    fn test_late_days_display() {
        let engine = SurchargeEngine::default();

        assert_eq!(engine.late_days_display(Some(due()), day(12)), 12);
        assert_eq!(engine.late_days_display(Some(day(10)), due()), 0);
        assert_eq!(engine.late_days_display(None, day(12)), 0);
    }
}
