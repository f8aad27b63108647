use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::calendar::DateOnly;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::{BillingRow, Contract};
use crate::payments::aggregate::{effective_paid, effective_payment_date};

/// one generated installment before it becomes a ledger row
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledInstallment {
    pub sequence: u32,
    pub description: String,
    pub amount: Money,
    pub due_date: DateOnly,
}

/// rows after a rebuild, with what happened to the old ones
#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub rows: Vec<BillingRow>,
    pub preserved: usize,
    pub created: usize,
    pub dropped: Vec<BillingRow>,
}

/// English ordinal suffix: 1st, 2nd, 3rd, 4th, 11th, 21st...
pub fn ordinal_suffix(n: u32) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

pub fn installment_description(sequence: u32) -> String {
    format!("{}{} INSTALLMENT", sequence, ordinal_suffix(sequence))
}

/// equal monthly installments with the remainder spread over the first rows
pub struct ScheduleGenerator;

impl ScheduleGenerator {
    /// split `pool` into `months` rows due one month apart from `start`
    ///
    /// The first `pool mod months` rows carry one extra unit, so the row
    /// amounts always add up to exactly `pool`.
    pub fn generate(pool: Money, months: u32, start: DateOnly) -> Result<Vec<ScheduledInstallment>> {
        if months == 0 {
            return Err(LedgerError::NonPositiveMonths { months: 0 });
        }

        let pool_units = pool.max(Money::ZERO).as_decimal().trunc();
        let count = Decimal::from(months);
        let base = (pool_units / count).floor();
        let remainder = (pool_units - base * count).to_u32().unwrap_or(0);

        (0..months)
            .map(|i| {
                let sequence = i + 1;
                let extra = if i < remainder { Decimal::ONE } else { Decimal::ZERO };
                let due_date = start.add_months(i).ok_or_else(|| LedgerError::InvalidConfiguration {
                    message: format!("due date out of range for installment {}", sequence),
                })?;
                Ok(ScheduledInstallment {
                    sequence,
                    description: installment_description(sequence),
                    amount: Money::from_decimal(base + extra),
                    due_date,
                })
            })
            .collect()
    }

    /// regenerate a contract's rows after its terms changed
    ///
    /// Rows matched by sequence number keep their id, payments, split
    /// payments, proof and surcharge lock; only amount, due date and
    /// description are refreshed. Rows past the new month count are dropped.
    pub fn rebuild(
        contract: &Contract,
        existing: Vec<BillingRow>,
        today: DateOnly,
        events: &mut EventStore,
    ) -> Result<RebuildOutcome> {
        let start = contract.start_date.unwrap_or(today);
        let pool = contract.monthly_pool_amount();
        let schedule = Self::generate(pool, contract.months, start)?;

        let mut by_sequence: BTreeMap<u32, BillingRow> =
            existing.into_iter().map(|r| (r.sequence, r)).collect();

        let mut rows = Vec::with_capacity(schedule.len());
        let mut preserved = 0;
        let mut created = 0;

        for item in schedule {
            match by_sequence.remove(&item.sequence) {
                Some(mut row) => {
                    row.installment_amount = item.amount;
                    row.due_date = item.due_date;
                    row.description = item.description;
                    rows.push(row);
                    preserved += 1;
                }
                None => {
                    rows.push(BillingRow::new(item.sequence, item.description, item.amount, item.due_date));
                    created += 1;
                }
            }
        }

        let dropped: Vec<BillingRow> = by_sequence.into_values().collect();
        for row in &dropped {
            let had_payments =
                effective_paid(row).is_positive() || effective_payment_date(row).is_some();
            if had_payments {
                warn!(
                    contract = %contract.id,
                    sequence = row.sequence,
                    paid = %effective_paid(row),
                    "dropping row with recorded payments"
                );
            }
            events.emit(Event::RowDropped {
                contract_id: contract.id,
                row_id: row.id,
                sequence: row.sequence,
                had_payments,
            });
        }

        info!(
            contract = %contract.id,
            months = contract.months,
            pool = %pool,
            preserved,
            created,
            dropped = dropped.len(),
            "schedule rebuilt"
        );

        events.emit(Event::ScheduleRebuilt {
            contract_id: contract.id,
            months: contract.months,
            monthly_pool: pool,
            preserved_rows: preserved,
            created_rows: created,
            dropped_rows: dropped.len(),
        });

        Ok(RebuildOutcome {
            rows,
            preserved,
            created,
            dropped,
        })
    }
}
