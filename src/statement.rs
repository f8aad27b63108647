//! totals and statement views over a contract's ledger

use serde::{Deserialize, Serialize};

use crate::calendar::DateOnly;
use crate::config::LedgerConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::ledger::{BillingRow, Chargeable, Contract, PossessionCharge};
use crate::payments::aggregate::PaymentSummary;
use crate::storage::StatementRenderer;
use crate::surcharge::SurchargeEngine;
use crate::types::{ContractId, PaymentInstrument, RowStanding, TotalDuePolicy};

/// headline figures for a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub total_payable: Money,
    pub total_paid: Money,
    /// outstanding balance, surcharge excluded
    pub total_receivable: Money,
    pub total_surcharge: Money,
    pub total_due: Money,
    pub policy: TotalDuePolicy,
}

impl LedgerTotals {
    pub fn compute(
        contract: &Contract,
        rows: &[BillingRow],
        possession: &PossessionCharge,
        policy: TotalDuePolicy,
    ) -> Self {
        let total_payable = contract.possession_amount() + contract.monthly_pool_amount();

        let total_paid = rows
            .iter()
            .map(|r| PaymentSummary::of(r).effective_paid)
            .sum::<Money>()
            + PaymentSummary::of(possession).effective_paid;

        let total_receivable = total_payable.saturating_sub(total_paid);

        let total_surcharge = rows
            .iter()
            .map(|r| r.surcharge.locked_amount)
            .sum::<Money>()
            + possession.surcharge.locked_amount;

        let total_due = match policy {
            TotalDuePolicy::ReceivableOnly => total_receivable,
            TotalDuePolicy::ReceivableWithSurcharge => total_receivable + total_surcharge,
        };

        Self {
            total_payable,
            total_paid,
            total_receivable,
            total_surcharge,
            total_due,
            policy,
        }
    }
}

/// one printable line; `sequence` is `None` for the possession charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    pub sequence: Option<u32>,
    pub description: String,
    pub amount: Money,
    pub due_date: Option<String>,
    pub paid: Money,
    pub payment_date: Option<String>,
    pub instrument: PaymentInstrument,
    pub balance: Money,
    pub surcharge: Money,
    pub late_days: u32,
    pub standing: RowStanding,
}

impl StatementLine {
    fn build<C: Chargeable + ?Sized>(
        item: &C,
        sequence: Option<u32>,
        description: String,
        instrument: PaymentInstrument,
        today: DateOnly,
        engine: &SurchargeEngine,
    ) -> Self {
        let summary = PaymentSummary::of(item);
        let due = item.due_date();
        let lock = item.lock_state();

        Self {
            sequence,
            description,
            amount: summary.face_value,
            due_date: due.map(|d| d.display()),
            paid: summary.effective_paid,
            payment_date: summary.effective_payment_date.map(|d| d.display()),
            instrument,
            balance: summary.display_balance,
            surcharge: lock.locked_amount,
            late_days: engine.late_days_display(due, today),
            standing: standing(&summary, due, lock.is_triggered(), today),
        }
    }
}

fn standing(summary: &PaymentSummary, due: Option<DateOnly>, surcharged: bool, today: DateOnly) -> RowStanding {
    if surcharged {
        return RowStanding::Surcharged;
    }
    let Some(due) = due else {
        return RowStanding::Clear;
    };
    let late = if summary.is_settled() {
        summary.effective_payment_date.map(|paid| paid > due).unwrap_or(false)
    } else {
        today > due
    };
    if late {
        RowStanding::Late
    } else {
        RowStanding::Clear
    }
}

/// contract header as shown on a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementHeader {
    pub contract_id: ContractId,
    pub total_amount: Money,
    pub down_payment: Money,
    pub possession_amount: Money,
    pub monthly_pool_amount: Money,
    pub months: u32,
    pub start_date: Option<String>,
    pub booking_date: Option<String>,
}

/// renderer input: computed lines and totals, nothing left to derive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub generated_on: String,
    pub header: StatementHeader,
    pub lines: Vec<StatementLine>,
    pub possession: Option<StatementLine>,
    pub totals: LedgerTotals,
}

impl Statement {
    pub fn build(
        contract: &Contract,
        rows: &[BillingRow],
        possession: &PossessionCharge,
        today: DateOnly,
        config: &LedgerConfig,
    ) -> Self {
        let engine = SurchargeEngine::new(config.surcharge.clone());

        let mut ordered: Vec<&BillingRow> = rows.iter().collect();
        ordered.sort_by_key(|r| r.sequence);

        let lines = ordered
            .into_iter()
            .map(|r| {
                StatementLine::build(
                    r,
                    Some(r.sequence),
                    r.description.clone(),
                    r.instrument.clone(),
                    today,
                    &engine,
                )
            })
            .collect();

        let possession_line = possession.amount.is_positive().then(|| {
            StatementLine::build(
                possession,
                None,
                "POSSESSION".to_string(),
                possession.instrument.clone(),
                today,
                &engine,
            )
        });

        Self {
            generated_on: today.display(),
            header: StatementHeader {
                contract_id: contract.id,
                total_amount: contract.total_amount,
                down_payment: contract.down_payment,
                possession_amount: contract.possession_amount(),
                monthly_pool_amount: contract.monthly_pool_amount(),
                months: contract.months,
                start_date: contract.start_date.map(|d| d.display()),
                booking_date: contract.booking_date.map(|d| d.display()),
            },
            lines,
            possession: possession_line,
            totals: LedgerTotals::compute(contract, rows, possession, config.total_due_policy),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::Render {
            message: e.to_string(),
        })
    }
}

/// contract, ordered rows and totals as returned by load and save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerView {
    pub contract: Contract,
    pub rows: Vec<BillingRow>,
    pub totals: LedgerTotals,
}

impl LedgerView {
    pub fn new(contract: Contract, rows: Vec<BillingRow>, policy: TotalDuePolicy) -> Self {
        let totals = LedgerTotals::compute(&contract, &rows, &contract.possession, policy);
        Self { contract, rows, totals }
    }

    pub fn row_by_sequence(&self, sequence: u32) -> Option<&BillingRow> {
        self.rows.iter().find(|r| r.sequence == sequence)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::Render {
            message: e.to_string(),
        })
    }
}

/// renders a statement as pretty-printed json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStatementRenderer;

impl StatementRenderer for JsonStatementRenderer {
    fn render(&self, statement: &Statement) -> Result<Vec<u8>> {
        statement.to_json_pretty().map(String::into_bytes)
    }
}
