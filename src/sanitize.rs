//! Loose boundary input and its conversion into strictly typed values.
//!
//! Forms and API clients send amounts as numbers, numeric strings, blanks or
//! nulls. Everything is converted here, once, so the rest of the crate only
//! ever sees well-formed `Money`, `DateOnly` and `u32` values.

use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::{BusinessCalendar, DateInput, DateOnly};
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::ledger::{BillingRow, ChildPayment, Contract};
use crate::types::{ChildId, PaymentInstrument, RowId};

/// an amount as it arrives from a form or API client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Whole(i64),
    Fractional(f64),
    Text(String),
}

impl AmountInput {
    /// parse-or-default: blank text is zero, anything unparseable is rejected
    pub fn to_decimal(&self, field: &str) -> Result<Decimal> {
        let invalid = || LedgerError::InvalidAmount {
            field: field.to_string(),
            value: self.raw(),
        };
        match self {
            AmountInput::Whole(n) => Ok(Decimal::from(*n)),
            AmountInput::Fractional(f) => Decimal::from_f64(*f).ok_or_else(invalid),
            AmountInput::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                if cleaned.is_empty() {
                    return Ok(Decimal::ZERO);
                }
                Decimal::from_str(&cleaned).map_err(|_| invalid())
            }
        }
    }

    pub fn to_money(&self, field: &str) -> Result<Money> {
        self.to_decimal(field).map(Money::from_decimal)
    }

    fn raw(&self) -> String {
        match self {
            AmountInput::Whole(n) => n.to_string(),
            AmountInput::Fractional(f) => f.to_string(),
            AmountInput::Text(s) => s.clone(),
        }
    }
}

impl From<i64> for AmountInput {
    fn from(n: i64) -> Self {
        AmountInput::Whole(n)
    }
}

impl From<&str> for AmountInput {
    fn from(s: &str) -> Self {
        AmountInput::Text(s.to_string())
    }
}

/// missing means zero; negative amounts are rejected
pub fn money_or_zero(input: Option<&AmountInput>, field: &str) -> Result<Money> {
    let amount = match input {
        Some(a) => a.to_money(field)?,
        None => Money::ZERO,
    };
    if amount.is_negative() {
        return Err(LedgerError::NegativeAmount {
            field: field.to_string(),
            amount,
        });
    }
    Ok(amount)
}

/// trimmed text, `None` when blank
pub fn clean_text(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn instrument(kind: Option<&str>, number: Option<&str>) -> PaymentInstrument {
    PaymentInstrument {
        kind: clean_text(kind),
        number: clean_text(number),
    }
}

/// a split payment as submitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChildDraft {
    pub id: Option<ChildId>,
    pub line_no: Option<u32>,
    pub description: Option<String>,
    pub amount_paid: Option<AmountInput>,
    pub payment_date: Option<DateInput>,
    pub payment_proof: Option<String>,
    pub instrument_type: Option<String>,
    pub instrument_no: Option<String>,
}

/// a ledger row as submitted; surcharge fields are never accepted here
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RowDraft {
    pub id: Option<RowId>,
    pub sr_no: Option<u32>,
    pub description: Option<String>,
    pub installment_amount: Option<AmountInput>,
    pub due_date: Option<DateInput>,
    pub amount_paid: Option<AmountInput>,
    pub payment_date: Option<DateInput>,
    pub payment_proof: Option<String>,
    pub instrument_type: Option<String>,
    pub instrument_no: Option<String>,
    pub children: Vec<ChildDraft>,
}

/// strictly typed split payment, ready to diff against storage
#[derive(Debug, Clone, PartialEq)]
pub struct ChildUpdate {
    pub id: Option<ChildId>,
    pub line: u32,
    pub description: String,
    pub amount_paid: Money,
    pub payment_date: Option<DateOnly>,
    pub instrument: PaymentInstrument,
    pub payment_proof: Option<String>,
}

/// strictly typed row, ready to diff against storage
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub id: Option<RowId>,
    pub sequence: u32,
    pub description: String,
    pub installment_amount: Money,
    pub due_date: DateOnly,
    pub amount_paid: Money,
    pub payment_date: Option<DateOnly>,
    pub instrument: PaymentInstrument,
    pub payment_proof: Option<String>,
    pub children: Vec<ChildUpdate>,
}

/// sequence numbers present and unique; child line numbers present and unique per row
pub fn validate_drafts(rows: &[RowDraft]) -> Result<()> {
    let mut sequences = HashSet::new();
    for row in rows {
        let sequence = row.sr_no.filter(|s| *s > 0).ok_or(LedgerError::MissingSequenceNumber)?;
        if !sequences.insert(sequence) {
            return Err(LedgerError::DuplicateSequenceNumber { sequence });
        }

        let mut lines = HashSet::new();
        for child in &row.children {
            let line = child
                .line_no
                .filter(|l| *l > 0)
                .ok_or(LedgerError::MissingLineNumber { sequence })?;
            if !lines.insert(line) {
                return Err(LedgerError::DuplicateLineNumber { sequence, line });
            }
        }
    }
    Ok(())
}

impl ChildDraft {
    pub fn normalize(&self, sequence: u32, calendar: &BusinessCalendar) -> Result<ChildUpdate> {
        let line = self
            .line_no
            .filter(|l| *l > 0)
            .ok_or(LedgerError::MissingLineNumber { sequence })?;
        Ok(ChildUpdate {
            id: self.id,
            line,
            description: clean_text(self.description.as_deref()).unwrap_or_default(),
            amount_paid: money_or_zero(self.amount_paid.as_ref(), "child amount paid")?,
            payment_date: calendar.parse_opt(self.payment_date.as_ref()),
            instrument: instrument(self.instrument_type.as_deref(), self.instrument_no.as_deref()),
            payment_proof: clean_text(self.payment_proof.as_deref()),
        })
    }
}

impl RowDraft {
    /// a due date that does not parse falls back to `today`
    pub fn normalize(&self, calendar: &BusinessCalendar, today: DateOnly) -> Result<RowUpdate> {
        let sequence = self.sr_no.filter(|s| *s > 0).ok_or(LedgerError::MissingSequenceNumber)?;
        let children = self
            .children
            .iter()
            .map(|c| c.normalize(sequence, calendar))
            .collect::<Result<Vec<_>>>()?;

        Ok(RowUpdate {
            id: self.id,
            sequence,
            description: clean_text(self.description.as_deref()).unwrap_or_default(),
            installment_amount: money_or_zero(self.installment_amount.as_ref(), "installment amount")?,
            due_date: calendar.parse_opt(self.due_date.as_ref()).unwrap_or(today),
            amount_paid: money_or_zero(self.amount_paid.as_ref(), "amount paid")?,
            payment_date: calendar.parse_opt(self.payment_date.as_ref()),
            instrument: instrument(self.instrument_type.as_deref(), self.instrument_no.as_deref()),
            payment_proof: clean_text(self.payment_proof.as_deref()),
            children,
        })
    }
}

/// validate, then normalize, a submitted row set
pub fn normalize_rows(rows: &[RowDraft], calendar: &BusinessCalendar, today: DateOnly) -> Result<Vec<RowUpdate>> {
    validate_drafts(rows)?;
    rows.iter().map(|r| r.normalize(calendar, today)).collect()
}

impl From<&ChildPayment> for ChildDraft {
    fn from(child: &ChildPayment) -> Self {
        Self {
            id: Some(child.id),
            line_no: Some(child.line),
            description: Some(child.description.clone()),
            amount_paid: Some(AmountInput::Text(child.amount_paid.to_string())),
            payment_date: child.payment_date.map(DateInput::from),
            payment_proof: child.payment_proof.clone(),
            instrument_type: child.instrument.kind.clone(),
            instrument_no: child.instrument.number.clone(),
        }
    }
}

/// the draft a client would send back for an unedited row
impl From<&BillingRow> for RowDraft {
    fn from(row: &BillingRow) -> Self {
        Self {
            id: Some(row.id),
            sr_no: Some(row.sequence),
            description: Some(row.description.clone()),
            installment_amount: Some(AmountInput::Text(row.installment_amount.to_string())),
            due_date: Some(DateInput::from(row.due_date)),
            amount_paid: Some(AmountInput::Text(row.amount_paid.to_string())),
            payment_date: row.payment_date.map(DateInput::from),
            payment_proof: row.payment_proof.clone(),
            instrument_type: row.instrument.kind.clone(),
            instrument_no: row.instrument.number.clone(),
            children: row.children.iter().map(ChildDraft::from).collect(),
        }
    }
}

/// header fields staff may change; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractPatch {
    pub total_amount: Option<AmountInput>,
    pub down_payment: Option<AmountInput>,
    pub possession: Option<AmountInput>,
    pub months: Option<AmountInput>,
    pub start_date: Option<DateInput>,
    pub booking_date: Option<DateInput>,
    pub possession_due_date: Option<DateInput>,
    pub possession_paid: Option<AmountInput>,
    pub possession_payment_date: Option<DateInput>,
    pub possession_instrument_type: Option<String>,
    pub possession_instrument_no: Option<String>,
}

impl ContractPatch {
    /// true when any field that drives the schedule was touched
    pub fn changes_terms(&self) -> bool {
        self.total_amount.is_some()
            || self.down_payment.is_some()
            || self.possession.is_some()
            || self.months.is_some()
            || self.start_date.is_some()
    }

    /// the patched months value, rejected unless a positive whole number
    pub fn months(&self) -> Result<Option<u32>> {
        let Some(input) = &self.months else {
            return Ok(None);
        };
        let value = input.to_decimal("months")?;
        let months = value.trunc().to_i64().ok_or_else(|| LedgerError::InvalidAmount {
            field: "months".to_string(),
            value: value.to_string(),
        })?;
        if months <= 0 {
            return Err(LedgerError::NonPositiveMonths { months });
        }
        u32::try_from(months)
            .map(Some)
            .map_err(|_| LedgerError::InvalidAmount {
                field: "months".to_string(),
                value: months.to_string(),
            })
    }

    /// apply to a contract; the contract is untouched when any field is invalid
    pub fn apply(&self, contract: &Contract, calendar: &BusinessCalendar) -> Result<Contract> {
        let mut next = contract.clone();

        if let Some(months) = self.months()? {
            next.months = months;
        }
        if self.total_amount.is_some() {
            next.total_amount = money_or_zero(self.total_amount.as_ref(), "total amount")?;
        }
        if self.down_payment.is_some() {
            next.down_payment = money_or_zero(self.down_payment.as_ref(), "down payment")?;
        }
        if let Some(possession) = &self.possession {
            let pct = possession.to_decimal("possession")?;
            if pct < Decimal::ZERO {
                return Err(LedgerError::InvalidAmount {
                    field: "possession".to_string(),
                    value: pct.to_string(),
                });
            }
            next.possession_percentage = pct;
        }
        if let Some(start) = &self.start_date {
            next.start_date = calendar.parse(start);
        }
        if let Some(booking) = &self.booking_date {
            next.booking_date = calendar.parse(booking);
        }
        if let Some(due) = &self.possession_due_date {
            next.possession.due_date = calendar.parse(due);
        }
        if self.possession_paid.is_some() {
            next.possession.amount_paid = money_or_zero(self.possession_paid.as_ref(), "possession paid")?;
        }
        if let Some(paid_on) = &self.possession_payment_date {
            next.possession.payment_date = calendar.parse(paid_on);
        }
        if self.possession_instrument_type.is_some() || self.possession_instrument_no.is_some() {
            next.possession.instrument = instrument(
                self.possession_instrument_type.as_deref(),
                self.possession_instrument_no.as_deref(),
            );
        }

        next.validate()?;
        next.refresh_possession();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn calendar() -> BusinessCalendar {
        BusinessCalendar::new(300).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> DateOnly {
        DateOnly::from_ymd(y, m, d).unwrap()
    }

    fn draft(sr: u32) -> RowDraft {
        RowDraft {
            sr_no: Some(sr),
            installment_amount: Some(AmountInput::from(1_000)),
            due_date: Some(DateInput::from("2025-01-01")),
            ..RowDraft::default()
        }
    }

    #[test]
    fn test_amount_parse_or_default() {
        assert_eq!(AmountInput::from("").to_money("x").unwrap(), Money::ZERO);
        assert_eq!(AmountInput::from("  ").to_money("x").unwrap(), Money::ZERO);
        assert_eq!(AmountInput::from("1,250").to_money("x").unwrap(), Money::from_major(1_250));
        assert_eq!(AmountInput::from("99.5").to_money("x").unwrap(), Money::from_major(100));
        assert_eq!(AmountInput::Fractional(10.4).to_money("x").unwrap(), Money::from_major(10));
        assert_eq!(money_or_zero(None, "x").unwrap(), Money::ZERO);

        let err = AmountInput::from("ten").to_money("amount paid").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { ref field, .. } if field == "amount paid"));
    }

    #[test]
    fn test_negative_rejected() {
        let err = money_or_zero(Some(&AmountInput::from(-5)), "amount paid").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_json_drafts() {
        let json = r#"[
            {"srNo": 1, "installmentAmount": "5000", "dueDate": "2025-01-05",
             "amountPaid": 2000, "paymentDate": "05/02/2025", "instrumentType": " Cheque ",
             "children": [{"lineNo": 1, "amountPaid": "", "paymentDate": null}]},
            {"srNo": 2, "installmentAmount": null, "dueDate": "not a date", "latePaymentSurcharge": 999}
        ]"#;
        let drafts: Vec<RowDraft> = serde_json::from_str(json).unwrap();
        let rows = normalize_rows(&drafts, &calendar(), date(2025, 3, 1)).unwrap();

        assert_eq!(rows[0].installment_amount, Money::from_major(5_000));
        assert_eq!(rows[0].payment_date, Some(date(2025, 2, 5)));
        assert_eq!(rows[0].instrument.kind.as_deref(), Some("Cheque"));
        assert_eq!(rows[0].instrument.number, None);
        assert_eq!(rows[0].children[0].amount_paid, Money::ZERO);
        assert_eq!(rows[0].children[0].payment_date, None);

        assert_eq!(rows[1].installment_amount, Money::ZERO);
        assert_eq!(rows[1].due_date, date(2025, 3, 1));
    }

    #[test]
    fn test_sequence_validation() {
        assert!(matches!(
            validate_drafts(&[draft(1), draft(1)]),
            Err(LedgerError::DuplicateSequenceNumber { sequence: 1 })
        ));
        assert!(matches!(
            validate_drafts(&[draft(1), draft(0)]),
            Err(LedgerError::MissingSequenceNumber)
        ));
        assert!(validate_drafts(&[draft(2), draft(1)]).is_ok());
    }

    #[test]
    fn test_child_line_validation() {
        let mut row = draft(3);
        row.children = vec![
            ChildDraft { line_no: Some(1), ..ChildDraft::default() },
            ChildDraft { line_no: Some(1), ..ChildDraft::default() },
        ];
        assert!(matches!(
            validate_drafts(&[row.clone()]),
            Err(LedgerError::DuplicateLineNumber { sequence: 3, line: 1 })
        ));

        row.children[1].line_no = None;
        assert!(matches!(
            validate_drafts(&[row]),
            Err(LedgerError::MissingLineNumber { sequence: 3 })
        ));
    }

    #[test]
    fn test_contract_patch() {
        let contract = Contract::new(
            Money::from_major(1_000_000),
            Money::from_major(100_000),
            dec!(10),
            24,
            Some(date(2025, 1, 1)),
        )
        .unwrap();
        let patch = ContractPatch {
            total_amount: Some(AmountInput::from("2,000,000")),
            possession: Some(AmountInput::from("15")),
            possession_due_date: Some(DateInput::from("2026-12-31")),
            ..ContractPatch::default()
        };

        let next = patch.apply(&contract, &calendar()).unwrap();

        assert!(patch.changes_terms());
        assert_eq!(next.total_amount, Money::from_major(2_000_000));
        assert_eq!(next.possession_amount(), Money::from_major(300_000));
        assert_eq!(next.possession.amount, Money::from_major(300_000));
        assert_eq!(next.possession.due_date, Some(date(2026, 12, 31)));
        assert_eq!(next.months, 24);
    }

    #[test]
    fn test_contract_patch_rejects_months() {
        let contract = Contract::new(Money::from_major(1_000), Money::ZERO, dec!(0), 12, None).unwrap();

        for bad in [AmountInput::from(0), AmountInput::from(-3), AmountInput::from("")] {
            let patch = ContractPatch {
                months: Some(bad),
                ..ContractPatch::default()
            };
            let err = patch.apply(&contract, &calendar()).unwrap_err();
            assert!(matches!(err, LedgerError::NonPositiveMonths { .. }));
        }
    }
}
