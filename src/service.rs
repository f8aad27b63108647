use std::collections::HashMap;

use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::calendar::{BusinessCalendar, DateOnly};
use crate::config::LedgerConfig;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::{BillingRow, ChildPayment, Contract, LedgerSnapshot};
use crate::payments::schedule::ScheduleGenerator;
use crate::sanitize::{normalize_rows, validate_drafts, ChildUpdate, ContractPatch, RowDraft, RowUpdate};
use crate::statement::{LedgerView, Statement};
use crate::storage::{FileStore, LedgerStore, ProofUpload, StatementRenderer};
use crate::surcharge::SurchargeEngine;
use crate::types::{ChildId, ContractId, ProofTarget, RowId};

/// one save from the ledger screen
///
/// `rows` is the full row set: stored rows missing from it are deleted.
/// When `rows` is absent the stored rows are kept. A patch that changes the
/// contract terms regenerates the schedule either way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveRequest {
    pub contract: Option<ContractPatch>,
    pub rows: Option<Vec<RowDraft>>,
}

impl SaveRequest {
    pub fn rows(rows: Vec<RowDraft>) -> Self {
        Self {
            contract: None,
            rows: Some(rows),
        }
    }

    pub fn header(patch: ContractPatch) -> Self {
        Self {
            contract: Some(patch),
            rows: None,
        }
    }
}

#[derive(Debug, Default)]
struct SaveCounts {
    rows_created: usize,
    rows_updated: usize,
    rows_deleted: usize,
    children_created: usize,
    children_updated: usize,
    children_deleted: usize,
}

struct ProofSlot<'a> {
    proof: &'a mut Option<String>,
    row_id: Option<RowId>,
    child_id: Option<ChildId>,
}

/// the ledger's entry point: every mutation runs the full reconciliation
pub struct LedgerService<S: LedgerStore, F: FileStore> {
    pub config: LedgerConfig,
    store: S,
    files: F,
    engine: SurchargeEngine,
    calendar: BusinessCalendar,
    events: EventStore,
}

impl<S: LedgerStore, F: FileStore> LedgerService<S, F> {
    pub fn new(config: LedgerConfig, store: S, files: F) -> Result<Self> {
        config.validate()?;
        let calendar = BusinessCalendar::from_config(&config.calendar)?;
        let engine = SurchargeEngine::new(config.surcharge.clone());
        Ok(Self {
            config,
            store,
            files,
            engine,
            calendar,
            events: EventStore::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    /// generate the schedule for a new contract and store it
    pub fn open_contract(&mut self, mut contract: Contract, time: &SafeTimeProvider) -> Result<LedgerView> {
        contract.validate()?;
        let today = self.calendar.today(time);
        pin_start(&mut contract, &[], today);
        let outcome = ScheduleGenerator::rebuild(&contract, Vec::new(), today, &mut self.events)?;

        let mut snapshot = LedgerSnapshot::new(contract, outcome.rows);
        self.relock(&mut snapshot, today);
        self.store.commit(snapshot.clone())?;

        info!(contract = %snapshot.contract.id, rows = snapshot.rows.len(), "contract opened");
        Ok(self.view(snapshot))
    }

    pub fn load(&self, contract_id: ContractId) -> Result<LedgerView> {
        let snapshot = self.store.load(contract_id)?;
        Ok(self.view(snapshot))
    }

    /// validate, apply edits, relock surcharge on every row, commit
    ///
    /// Any error leaves storage untouched.
    pub fn save(
        &mut self,
        contract_id: ContractId,
        request: SaveRequest,
        time: &SafeTimeProvider,
    ) -> Result<LedgerView> {
        let today = self.calendar.today(time);

        if let Some(rows) = &request.rows {
            validate_drafts(rows)?;
        }
        if let Some(patch) = &request.contract {
            patch.months()?;
        }
        let updates = match &request.rows {
            Some(rows) => Some(normalize_rows(rows, &self.calendar, today)?),
            None => None,
        };

        let snapshot = self.store.load(contract_id)?;

        let mut contract = match &request.contract {
            Some(patch) => patch.apply(&snapshot.contract, &self.calendar)?,
            None => snapshot.contract.clone(),
        };
        let terms_changed = request.contract.as_ref().map(|p| p.changes_terms()).unwrap_or(false);

        let mut counts = SaveCounts::default();
        let mut rows = match updates {
            Some(updates) => merge_rows(snapshot.rows, updates, &mut counts)?,
            None => snapshot.rows,
        };

        // new terms mean a new schedule; payment history rides along by sequence number
        if terms_changed {
            pin_start(&mut contract, &rows, today);
            rows = ScheduleGenerator::rebuild(&contract, rows, today, &mut self.events)?.rows;
        }

        let mut next = LedgerSnapshot::new(contract, rows);
        self.relock(&mut next, today);
        self.store.commit(next.clone())?;

        if terms_changed {
            self.events.emit(Event::ContractTermsUpdated {
                contract_id,
                total_amount: next.contract.total_amount,
                down_payment: next.contract.down_payment,
                possession_amount: next.contract.possession_amount(),
                months: next.contract.months,
            });
        }
        self.events.emit(Event::LedgerSaved {
            contract_id,
            rows_created: counts.rows_created,
            rows_updated: counts.rows_updated,
            rows_deleted: counts.rows_deleted,
            children_created: counts.children_created,
            children_updated: counts.children_updated,
            children_deleted: counts.children_deleted,
            timestamp: time.now(),
        });

        info!(
            contract = %contract_id,
            today = %today,
            rows_created = counts.rows_created,
            rows_updated = counts.rows_updated,
            rows_deleted = counts.rows_deleted,
            "ledger saved"
        );

        Ok(self.view(next))
    }

    /// regenerate rows from the header terms, keeping payment history
    pub fn rebuild_schedule(&mut self, contract_id: ContractId, time: &SafeTimeProvider) -> Result<LedgerView> {
        let today = self.calendar.today(time);
        let snapshot = self.store.load(contract_id)?;
        let mut contract = snapshot.contract;
        pin_start(&mut contract, &snapshot.rows, today);

        let outcome = ScheduleGenerator::rebuild(&contract, snapshot.rows, today, &mut self.events)?;

        let mut next = LedgerSnapshot::new(contract, outcome.rows);
        self.relock(&mut next, today);
        self.store.commit(next.clone())?;
        Ok(self.view(next))
    }

    /// store a proof and point the target at it, replacing any previous proof
    pub fn attach_proof(
        &mut self,
        contract_id: ContractId,
        target: ProofTarget,
        upload: ProofUpload,
    ) -> Result<String> {
        let policy = &self.config.proofs;
        if upload.bytes.is_empty() {
            return Err(LedgerError::EmptyProof);
        }
        if !policy.allows(&upload.content_type) {
            return Err(LedgerError::UnsupportedProofType {
                content_type: upload.content_type.clone(),
            });
        }
        if upload.size() > policy.max_bytes {
            return Err(LedgerError::ProofTooLarge {
                size: upload.size(),
                limit: policy.max_bytes,
            });
        }

        let mut snapshot = self.store.load(contract_id)?;
        let slot = proof_slot(&mut snapshot, target)?;

        let reference = self.files.put(contract_id, &upload)?;
        let replaced = slot.proof.replace(reference.clone());
        let (row_id, child_id) = (slot.row_id, slot.child_id);

        if let Err(e) = self.store.commit(snapshot) {
            if let Err(cleanup) = self.files.remove(&reference) {
                warn!(contract = %contract_id, reference = %reference, error = %cleanup, "could not remove orphaned proof");
            }
            return Err(e);
        }

        if let Some(old) = &replaced {
            if let Err(e) = self.files.remove(old) {
                warn!(contract = %contract_id, reference = %old, error = %e, "could not remove replaced proof");
            }
        }

        info!(contract = %contract_id, reference = %reference, "payment proof attached");
        self.events.emit(Event::ProofAttached {
            contract_id,
            row_id,
            child_id,
            reference: reference.clone(),
            replaced,
        });
        Ok(reference)
    }

    /// clear the target's proof; returns the removed reference
    pub fn remove_proof(&mut self, contract_id: ContractId, target: ProofTarget) -> Result<Option<String>> {
        let mut snapshot = self.store.load(contract_id)?;
        let slot = proof_slot(&mut snapshot, target)?;

        let Some(reference) = slot.proof.take() else {
            return Ok(None);
        };
        let (row_id, child_id) = (slot.row_id, slot.child_id);

        self.store.commit(snapshot)?;

        if let Err(e) = self.files.remove(&reference) {
            warn!(contract = %contract_id, reference = %reference, error = %e, "proof file already gone");
        }

        self.events.emit(Event::ProofRemoved {
            contract_id,
            row_id,
            child_id,
            reference: reference.clone(),
        });
        Ok(Some(reference))
    }

    /// statement as of the business date of `time`
    pub fn statement(&self, contract_id: ContractId, time: &SafeTimeProvider) -> Result<Statement> {
        let snapshot = self.store.load(contract_id)?;
        let today = self.calendar.today(time);
        Ok(Statement::build(
            &snapshot.contract,
            &snapshot.rows,
            &snapshot.contract.possession,
            today,
            &self.config,
        ))
    }

    pub fn render_statement<R: StatementRenderer>(
        &self,
        contract_id: ContractId,
        time: &SafeTimeProvider,
        renderer: &R,
    ) -> Result<Vec<u8>> {
        let statement = self.statement(contract_id, time)?;
        renderer.render(&statement)
    }

    fn relock(&mut self, snapshot: &mut LedgerSnapshot, today: DateOnly) {
        let contract_id = snapshot.contract.id;
        for row in &mut snapshot.rows {
            self.engine.lock(contract_id, row, today, &mut self.events);
        }
        self.engine
            .lock(contract_id, &mut snapshot.contract.possession, today, &mut self.events);
    }

    fn view(&self, snapshot: LedgerSnapshot) -> LedgerView {
        LedgerView::new(snapshot.contract, snapshot.rows, self.config.total_due_policy)
    }
}

/// fix the schedule anchor once, so later rebuilds never move due dates
fn pin_start(contract: &mut Contract, rows: &[BillingRow], today: DateOnly) {
    if contract.start_date.is_none() {
        let first_due = rows.iter().min_by_key(|r| r.sequence).map(|r| r.due_date);
        contract.start_date = Some(first_due.unwrap_or(today));
    }
}

fn proof_slot(snapshot: &mut LedgerSnapshot, target: ProofTarget) -> Result<ProofSlot<'_>> {
    let contract_id = snapshot.contract.id;
    match target {
        ProofTarget::Possession => Ok(ProofSlot {
            proof: &mut snapshot.contract.possession.payment_proof,
            row_id: None,
            child_id: None,
        }),
        ProofTarget::Row(id) => {
            let row = snapshot
                .rows
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(LedgerError::RowNotInContract {
                    row: id,
                    contract: contract_id,
                })?;
            Ok(ProofSlot {
                row_id: Some(row.id),
                child_id: None,
                proof: &mut row.payment_proof,
            })
        }
        ProofTarget::Sequence(sequence) => {
            let row = snapshot
                .rows
                .iter_mut()
                .find(|r| r.sequence == sequence)
                .ok_or(LedgerError::SequenceNotFound { sequence })?;
            Ok(ProofSlot {
                row_id: Some(row.id),
                child_id: None,
                proof: &mut row.payment_proof,
            })
        }
        ProofTarget::Child(id) => snapshot
            .rows
            .iter_mut()
            .find_map(|row| {
                let row_id = row.id;
                row.child_mut(id).map(|child| ProofSlot {
                    proof: &mut child.payment_proof,
                    row_id: Some(row_id),
                    child_id: Some(id),
                })
            })
            .ok_or(LedgerError::ChildNotFound { id }),
    }
}

/// diff submitted rows against stored rows by id
fn merge_rows(existing: Vec<BillingRow>, updates: Vec<RowUpdate>, counts: &mut SaveCounts) -> Result<Vec<BillingRow>> {
    let mut by_id: HashMap<RowId, BillingRow> = existing.into_iter().map(|r| (r.id, r)).collect();
    let mut merged = Vec::with_capacity(updates.len());

    for update in updates {
        let mut row = match update.id {
            Some(id) => {
                counts.rows_updated += 1;
                by_id.remove(&id).ok_or(LedgerError::RowNotFound { id })?
            }
            None => {
                counts.rows_created += 1;
                BillingRow::new(
                    update.sequence,
                    update.description.clone(),
                    update.installment_amount,
                    update.due_date,
                )
            }
        };

        row.sequence = update.sequence;
        row.description = update.description;
        row.installment_amount = update.installment_amount;
        row.due_date = update.due_date;
        row.amount_paid = update.amount_paid;
        row.payment_date = update.payment_date;
        row.instrument = update.instrument;
        // proofs are managed by attach/remove; a blank field keeps the stored one
        if update.payment_proof.is_some() {
            row.payment_proof = update.payment_proof;
        }
        row.children = merge_children(std::mem::take(&mut row.children), update.children, counts)?;

        merged.push(row);
    }

    for row in by_id.values() {
        counts.rows_deleted += 1;
        counts.children_deleted += row.children.len();
    }
    Ok(merged)
}

fn merge_children(
    existing: Vec<ChildPayment>,
    updates: Vec<ChildUpdate>,
    counts: &mut SaveCounts,
) -> Result<Vec<ChildPayment>> {
    let mut by_id: HashMap<ChildId, ChildPayment> = existing.into_iter().map(|c| (c.id, c)).collect();
    let mut merged = Vec::with_capacity(updates.len());

    for update in updates {
        let mut child = match update.id {
            Some(id) => {
                counts.children_updated += 1;
                by_id.remove(&id).ok_or(LedgerError::ChildNotFound { id })?
            }
            None => {
                counts.children_created += 1;
                ChildPayment::new(update.line, update.amount_paid, update.payment_date)
            }
        };

        child.line = update.line;
        child.description = update.description;
        child.amount_paid = update.amount_paid;
        child.payment_date = update.payment_date;
        child.instrument = update.instrument;
        if update.payment_proof.is_some() {
            child.payment_proof = update.payment_proof;
        }
        merged.push(child);
    }

    counts.children_deleted += by_id.len();
    Ok(merged)
}
