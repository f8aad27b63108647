use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DateOnly;
use crate::decimal::Money;
use crate::types::{ChildId, ContractId, RowId};

/// all events that can be emitted by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // surcharge events
    BalanceBaseFrozen {
        contract_id: ContractId,
        item: String,
        balance_base: Money,
        as_of: DateOnly,
    },
    SurchargeCycleLocked {
        contract_id: ContractId,
        item: String,
        cycle: u32,
        base: Money,
        amount: Money,
        days_late: u32,
        as_of: DateOnly,
    },

    // schedule events
    ScheduleRebuilt {
        contract_id: ContractId,
        months: u32,
        monthly_pool: Money,
        preserved_rows: usize,
        created_rows: usize,
        dropped_rows: usize,
    },
    RowDropped {
        contract_id: ContractId,
        row_id: RowId,
        sequence: u32,
        had_payments: bool,
    },

    // save events
    ContractTermsUpdated {
        contract_id: ContractId,
        total_amount: Money,
        down_payment: Money,
        possession_amount: Money,
        months: u32,
    },
    LedgerSaved {
        contract_id: ContractId,
        rows_created: usize,
        rows_updated: usize,
        rows_deleted: usize,
        children_created: usize,
        children_updated: usize,
        children_deleted: usize,
        timestamp: DateTime<Utc>,
    },

    // proof events
    ProofAttached {
        contract_id: ContractId,
        row_id: Option<RowId>,
        child_id: Option<ChildId>,
        reference: String,
        replaced: Option<String>,
    },
    ProofRemoved {
        contract_id: ContractId,
        row_id: Option<RowId>,
        child_id: Option<ChildId>,
        reference: String,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// locked cycles only
    pub fn surcharge_locks(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::SurchargeCycleLocked { .. }))
    }
}
