pub mod contract;
pub mod row;

use serde::{Deserialize, Serialize};

pub use contract::{Contract, PossessionCharge};
pub use row::{BillingRow, Chargeable, ChildPayment, PaymentEntry, SurchargeLockState};

/// a contract with its full row set, as read from and written to storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub contract: Contract,
    pub rows: Vec<BillingRow>,
}

impl LedgerSnapshot {
    pub fn new(contract: Contract, rows: Vec<BillingRow>) -> Self {
        let mut snapshot = Self { contract, rows };
        snapshot.sort();
        snapshot
    }

    /// rows by sequence number, children by line number
    pub fn sort(&mut self) {
        self.rows.sort_by_key(|r| r.sequence);
        for row in &mut self.rows {
            row.children.sort_by_key(|c| c.line);
        }
    }
}
