pub mod calendar;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod payments;
pub mod sanitize;
pub mod service;
pub mod statement;
pub mod storage;
pub mod surcharge;
pub mod types;

// re-export key types
pub use calendar::{BusinessCalendar, DateInput, DateOnly};
pub use config::{CalendarConfig, LedgerConfig, ProofPolicy, SurchargeConfig};
pub use decimal::{Money, Rate};
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore};
pub use ledger::{
    BillingRow, Chargeable, ChildPayment, Contract, LedgerSnapshot, PossessionCharge,
    SurchargeLockState,
};
pub use payments::{PaymentSummary, RebuildOutcome, ScheduleGenerator, ScheduledInstallment};
pub use sanitize::{AmountInput, ChildDraft, ContractPatch, RowDraft};
pub use service::{LedgerService, SaveRequest};
pub use statement::{JsonStatementRenderer, LedgerTotals, LedgerView, Statement, StatementLine};
pub use storage::{
    FileStore, InMemoryFileStore, InMemoryLedgerStore, LedgerStore, ProofUpload, StatementRenderer,
};
pub use surcharge::{SkipReason, SurchargeBlock, SurchargeEngine, SurchargeEvaluation};
pub use types::{
    ChildId, ContractId, PaymentInstrument, ProofTarget, RowId, RowStanding, TotalDuePolicy,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
