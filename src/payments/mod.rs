pub mod aggregate;
pub mod schedule;

pub use aggregate::{
    display_balance, effective_paid, effective_payment_date, outstanding_balance, PaymentSummary,
};
pub use schedule::{ordinal_suffix, RebuildOutcome, ScheduleGenerator, ScheduledInstallment};
