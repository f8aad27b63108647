use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a contract
pub type ContractId = Uuid;

/// unique identifier for a billing row
pub type RowId = Uuid;

/// unique identifier for a child payment
pub type ChildId = Uuid;

/// how a payment was made (cheque, pay order, online transfer...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstrument {
    pub kind: Option<String>,
    pub number: Option<String>,
}

/// standing of a row on a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStanding {
    /// not past due, or paid on time
    Clear,
    /// past due but no surcharge locked yet
    Late,
    /// at least one surcharge cycle locked
    Surcharged,
}

/// which figure the headline "total due" reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TotalDuePolicy {
    /// outstanding balance only, surcharge listed separately
    #[default]
    ReceivableOnly,
    /// outstanding balance plus locked surcharge
    ReceivableWithSurcharge,
}

/// where a payment proof is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofTarget {
    Row(RowId),
    Sequence(u32),
    Child(ChildId),
    Possession,
}
