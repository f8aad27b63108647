use thiserror::Error;

use crate::decimal::Money;
use crate::types::{ChildId, ContractId, RowId};

#[derive(Error, Debug)]
pub enum LedgerError {
    // validation
    #[error("months must be greater than 0, got {months}")]
    NonPositiveMonths {
        months: i64,
    },

    #[error("every row must have a sequence number")]
    MissingSequenceNumber,

    #[error("sequence number {sequence} is not unique")]
    DuplicateSequenceNumber {
        sequence: u32,
    },

    #[error("every child payment of row {sequence} needs a line number")]
    MissingLineNumber {
        sequence: u32,
    },

    #[error("line number {line} is not unique within row {sequence}")]
    DuplicateLineNumber {
        sequence: u32,
        line: u32,
    },

    #[error("invalid amount for {field}: {value:?}")]
    InvalidAmount {
        field: String,
        value: String,
    },

    #[error("negative amount for {field}: {amount}")]
    NegativeAmount {
        field: String,
        amount: Money,
    },

    #[error("unsupported payment proof type: {content_type}")]
    UnsupportedProofType {
        content_type: String,
    },

    #[error("payment proof too large: {size} bytes exceeds limit {limit}")]
    ProofTooLarge {
        size: usize,
        limit: usize,
    },

    #[error("payment proof is empty")]
    EmptyProof,

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    // not found
    #[error("contract not found: {id}")]
    ContractNotFound {
        id: ContractId,
    },

    #[error("ledger row not found: {id}")]
    RowNotFound {
        id: RowId,
    },

    #[error("no ledger row with sequence number {sequence}")]
    SequenceNotFound {
        sequence: u32,
    },

    #[error("child payment not found: {id}")]
    ChildNotFound {
        id: ChildId,
    },

    #[error("ledger row {row} does not belong to contract {contract}")]
    RowNotInContract {
        row: RowId,
        contract: ContractId,
    },

    // collaborators
    #[error("storage error: {message}")]
    Storage {
        message: String,
    },

    #[error("file store error: {message}")]
    FileStore {
        message: String,
    },

    #[error("statement render error: {message}")]
    Render {
        message: String,
    },
}

impl LedgerError {
    /// rejected input, nothing was persisted
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::NonPositiveMonths { .. }
                | LedgerError::MissingSequenceNumber
                | LedgerError::DuplicateSequenceNumber { .. }
                | LedgerError::MissingLineNumber { .. }
                | LedgerError::DuplicateLineNumber { .. }
                | LedgerError::InvalidAmount { .. }
                | LedgerError::NegativeAmount { .. }
                | LedgerError::UnsupportedProofType { .. }
                | LedgerError::ProofTooLarge { .. }
                | LedgerError::EmptyProof
                | LedgerError::InvalidConfiguration { .. }
        )
    }

    /// referenced contract, row, or child does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::ContractNotFound { .. }
                | LedgerError::RowNotFound { .. }
                | LedgerError::SequenceNotFound { .. }
                | LedgerError::ChildNotFound { .. }
                | LedgerError::RowNotInContract { .. }
        )
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::InvalidConfiguration {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
