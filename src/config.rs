use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::errors::{LedgerError, Result};
use crate::types::TotalDuePolicy;

/// ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub surcharge: SurchargeConfig,
    pub calendar: CalendarConfig,
    pub proofs: ProofPolicy,
    #[serde(default)]
    pub total_due_policy: TotalDuePolicy,
}

/// late-payment surcharge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurchargeConfig {
    /// applied once per completed cycle
    pub percentage: Rate,
    /// length of one late cycle
    pub cycle_length_days: u32,
}

/// business calendar settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// fixed local offset east of UTC, in minutes
    pub utc_offset_minutes: i32,
}

/// accepted payment proof uploads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofPolicy {
    pub max_bytes: usize,
    pub allowed_content_types: Vec<String>,
    /// public path prefix for stored proofs
    pub public_prefix: String,
}

impl Default for SurchargeConfig {
    fn default() -> Self {
        Self {
            percentage: Rate::from_percentage(5),
            cycle_length_days: 30,
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        // Asia/Karachi, no daylight saving
        Self {
            utc_offset_minutes: 5 * 60,
        }
    }
}

impl Default for ProofPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 12 * 1024 * 1024,
            allowed_content_types: [
                "image/png",
                "image/jpeg",
                "image/jpg",
                "image/webp",
                "application/pdf",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            public_prefix: "/uploads/payment-proofs".to_string(),
        }
    }
}

impl ProofPolicy {
    pub fn allows(&self, content_type: &str) -> bool {
        let wanted = content_type.trim().to_ascii_lowercase();
        self.allowed_content_types.iter().any(|t| *t == wanted)
    }

    /// file extension for a stored proof, falling back to the content type
    pub fn extension_for(&self, file_name: &str, content_type: &str) -> &'static str {
        const ALLOWED: [&str; 5] = [".png", ".jpg", ".jpeg", ".webp", ".pdf"];

        let from_name = file_name
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{}", ext.to_ascii_lowercase()));
        if let Some(ext) = from_name {
            if let Some(found) = ALLOWED.iter().find(|a| **a == ext) {
                return *found;
            }
        }

        match content_type.trim().to_ascii_lowercase().as_str() {
            "application/pdf" => ".pdf",
            "image/jpeg" | "image/jpg" => ".jpg",
            "image/webp" => ".webp",
            _ => ".png",
        }
    }
}

impl LedgerConfig {
    /// the standard product settings: 5% every 30 days, balance-only total due
    pub fn standard() -> Self {
        Self {
            surcharge: SurchargeConfig::default(),
            calendar: CalendarConfig::default(),
            proofs: ProofPolicy::default(),
            total_due_policy: TotalDuePolicy::ReceivableOnly,
        }
    }

    /// load from json and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LedgerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.surcharge.cycle_length_days == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "surcharge cycle length must be at least one day".to_string(),
            });
        }
        if self.surcharge.percentage.is_negative() {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("surcharge percentage is negative: {}", self.surcharge.percentage),
            });
        }
        if self.calendar.utc_offset_minutes.abs() >= 18 * 60 {
            return Err(LedgerError::InvalidConfiguration {
                message: format!(
                    "utc offset out of range: {} minutes",
                    self.calendar.utc_offset_minutes
                ),
            });
        }
        if self.proofs.max_bytes == 0 {
            return Err(LedgerError::InvalidConfiguration {
                message: "proof size limit must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::standard()
    }
}
