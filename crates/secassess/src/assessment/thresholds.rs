use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::domain::SecurityLevel;

/// Dual compliance threshold applied at one security level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub individual_minimum: f64,
    pub average_minimum: f64,
}

impl Threshold {
    pub const fn new(individual_minimum: f64, average_minimum: f64) -> Self {
        Self {
            individual_minimum,
            average_minimum,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ThresholdError {
    #[error("{level} threshold {field} must be a finite value within 1..=5, found {value}")]
    OutOfRange {
        level: SecurityLevel,
        field: &'static str,
        value: f64,
    },
    #[error("failed to read thresholds: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid thresholds json: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Versioned lookup from security level to its threshold row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub version: String,
    pub basic: Threshold,
    pub medium: Threshold,
    pub advanced: Threshold,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            version: "default".to_string(),
            basic: Threshold::new(2.0, 2.5),
            medium: Threshold::new(2.5, 3.0),
            advanced: Threshold::new(3.0, 3.5),
        }
    }
}

impl Thresholds {
    pub fn for_level(&self, level: SecurityLevel) -> Threshold {
        match level {
            SecurityLevel::Basic => self.basic,
            SecurityLevel::Medium => self.medium,
            SecurityLevel::Advanced => self.advanced,
        }
    }

    pub fn validate(self) -> Result<Self, ThresholdError> {
        for level in SecurityLevel::ordered() {
            let row = self.for_level(level);
            for (field, value) in [
                ("individual_minimum", row.individual_minimum),
                ("average_minimum", row.average_minimum),
            ] {
                if !value.is_finite() || !(1.0..=5.0).contains(&value) {
                    return Err(ThresholdError::OutOfRange {
                        level,
                        field,
                        value,
                    });
                }
            }
        }
        Ok(self)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ThresholdError> {
        let thresholds: Self = serde_json::from_reader(reader)?;
        thresholds.validate()
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ThresholdError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }
}
