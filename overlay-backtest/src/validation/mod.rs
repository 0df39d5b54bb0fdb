//! Validation module for raw chain input.
//!
//! Checks value ranges and chain structure before a run.

pub mod data_integrity;

pub use data_integrity::{
    CheckResult, DataIntegrityReport, DataIntegrityValidator, ValidationError, ValidationResult,
};
