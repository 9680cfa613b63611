//! Validation functionality
//!
//! Checks that a record and the map of its mapper fit together before the
//! record is used against storage:
//! - relations point at declared entries
//! - primary keys have relations
//! - foreign keys link declared entries on both sides

pub mod mapping;

pub use mapping::{MappingIssue, MappingValidationResult, MappingValidator};
