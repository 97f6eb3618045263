//! Input validation for workflow definitions
//!
//! Collects every field error before failing so the editor can highlight all of
//! them at once.

use std::collections::HashMap;

use crate::workflows::WorkflowError;

/// Validation result type
pub type ValidationResult<T> = Result<T, WorkflowError>;

/// Validator builder for complex validations
#[derive(Debug, Default)]
pub struct Validator {
    details: HashMap<String, Vec<String>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add error for a field
    pub fn error(mut self, field: &str, message: &str) -> Self {
        self.details
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
        self
    }

    /// Add error if condition is true
    pub fn error_if(self, condition: bool, field: &str, message: &str) -> Self {
        if condition {
            self.error(field, message)
        } else {
            self
        }
    }

    /// Validate required, non-blank string
    pub fn required(self, value: &str, field: &str) -> Self {
        if value.trim().is_empty() {
            let message = format!("{} is required", field);
            self.error(field, &message)
        } else {
            self
        }
    }

    /// Validate max length (in characters)
    pub fn max_length(self, value: &str, field: &str, max: usize) -> Self {
        if value.chars().count() > max {
            let message = format!("{} must be {} characters or less", field, max);
            self.error(field, &message)
        } else {
            self
        }
    }

    /// Validate max length of an optional value
    pub fn max_length_opt(self, value: Option<&str>, field: &str, max: usize) -> Self {
        match value {
            Some(v) => self.max_length(v, field, max),
            None => self,
        }
    }

    /// Validate a number is not negative
    pub fn non_negative(self, value: i64, field: &str) -> Self {
        if value < 0 {
            let message = format!("{} cannot be negative", field);
            self.error(field, &message)
        } else {
            self
        }
    }

    /// Finish validation, returning error if any
    pub fn finish(self) -> ValidationResult<()> {
        if self.details.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Validation {
                details: self.details,
            })
        }
    }
}
