//! Equation organization and load-time validation
//!
//! Runs once per model load, ahead of every run. [`organize`] returns the
//! equation lookup only when the whole model is valid; otherwise every
//! error found is returned together.

pub mod organizer;
pub mod validation;

pub use organizer::{Block, EquationIndex, LoadDiagnostic};
pub use validation::{validate_model, ValidationError, ValidationResult};

use crate::eval::FunctionRegistry;
use crate::models::Model;

/// Organize and validate `model`
pub fn organize(
    model: &Model,
    functions: &dyn FunctionRegistry,
) -> Result<EquationIndex, Vec<ValidationError>> {
    let (index, mut errors) = EquationIndex::build(model);
    if let Err(more) = validate_model(model, &index, functions) {
        errors.extend(more);
    }

    if errors.is_empty() {
        Ok(index)
    } else {
        Err(errors)
    }
}
