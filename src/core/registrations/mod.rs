pub mod registration_models;
pub mod validation;

pub use registration_models::{EventDescriptor, FieldDefEntry, Registration};
pub use validation::{validate_custom_fields, validate_submission, ValidationIssue};
