//! Error types, shared with the rest of the workspace through `qm-error`

pub use qm_error::{QuadroError, Result};
