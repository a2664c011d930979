// src/utils/mod.rs
pub mod diagnostics;
pub mod error;
pub mod logging;

pub use diagnostics::DiagnosticStore;
pub use error::AppError; // Re-export main error type for convenience
