//! tfplug - Terraform provider framework support for Rust
//!
//! The request-scoped context, state values, diagnostics and resource contract
//! shared by provider crates.

// Core modules
pub mod context;
pub mod error;
pub mod types;

// Provider API modules
pub mod resource;

// Re-exports for convenience
pub use context::{Context, ContextError};
pub use error::{Result, TfplugError};
pub use resource::Resource;
pub use types::{AttributePath, Diagnostic, DiagnosticSeverity, Diagnostics, Dynamic, DynamicValue};
