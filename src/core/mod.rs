// Public modules
pub mod dockerfile;
pub mod error;
pub mod executor;
pub mod package;
pub mod project;
pub mod push;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
