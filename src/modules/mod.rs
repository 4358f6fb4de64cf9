//! Execution modules for AEM web console administration

pub mod aem;
pub mod error;
pub mod interface;
pub mod registry;

// Re-export commonly used types
pub use error::*;
pub use interface::*;
pub use registry::ModuleRegistry;
