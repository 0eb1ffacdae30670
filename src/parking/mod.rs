pub mod context;
pub mod cycle;
pub mod guidance;
pub mod report;
pub mod types;
pub mod uncertainty;

// Re-export commonly used types and functions for convenience
pub use context::*;
pub use cycle::*;
pub use guidance::*;
pub use report::*;
pub use types::*;
pub use uncertainty::*;
