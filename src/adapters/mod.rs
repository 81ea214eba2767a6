pub mod middleware;

/// Re-export commonly used types from adapters
pub use middleware::*;
