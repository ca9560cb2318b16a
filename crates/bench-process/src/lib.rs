//! # Bench Process
//!
//! Low-level process operations used by the node workers:
//! - Spawning a node with piped output streams
//! - Graceful and forced termination
//! - Executable validation

pub mod execute;
pub mod terminate;
pub mod validation;

// Re-export main types
pub use execute::*;
pub use terminate::*;
pub use validation::*;
