//! Backend implementations for different execution contexts
//!
//! Only local execution is provided. Other contexts (containers, remote
//! hosts) are reached by running their CLIs locally, e.g. `docker` or `aws`.

pub mod local;
pub use local::LocalLauncher;
