// Library surface for headless/integration tests and reuse.
// Terminal rendering and the CLI live in the binary.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod history;
pub mod launch;
pub mod lights;
pub mod records;
pub mod runtime;
pub mod scheduler;
pub mod session;

pub use error::{Error, Result};
pub use launch::{Controls, LaunchControl, Reaction, TrialState};
