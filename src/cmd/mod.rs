//! CLI command implementations.
//!
//! | Module | Commands handled |
//! |--------|------------------|
//! | `run`  | `Run`            |

pub mod run;

pub use run::{RunArgs, cmd_run};
