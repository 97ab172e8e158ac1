//! Signals an agent can emit while it works.
//!
//! - `<progress>50%</progress>` - partial completion markers
//! - `<blocker>Need clarification on X</blocker>` - the run must pause
//!
//! A blocker is the only signal that changes control flow: the engine stops
//! and returns a paused result.

mod parser;
mod types;

pub use parser::{blocker_from_payload, extract_signals};
pub use types::{AgentSignals, BlockerSignal, ProgressSignal};
