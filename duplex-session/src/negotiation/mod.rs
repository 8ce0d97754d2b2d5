mod negotiation_state;
mod orchestrator;

pub use negotiation_state::*;
pub(crate) use orchestrator::*;
