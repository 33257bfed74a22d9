//! Answer agents.
//!
//! An agent answers one decision-tree question at a time. [`ReactAgent`]
//! reasons with an LLM and two tools; [`ScorerAgent`] answers from the
//! evidence scorer alone and needs no network.

mod react;
mod scorer;
mod traits;

pub use react::{parse_final_answer, ReactAgent, ReactStep};
pub use scorer::ScorerAgent;
pub use traits::{AgentError, AnswerAgent};
