//! Scenario definitions and the scenario registry.
//!
//! A scenario is a named compliance risk category with its own decision tree.
//! Scenario files are YAML or JSON, validated against JSON Schema and then
//! checked structurally (edges resolve, no cycles).

mod parser;
mod registry;
mod schema;

pub use parser::{derive_keywords, DecisionTree, QuestionNode, Scenario, ScenarioError};
pub use registry::ScenarioRegistry;
pub use schema::{is_valid_scenario, validate_scenario_schema};
