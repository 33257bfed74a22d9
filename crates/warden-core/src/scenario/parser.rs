//! Scenario parsing from YAML/JSON.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_scenario_schema;
use crate::types::NodeId;

lazy_static! {
    /// Classification vocabulary used when a scenario declares no keywords.
    static ref KEYWORD_VOCABULARY: Vec<&'static str> = vec![
        // cannabis
        "cannabis", "marijuana", "hemp", "thc", "cbd", "dispensary",
        // art dealing
        "art", "antique", "antiquity", "auction", "gallery", "fine art", "artefact",
        // commodity trading
        "commodity", "trading", "energy", "metals", "agricultural", "oil", "gas",
    ];
}

/// Errors that can occur when loading scenarios.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Failed to read scenario file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Scenario does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Scenario validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Duplicate scenario id: {0}")]
    DuplicateScenario(String),

    #[error("Unsupported scenario file: {0}")]
    UnsupportedFormat(String),
}

/// One yes/no question in a decision tree.
///
/// `None` on either edge means the tree is terminal on that branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionNode {
    /// Node id; filled from the map key when loading
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: NodeId,

    /// The question text
    pub text: String,

    #[serde(default)]
    pub next_if_yes: Option<NodeId>,

    #[serde(default)]
    pub next_if_no: Option<NodeId>,

    /// Documents that would resolve this question if it cannot be answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<String>,
}

impl QuestionNode {
    pub fn new(
        id: impl Into<NodeId>,
        text: impl Into<String>,
        next_if_yes: Option<&str>,
        next_if_no: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            next_if_yes: next_if_yes.map(str::to_string),
            next_if_no: next_if_no.map(str::to_string),
            documents: None,
        }
    }

    /// Attach the documents that would resolve this question.
    pub fn with_documents(mut self, documents: impl Into<String>) -> Self {
        self.documents = Some(documents.into());
        self
    }

    /// The edge to follow for an answer.
    pub fn next(&self, answer: bool) -> Option<&str> {
        if answer {
            self.next_if_yes.as_deref()
        } else {
            self.next_if_no.as_deref()
        }
    }

    fn edges(&self) -> impl Iterator<Item = &str> {
        [self.next_if_yes.as_deref(), self.next_if_no.as_deref()]
            .into_iter()
            .flatten()
    }
}

/// Mapping of node id to question node.
pub type DecisionTree = BTreeMap<NodeId, QuestionNode>;

fn default_start() -> NodeId {
    "Q1".to_string()
}

/// A compliance scenario with its decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario id (defaults to the file stem)
    #[serde(default)]
    pub id: String,

    /// Human-readable name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Classification keywords; derived from name and description when empty
    #[serde(default)]
    pub keywords: BTreeSet<String>,

    /// Start node
    #[serde(default = "default_start")]
    pub start: NodeId,

    /// The decision tree
    pub questions: DecisionTree,
}

impl Scenario {
    /// Parse a scenario from a YAML string. The document must carry an `id`.
    pub fn from_yaml(yaml: &str) -> Result<Self, ScenarioError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value, None)
    }

    /// Parse a scenario from a JSON string. The document must carry an `id`.
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value, None)
    }

    /// Load a scenario file. The file stem is used as id when the file has none.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let stem = path.file_stem().and_then(|s| s.to_str());

        let value: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            Some("json") => serde_json::from_str(&contents)?,
            _ => {
                return Err(ScenarioError::UnsupportedFormat(
                    path.display().to_string(),
                ))
            }
        };

        Self::from_value(value, stem)
    }

    /// Build a scenario from a parsed document.
    fn from_value(
        value: serde_json::Value,
        fallback_id: Option<&str>,
    ) -> Result<Self, ScenarioError> {
        validate_scenario_schema(&value).map_err(ScenarioError::SchemaError)?;

        let mut scenario: Scenario = serde_json::from_value(value)?;
        if scenario.id.is_empty() {
            match fallback_id {
                Some(id) => scenario.id = id.to_string(),
                None => return Err(ScenarioError::MissingField("id".to_string())),
            }
        }

        scenario.prepare();
        scenario.validate()?;
        Ok(scenario)
    }

    /// Fill node ids from map keys and derive keywords if none were declared.
    fn prepare(&mut self) {
        for (id, node) in self.questions.iter_mut() {
            node.id = id.clone();
        }

        if self.keywords.is_empty() {
            self.keywords = derive_keywords(&self.name, &self.description);
        } else {
            self.keywords = self.keywords.iter().map(|k| k.to_lowercase()).collect();
        }
    }

    /// Validate the scenario structure.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.name.trim().is_empty() {
            return Err(ScenarioError::MissingField("name".to_string()));
        }

        if self.questions.is_empty() {
            return Err(ScenarioError::ValidationError(format!(
                "Scenario '{}' has no questions",
                self.id
            )));
        }

        if !self.questions.contains_key(&self.start) {
            return Err(ScenarioError::ValidationError(format!(
                "Start node '{}' is not defined",
                self.start
            )));
        }

        for (id, node) in &self.questions {
            if node.text.trim().is_empty() {
                return Err(ScenarioError::MissingField(format!("questions.{}.text", id)));
            }
            for target in node.edges() {
                if !self.questions.contains_key(target) {
                    return Err(ScenarioError::ValidationError(format!(
                        "Node '{}' points to undefined node '{}'",
                        id, target
                    )));
                }
            }
        }

        if let Some(node) = self.find_cycle() {
            return Err(ScenarioError::ValidationError(format!(
                "Decision tree contains a cycle through node '{}'",
                node
            )));
        }

        Ok(())
    }

    /// Find a node that lies on a cycle, if any.
    fn find_cycle(&self) -> Option<&str> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            tree: &'a DecisionTree,
            id: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Option<&'a str> {
            match marks.get(id) {
                Some(Mark::Visiting) => return Some(id),
                Some(Mark::Done) => return None,
                None => {}
            }

            marks.insert(id, Mark::Visiting);
            if let Some(node) = tree.get(id) {
                for next in node.edges() {
                    if let Some(found) = visit(tree, next, marks) {
                        return Some(found);
                    }
                }
            }
            marks.insert(id, Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        self.questions
            .keys()
            .find_map(|id| visit(&self.questions, id.as_str(), &mut marks))
    }

    /// Look up a question node.
    pub fn question(&self, id: &str) -> Option<&QuestionNode> {
        self.questions.get(id)
    }

    /// The decision tree.
    pub fn tree(&self) -> &DecisionTree {
        &self.questions
    }

    /// The start node id.
    pub fn start_node(&self) -> &str {
        &self.start
    }
}

/// Derive classification keywords from a scenario's name and description.
///
/// Collects vocabulary terms found in the text plus every name word longer
/// than three characters.
pub fn derive_keywords(name: &str, description: &str) -> BTreeSet<String> {
    let text = format!("{} {}", name, description).to_lowercase();

    let mut keywords: BTreeSet<String> = KEYWORD_VOCABULARY
        .iter()
        .filter(|term| text.contains(*term))
        .map(|term| term.to_string())
        .collect();

    keywords.extend(
        name.to_lowercase()
            .split_whitespace()
            .filter(|w| w.chars().count() > 3)
            .map(str::to_string),
    );

    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_SCENARIO: &str = r#"
id: cannabis_business
name: "Cannabis Business"
description: "Client derives income from marijuana or hemp activities"
start: Q1
questions:
  Q1:
    text: "Is income from cannabis activities more than 10%?"
    next_if_yes: null
    next_if_no: Q2
  Q2:
    text: "Does the client hold a cultivation licence?"
    documents: "Cultivation licence"
"#;

    #[test]
    fn test_parse_valid_scenario() {
        let scenario = Scenario::from_yaml(VALID_SCENARIO).unwrap();
        assert_eq!(scenario.id, "cannabis_business");
        assert_eq!(scenario.start_node(), "Q1");
        assert_eq!(scenario.tree().len(), 2);

        let q1 = scenario.question("Q1").unwrap();
        assert_eq!(q1.id, "Q1");
        assert_eq!(q1.next(true), None);
        assert_eq!(q1.next(false), Some("Q2"));
        assert_eq!(
            scenario.question("Q2").unwrap().documents.as_deref(),
            Some("Cultivation licence")
        );
    }

    #[test]
    fn test_keywords_derived_when_missing() {
        let scenario = Scenario::from_yaml(VALID_SCENARIO).unwrap();
        assert!(scenario.keywords.contains("cannabis"));
        assert!(scenario.keywords.contains("marijuana"));
        assert!(scenario.keywords.contains("hemp"));
        assert!(scenario.keywords.contains("business"));
    }

    #[test]
    fn test_declared_keywords_are_lowercased() {
        let yaml = r#"
id: art_dealing
name: "Art Dealing"
keywords: ["Gallery", "Auction"]
questions:
  Q1:
    text: "Does the client trade antiquities?"
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        let keywords: Vec<&str> = scenario.keywords.iter().map(String::as_str).collect();
        assert_eq!(keywords, vec!["auction", "gallery"]);
    }

    #[test]
    fn test_missing_id_without_file_stem() {
        let yaml = r#"
name: "No id"
questions:
  Q1:
    text: "Question?"
"#;
        assert!(matches!(
            Scenario::from_yaml(yaml),
            Err(ScenarioError::MissingField(field)) if field == "id"
        ));
    }

    #[test]
    fn test_undefined_start_node() {
        let yaml = r#"
id: broken
name: "Broken"
start: Q9
questions:
  Q1:
    text: "Question?"
"#;
        assert!(matches!(
            Scenario::from_yaml(yaml),
            Err(ScenarioError::ValidationError(_))
        ));
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let yaml = r#"
id: broken
name: "Broken"
questions:
  Q1:
    text: "Question?"
    next_if_yes: Q7
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Q7"));
    }

    #[test]
    fn test_cycle_rejected() {
        let yaml = r#"
id: looping
name: "Looping"
questions:
  Q1:
    text: "First?"
    next_if_no: Q2
  Q2:
    text: "Second?"
    next_if_yes: Q1
"#;
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_shared_subtree_is_not_a_cycle() {
        let yaml = r#"
id: diamond
name: "Diamond"
questions:
  Q1:
    text: "First?"
    next_if_yes: Q2
    next_if_no: Q3
  Q2:
    text: "Second?"
    next_if_yes: Q4
  Q3:
    text: "Third?"
    next_if_no: Q4
  Q4:
    text: "Last?"
"#;
        assert!(Scenario::from_yaml(yaml).is_ok());
    }

    #[test]
    fn test_json_scenario() {
        let json = r#"{
            "id": "commodity_trading",
            "name": "Commodity Trading",
            "description": "Trading of energy and metals",
            "questions": {
                "Q1": {"text": "Does the client trade oil?", "next_if_yes": null, "next_if_no": null}
            }
        }"#;
        let scenario = Scenario::from_json(json).unwrap();
        assert!(scenario.keywords.contains("energy"));
        assert!(scenario.keywords.contains("metals"));
        assert!(scenario.keywords.contains("trading"));
    }

    #[test]
    fn test_derive_keywords_name_words() {
        let keywords = derive_keywords("Tax Haven Exposure", "");
        assert!(keywords.contains("haven"));
        assert!(keywords.contains("exposure"));
        assert!(!keywords.contains("tax"));
    }
}
