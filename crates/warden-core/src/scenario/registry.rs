//! Registry of loaded scenarios.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::parser::{Scenario, ScenarioError};

/// All scenarios known to the engine, keyed by id.
///
/// Iteration is in id order, which makes classification tie-breaks stable.
#[derive(Debug, Clone, Default)]
pub struct ScenarioRegistry {
    scenarios: BTreeMap<String, Scenario>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from already-parsed scenarios.
    pub fn from_scenarios(
        scenarios: impl IntoIterator<Item = Scenario>,
    ) -> Result<Self, ScenarioError> {
        let mut registry = Self::new();
        for scenario in scenarios {
            registry.insert(scenario)?;
        }
        Ok(registry)
    }

    /// Load every `.yaml`, `.yml` and `.json` file in a directory.
    ///
    /// Files are read in sorted path order. Any invalid file fails the load.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let mut paths: Vec<_> = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml") | Some("json")
                    )
            })
            .collect();
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            let scenario = Scenario::from_file(&path)?;
            tracing::debug!(scenario = %scenario.id, path = %path.display(), "Loaded scenario");
            registry.insert(scenario)?;
        }

        tracing::info!(count = registry.len(), "Scenario registry loaded");
        Ok(registry)
    }

    /// Add a scenario. Duplicate ids are rejected.
    pub fn insert(&mut self, scenario: Scenario) -> Result<(), ScenarioError> {
        if self.scenarios.contains_key(&scenario.id) {
            return Err(ScenarioError::DuplicateScenario(scenario.id));
        }
        self.scenarios.insert(scenario.id.clone(), scenario);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scenario(id: &str) -> Scenario {
        Scenario::from_yaml(&format!(
            "id: {}\nname: \"{}\"\nquestions:\n  Q1:\n    text: \"Question?\"\n",
            id, id
        ))
        .unwrap()
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("warden-registry-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let result = ScenarioRegistry::from_scenarios(vec![scenario("art"), scenario("art")]);
        assert!(matches!(result, Err(ScenarioError::DuplicateScenario(id)) if id == "art"));
    }

    #[test]
    fn test_iteration_in_id_order() {
        let registry = ScenarioRegistry::from_scenarios(vec![
            scenario("zinc"),
            scenario("art"),
            scenario("mining"),
        ])
        .unwrap();
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(ids, vec!["art", "mining", "zinc"]);
    }

    #[test]
    fn test_load_dir_uses_file_stem() {
        let dir = temp_dir("stem");
        fs::write(
            dir.join("art_dealing.yaml"),
            "name: \"Art Dealing\"\nquestions:\n  Q1:\n    text: \"Does the client sell art?\"\n",
        )
        .unwrap();
        fs::write(
            dir.join("commodity.json"),
            r#"{"name": "Commodity", "questions": {"Q1": {"text": "Trades oil?"}}}"#,
        )
        .unwrap();
        fs::write(dir.join("README.md"), "ignored").unwrap();

        let registry = ScenarioRegistry::load_dir(&dir).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("art_dealing").is_some());
        assert!(registry.get("commodity").is_some());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_dir_fails_on_invalid_file() {
        let dir = temp_dir("invalid");
        fs::write(dir.join("broken.yaml"), "name: \"Broken\"\n").unwrap();

        assert!(ScenarioRegistry::load_dir(&dir).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
