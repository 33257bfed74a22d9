//! Prompts for the ReAct agent and LLM classification.
//!
//! Documents are cut to an excerpt before they are placed in a prompt. Tools
//! still search the full document text.

use warden_core::evidence::truncate_chars;
use warden_core::ScenarioRegistry;

/// Characters of a scenario description shown in the classification prompt.
const DESCRIPTION_CHARS: usize = 100;

/// Tools the ReAct agent may call.
pub const TOOLS_DESCRIPTION: &str = r#"Available Tools:
1. search_evidence(query) - Search the article for evidence related to keywords
2. check_threshold(value, limit) - Check if a percentage exceeds a limit

To use a tool, respond with:
Action: tool_name
Input: your input"#;

/// Opening prompt for one question.
pub fn question_prompt(question: &str, document: &str, excerpt_chars: usize) -> String {
    format!(
        r#"You are a compliance analyst. Answer this question about the article.

QUESTION: {question}

ARTICLE (excerpt):
{excerpt}

{tools}

Think step-by-step:
1. What evidence do I need to find?
2. Use search_evidence to find relevant quotes
3. If the question mentions a percentage threshold, use check_threshold
4. Based on evidence, answer YES or NO

Format:
Thought: [your reasoning]
Action: [tool name or "answer"]
Input: [tool input or your YES/NO answer with explanation]

Begin:
Thought:"#,
        question = question,
        excerpt = truncate_chars(document, excerpt_chars),
        tools = TOOLS_DESCRIPTION,
    )
}

/// Follow-up turn carrying a tool result.
pub fn observation_turn(observation: &str) -> String {
    format!("Observation: {}\nThought:", observation)
}

/// Ask the model to pick a scenario when no keywords matched.
pub fn classification_prompt(
    registry: &ScenarioRegistry,
    document: &str,
    excerpt_chars: usize,
) -> String {
    let scenarios = registry
        .iter()
        .map(|s| {
            format!(
                "- {}: {} - {}",
                s.id,
                s.name,
                truncate_chars(&s.description, DESCRIPTION_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Classify this article into one of the compliance scenarios.

AVAILABLE SCENARIOS:
{scenarios}

ARTICLE:
{excerpt}

Respond with ONLY the scenario_id (e.g., "cannabis_business") or "none" if no match.

SCENARIO:"#,
        scenarios = scenarios,
        excerpt = truncate_chars(document, excerpt_chars),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Scenario;

    #[test]
    fn test_question_prompt_truncates_document() {
        let document = "x".repeat(5000);
        let prompt = question_prompt("Is the client a dispensary?", &document, 2000);
        assert!(prompt.contains("QUESTION: Is the client a dispensary?"));
        assert!(prompt.contains(&"x".repeat(2000)));
        assert!(!prompt.contains(&"x".repeat(2001)));
        assert!(prompt.contains("search_evidence(query)"));
        assert!(prompt.ends_with("Thought:"));
    }

    #[test]
    fn test_classification_prompt_lists_scenarios() {
        let scenario = Scenario::from_yaml(&format!(
            "id: art_dealing\nname: Art Dealing\ndescription: \"{}\"\nquestions:\n  Q1:\n    text: \"Is the client an art dealer?\"\n",
            "d".repeat(150)
        ))
        .unwrap();
        let registry = ScenarioRegistry::from_scenarios(vec![scenario]).unwrap();

        let prompt = classification_prompt(&registry, "Gallery opens in Basel.", 2000);
        assert!(prompt.contains(&format!("- art_dealing: Art Dealing - {}", "d".repeat(100))));
        assert!(!prompt.contains(&"d".repeat(101)));
        assert!(prompt.contains("Gallery opens in Basel."));
        assert!(prompt.ends_with("SCENARIO:"));
    }

    #[test]
    fn test_observation_turn() {
        assert_eq!(
            observation_turn("NO EVIDENCE FOUND for this query."),
            "Observation: NO EVIDENCE FOUND for this query.\nThought:"
        );
    }
}
