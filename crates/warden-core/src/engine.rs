//! The decision-tree engine.
//!
//! A case moves through `Classifying → Interrogating(node) → Verdicting → Closed`
//! or `Classifying → Aborted`. The step functions below are the only place
//! case state changes; the blocking [`DecisionTreeEngine::evaluate`] loop and
//! the async runtime loop both drive a case through them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::aggregator::VerdictAggregator;
use crate::classifier::{Classification, ScenarioClassifier};
use crate::evidence::EvidenceScorer;
use crate::router::{ConfidenceRouter, RouteAction, RouterConfig};
use crate::scenario::{QuestionNode, Scenario, ScenarioRegistry};
use crate::types::{
    Answer, AnswerRecord, AnswerSource, Case, CasePhase, Document, MissingFieldRecord,
};
use crate::{AnswererFailure, EngineError};

/// Blocking question-answering capability consumed by the engine.
pub trait QuestionAnswerer {
    /// Answer a yes/no question from the document text.
    fn answer(&self, question: &str, document: &str) -> Result<Answer, AnswererFailure>;
}

impl<F> QuestionAnswerer for F
where
    F: Fn(&str, &str) -> Result<Answer, AnswererFailure>,
{
    fn answer(&self, question: &str, document: &str) -> Result<Answer, AnswererFailure> {
        self(question, document)
    }
}

/// What the caller should do after an answer has been applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step<'a> {
    /// Ask this question next
    Ask(&'a QuestionNode),

    /// Interrogation is over; call `finish`
    Verdict,
}

/// Drives cases through classification, interrogation and verdict.
#[derive(Debug, Clone)]
pub struct DecisionTreeEngine {
    registry: Arc<ScenarioRegistry>,
    classifier: ScenarioClassifier,
    router: ConfidenceRouter,
    scorer: EvidenceScorer,
    aggregator: VerdictAggregator,
}

impl DecisionTreeEngine {
    pub fn new(registry: Arc<ScenarioRegistry>) -> Self {
        Self {
            registry,
            classifier: ScenarioClassifier::new(),
            router: ConfidenceRouter::default(),
            scorer: EvidenceScorer::new(),
            aggregator: VerdictAggregator::new(),
        }
    }

    /// Use a different router configuration.
    pub fn with_router(mut self, config: RouterConfig) -> Result<Self, EngineError> {
        self.router = ConfidenceRouter::new(config)?;
        Ok(self)
    }

    pub fn with_scorer(mut self, scorer: EvidenceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn registry(&self) -> &Arc<ScenarioRegistry> {
        &self.registry
    }

    pub fn classifier(&self) -> &ScenarioClassifier {
        &self.classifier
    }

    pub fn router(&self) -> &ConfidenceRouter {
        &self.router
    }

    pub fn scorer(&self) -> &EvidenceScorer {
        &self.scorer
    }

    // ------------------------------------------------------------------
    // Step functions
    // ------------------------------------------------------------------

    /// Open a case for a document.
    pub fn open_case(&self, document: &Document) -> Case {
        Case::new(document.id.clone(), document.text.clone())
    }

    /// Classify by keywords. On a match the scenario is assigned and the case
    /// moves to `Interrogating`; otherwise it stays in `Classifying` so the
    /// caller can try another classifier or abort.
    pub fn classify(&self, case: &mut Case) -> Result<bool, EngineError> {
        self.ensure_phase(case, CasePhase::Classifying)?;

        match self.classifier.classify(&case.document_text, &self.registry) {
            Some(classification) => {
                self.assign_scenario(case, classification)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Assign a scenario and position the case on its start node.
    pub fn assign_scenario(
        &self,
        case: &mut Case,
        classification: Classification,
    ) -> Result<(), EngineError> {
        self.ensure_phase(case, CasePhase::Classifying)?;

        let scenario = self
            .registry
            .get(&classification.scenario_id)
            .ok_or_else(|| EngineError::ScenarioNotFound(classification.scenario_id.clone()))?;

        info!(
            article = %case.article_id,
            scenario = %scenario.id,
            confidence = classification.confidence,
            "Scenario assigned"
        );

        case.scenario_id = Some(scenario.id.clone());
        case.scenario_name = Some(scenario.name.clone());
        case.classification_confidence = classification.confidence;
        case.matched_keywords = classification.matched_keywords;
        case.current_node = scenario.start.clone();
        case.phase = CasePhase::Interrogating;
        Ok(())
    }

    /// Close a case that matched no scenario as NO_HIT without interrogation.
    pub fn abort_unclassified(&self, case: &mut Case) -> Result<(), EngineError> {
        self.ensure_phase(case, CasePhase::Classifying)?;

        let summary = self.aggregator.unclassified();
        case.current_node.clear();
        case.verdict = summary.verdict;
        case.verdict_reason = summary.reason;
        case.risk_score = summary.risk_score;
        case.recommended_action = summary.recommended_action;
        case.phase = CasePhase::Aborted;
        case.evaluated_at = Some(Utc::now());

        info!(article = %case.article_id, verdict = %case.verdict, "No scenario matched");
        Ok(())
    }

    /// The question awaiting an answer, if interrogation is still running.
    ///
    /// A current node missing from the tree ends interrogation.
    pub fn pending_question(&self, case: &mut Case) -> Option<&QuestionNode> {
        if case.phase != CasePhase::Interrogating {
            return None;
        }
        if case.current_node.is_empty() {
            case.phase = CasePhase::Verdicting;
            return None;
        }

        let node = case
            .scenario_id
            .as_deref()
            .and_then(|id| self.registry.get(id))
            .and_then(|scenario| scenario.question(&case.current_node));

        if node.is_none() {
            warn!(
                article = %case.article_id,
                node = %case.current_node,
                "Current node not in decision tree, treating as terminal"
            );
            case.current_node.clear();
            case.phase = CasePhase::Verdicting;
        }

        node
    }

    /// Apply an answer to the current node and advance the case.
    pub fn apply_answer(
        &self,
        case: &mut Case,
        answer: Answer,
        source: AnswerSource,
    ) -> Result<Step<'_>, EngineError> {
        self.ensure_phase(case, CasePhase::Interrogating)?;

        let scenario = self.active_scenario(case)?;
        let node_id = case.current_node.clone();
        let node = scenario
            .question(&node_id)
            .ok_or_else(|| EngineError::TreeNodeNotFound {
                scenario_id: scenario.id.clone(),
                node_id: node_id.clone(),
            })?;

        let confidence = ConfidenceRouter::normalize(answer.confidence);
        let tier = self.router.route(confidence);
        let action = self.router.action(tier, true);

        let answer = match action {
            RouteAction::Downgrade => self.router.downgrade(&answer),
            _ => Answer {
                confidence,
                ..answer
            },
        };

        case.answers.insert(
            node_id.clone(),
            AnswerRecord {
                question_id: node_id.clone(),
                question_text: node.text.clone(),
                answer: answer.answer,
                evidence: answer.evidence,
                confidence: answer.confidence,
                confidence_tier: tier,
                source,
            },
        );
        case.path.push(node_id.clone());

        match action {
            RouteAction::Terminate => {
                case.missing_fields.push(MissingFieldRecord {
                    question_id: node_id.clone(),
                    question_text: node.text.clone(),
                    confidence: answer.confidence,
                    suggested_documents: node
                        .documents
                        .clone()
                        .unwrap_or_else(|| format!("Supporting documentation for {}", node_id)),
                });
                case.early_terminated = true;
                case.current_node.clear();
                case.phase = CasePhase::Verdicting;

                debug!(
                    article = %case.article_id,
                    node = %node_id,
                    confidence = answer.confidence,
                    ?tier,
                    "Low confidence, interrogation terminated"
                );
                return Ok(Step::Verdict);
            }
            RouteAction::Flag => case.uncertain_node_ids.push(node_id.clone()),
            RouteAction::Continue | RouteAction::Downgrade => {}
        }

        let next = node.next(answer.answer);
        debug!(
            article = %case.article_id,
            node = %node_id,
            answer = answer.answer,
            confidence = answer.confidence,
            ?tier,
            ?source,
            next = next.unwrap_or("-"),
            "Answer applied"
        );

        let Some(next_id) = next else {
            case.current_node.clear();
            case.phase = CasePhase::Verdicting;
            return Ok(Step::Verdict);
        };

        if case.answers.contains_key(next_id) {
            return Err(EngineError::CycleDetected {
                node_id: next_id.to_string(),
            });
        }

        case.current_node = next_id.to_string();
        match scenario.question(next_id) {
            Some(next_node) => Ok(Step::Ask(next_node)),
            // pending_question will log and end interrogation
            None => Ok(Step::Verdict),
        }
    }

    /// Score the collected answers and close the case.
    pub fn finish(&self, case: &mut Case) -> Result<(), EngineError> {
        if !matches!(case.phase, CasePhase::Interrogating | CasePhase::Verdicting) {
            return Err(EngineError::CaseClosed(case.article_id.clone()));
        }

        let summary = self.aggregator.aggregate(case);
        case.current_node.clear();
        case.verdict = summary.verdict;
        case.verdict_reason = summary.reason;
        case.risk_score = summary.risk_score;
        case.recommended_action = summary.recommended_action;
        case.phase = CasePhase::Closed;
        case.evaluated_at = Some(Utc::now());

        info!(
            article = %case.article_id,
            verdict = %case.verdict,
            risk_score = case.risk_score,
            questions = case.path.len(),
            "Verdict reached"
        );
        Ok(())
    }

    /// Answer from the fallback evidence scorer.
    pub fn fallback_answer(&self, question: &str, document: &str) -> Answer {
        self.scorer.fallback_answer(question, document)
    }

    // ------------------------------------------------------------------
    // Blocking driver
    // ------------------------------------------------------------------

    /// Evaluate a document. Never fails: errors yield a PENDING case with
    /// `error` set.
    pub fn evaluate(&self, document: &Document, answerer: &dyn QuestionAnswerer) -> Case {
        let mut case = self.open_case(document);
        if let Err(e) = self.drive(&mut case, answerer) {
            error!(article = %case.article_id, error = %e, "Evaluation failed");
            case.fail(e.to_string());
        }
        case
    }

    /// Evaluate a document, surfacing any engine error.
    pub fn try_evaluate(
        &self,
        document: &Document,
        answerer: &dyn QuestionAnswerer,
    ) -> Result<Case, EngineError> {
        let mut case = self.open_case(document);
        self.drive(&mut case, answerer)?;
        Ok(case)
    }

    fn drive(&self, case: &mut Case, answerer: &dyn QuestionAnswerer) -> Result<(), EngineError> {
        if !self.classify(case)? {
            return self.abort_unclassified(case);
        }

        while let Some(node) = self.pending_question(case) {
            let (answer, source) = match answerer.answer(&node.text, &case.document_text) {
                Ok(answer) => (answer, AnswerSource::Answerer),
                Err(e) => {
                    warn!(node = %node.id, error = %e, "Answerer failed, using evidence scorer");
                    (
                        self.fallback_answer(&node.text, &case.document_text),
                        AnswerSource::Fallback,
                    )
                }
            };
            self.apply_answer(case, answer, source)?;
        }

        self.finish(case)
    }

    fn ensure_phase(&self, case: &Case, expected: CasePhase) -> Result<(), EngineError> {
        if case.phase == expected && case.is_open() {
            Ok(())
        } else if !case.is_open() {
            Err(EngineError::CaseClosed(case.article_id.clone()))
        } else {
            Err(EngineError::UnexpectedPhase {
                expected,
                actual: case.phase,
            })
        }
    }

    fn active_scenario(&self, case: &Case) -> Result<&Scenario, EngineError> {
        let id = case
            .scenario_id
            .as_deref()
            .ok_or_else(|| EngineError::ScenarioNotFound(String::new()))?;
        self.registry
            .get(id)
            .ok_or_else(|| EngineError::ScenarioNotFound(id.to_string()))
    }
}
