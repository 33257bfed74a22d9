//! Async case runner.
//!
//! Drives cases through the engine's step functions with an [`AnswerAgent`]
//! answering questions. Each question gets a timeout; a timeout, an agent
//! error or an open circuit all fall back to the evidence scorer. Batches run
//! on a bounded pool of tokio tasks and one failing case never affects the
//! others.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use warden_core::{
    Answer, AnswerSource, Case, Classification, DecisionTreeEngine, Document, EngineError,
    ScenarioRegistry,
};

use crate::agents::{AgentError, AnswerAgent, ScorerAgent};
use crate::cache::{AnswerCache, CacheKey};
use crate::config::{ConfigError, RuntimeConfig};
use crate::prompts;
use crate::resilience::CircuitBreaker;

/// Errors from the case runner.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Case task failed: {0}")]
    Join(String),

    #[error("Runner not configured: {0}")]
    NotConfigured(String),
}

/// Runs cases and batches against one registry and one agent.
#[derive(Clone)]
pub struct CaseRunner {
    engine: Arc<DecisionTreeEngine>,
    agent: Arc<dyn AnswerAgent>,
    circuit_breaker: Arc<CircuitBreaker>,
    cache: Option<Arc<AnswerCache>>,
    config: Arc<RuntimeConfig>,
}

impl CaseRunner {
    pub fn builder() -> CaseRunnerBuilder {
        CaseRunnerBuilder::new()
    }

    pub fn engine(&self) -> &DecisionTreeEngine {
        &self.engine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Evaluate one document. Failures yield a PENDING case with `error` set.
    pub async fn run_case(&self, document: &Document) -> Case {
        let mut case = self.engine.open_case(document);
        if let Err(e) = self.drive(&mut case).await {
            error!(article = %case.article_id, error = %e, "Case failed");
            case.fail(e.to_string());
        }
        case
    }

    /// Evaluate one document, surfacing any engine error.
    pub async fn try_run_case(&self, document: &Document) -> Result<Case, RuntimeError> {
        let mut case = self.engine.open_case(document);
        self.drive(&mut case).await?;
        Ok(case)
    }

    /// Evaluate documents concurrently.
    ///
    /// Results come back in completion order, one per document. A case whose
    /// task panics is returned as a failed case.
    pub async fn run_batch(&self, documents: Vec<Document>) -> Vec<Case> {
        let total = documents.len();
        info!(total, concurrency = self.config.concurrency, "Batch started");

        let cases: Vec<Case> = stream::iter(documents)
            .map(|document| {
                let runner = self.clone();
                let article_id = document.id.clone();
                async move {
                    let task = tokio::spawn(async move { runner.run_case(&document).await });
                    match task.await {
                        Ok(case) => case,
                        Err(e) => {
                            let err = RuntimeError::Join(e.to_string());
                            error!(article = %article_id, error = %err, "Case task aborted");
                            Case::failed(article_id, err.to_string())
                        }
                    }
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let failed = cases.iter().filter(|c| c.error.is_some()).count();
        info!(total, failed, "Batch finished");
        cases
    }

    async fn drive(&self, case: &mut Case) -> Result<(), RuntimeError> {
        if !self.engine.classify(case)? {
            match self.classify_with_agent(case).await {
                Some(classification) => self.engine.assign_scenario(case, classification)?,
                None => {
                    self.engine.abort_unclassified(case)?;
                    return Ok(());
                }
            }
        }

        while let Some(node) = self.engine.pending_question(case) {
            let (answer, source) = self.answer_question(&node.text, &case.document_text).await;
            self.engine.apply_answer(case, answer, source)?;
        }

        self.engine.finish(case)?;
        Ok(())
    }

    /// Ask the agent to pick a scenario when no keywords matched.
    async fn classify_with_agent(&self, case: &Case) -> Option<Classification> {
        let agent = self.agent.name();
        if self.circuit_breaker.is_open(agent) {
            return None;
        }

        let registry = self.engine.registry();
        let prompt = prompts::classification_prompt(
            registry,
            &case.document_text,
            self.config.react.excerpt_chars,
        );

        let timeout = self.config.question_timeout;
        let reply = match tokio::time::timeout(timeout, self.agent.classify(&prompt)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(AgentError::Unsupported)) => return None,
            Ok(Err(e)) => {
                warn!(article = %case.article_id, agent, error = %e, "LLM classification failed");
                return None;
            }
            Err(_) => {
                let err = AgentError::Timeout(timeout);
                warn!(article = %case.article_id, agent, error = %err, "LLM classification failed");
                return None;
            }
        };

        let classification = self.engine.classifier().match_reply(&reply, registry);
        debug!(
            article = %case.article_id,
            reply = %reply,
            scenario = classification.as_ref().map(|c| c.scenario_id.as_str()).unwrap_or("none"),
            "LLM classification"
        );
        classification
    }

    /// Answer one question: cache, then agent, then evidence scorer.
    async fn answer_question(&self, question: &str, document: &str) -> (Answer, AnswerSource) {
        let agent = self.agent.name();
        let key = CacheKey::new(agent, question, document);

        if let Some(cache) = &self.cache {
            if let Some(answer) = cache.get(&key).await {
                return (answer, AnswerSource::Cache);
            }
        }

        if self.circuit_breaker.is_open(agent) {
            debug!(agent, "Circuit open, answering from evidence");
            return self.fallback(question, document);
        }

        let timeout = self.config.question_timeout;
        let result = match tokio::time::timeout(timeout, self.agent.answer(question, document)).await
        {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(timeout)),
        };

        match result {
            Ok(answer) => {
                self.circuit_breaker.record_success(agent);
                if let Some(cache) = &self.cache {
                    cache.insert(key, answer.clone()).await;
                }
                (answer, AnswerSource::Answerer)
            }
            Err(AgentError::NoAnswer) => {
                debug!(agent, "Agent gave no answer, answering from evidence");
                self.fallback(question, document)
            }
            Err(e) => {
                self.circuit_breaker.record_failure(agent);
                warn!(agent, error = %e, "Agent failed, answering from evidence");
                self.fallback(question, document)
            }
        }
    }

    fn fallback(&self, question: &str, document: &str) -> (Answer, AnswerSource) {
        (
            self.engine.fallback_answer(question, document),
            AnswerSource::Fallback,
        )
    }
}

/// Builder for [`CaseRunner`].
pub struct CaseRunnerBuilder {
    registry: Option<Arc<ScenarioRegistry>>,
    agent: Option<Arc<dyn AnswerAgent>>,
    config: RuntimeConfig,
}

impl CaseRunnerBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            agent: None,
            config: RuntimeConfig::default(),
        }
    }

    pub fn registry(mut self, registry: Arc<ScenarioRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Agent answering questions. Defaults to the offline [`ScorerAgent`].
    pub fn agent(mut self, agent: Arc<dyn AnswerAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<CaseRunner, RuntimeError> {
        self.config.validate()?;

        let registry = self
            .registry
            .ok_or_else(|| RuntimeError::NotConfigured("scenario registry".to_string()))?;
        let engine = DecisionTreeEngine::new(registry).with_router(self.config.router.clone())?;

        let agent = self
            .agent
            .unwrap_or_else(|| Arc::new(ScorerAgent::new(engine.scorer().clone())));
        let cache = self
            .config
            .cache
            .enabled
            .then(|| Arc::new(AnswerCache::from_config(&self.config.cache)));

        Ok(CaseRunner {
            engine: Arc::new(engine),
            agent,
            circuit_breaker: Arc::new(CircuitBreaker::new(self.config.circuit_breaker.clone())),
            cache,
            config: Arc::new(self.config),
        })
    }
}

impl Default for CaseRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use crate::resilience::CircuitState;
    use warden_core::{CasePhase, Scenario, Verdict};

    const CANNABIS_TREE: &str = r#"
id: cannabis_business
name: Cannabis Business
keywords: [cannabis]
questions:
  Q1:
    text: "Is income from cannabis activities more than 10%?"
    next_if_no: Q2
  Q2:
    text: "Does the client hold a state cannabis license?"
"#;

    const CANNABIS_ARTICLE: &str = "The client sells cannabis products online.";

    enum Behavior {
        Answer(bool, f64),
        Fail,
        GiveUp,
        Sleep(Duration),
        PanicOn(&'static str),
    }

    struct MockAgent {
        behavior: Behavior,
        classify_reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl MockAgent {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                classify_reply: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn classifying(behavior: Behavior, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                classify_reply: Some(reply),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnswerAgent for MockAgent {
        fn name(&self) -> &str {
            "mock"
        }

        async fn answer(&self, _question: &str, document: &str) -> Result<Answer, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Answer(answer, confidence) => {
                    Ok(Answer::new(*answer, *confidence, "mock evidence"))
                }
                Behavior::Fail => Err(AgentError::Llm("provider unavailable".to_string())),
                Behavior::GiveUp => Err(AgentError::NoAnswer),
                Behavior::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(Answer::yes(0.9, "too late"))
                }
                Behavior::PanicOn(marker) => {
                    if document.contains(marker) {
                        panic!("agent crashed");
                    }
                    Ok(Answer::no(0.9, "mock evidence"))
                }
            }
        }

        async fn classify(&self, _prompt: &str) -> Result<String, AgentError> {
            self.classify_reply
                .map(str::to_string)
                .ok_or(AgentError::Unsupported)
        }
    }

    fn registry() -> Arc<ScenarioRegistry> {
        let scenario = Scenario::from_yaml(CANNABIS_TREE).unwrap();
        Arc::new(ScenarioRegistry::from_scenarios(vec![scenario]).unwrap())
    }

    fn runner(agent: Arc<dyn AnswerAgent>, config: RuntimeConfig) -> CaseRunner {
        CaseRunner::builder()
            .registry(registry())
            .agent(agent)
            .config(config)
            .build()
            .unwrap()
    }

    fn no_cache() -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.cache.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_hit_on_red_flag_yes() {
        let runner = runner(MockAgent::new(Behavior::Answer(true, 0.9)), no_cache());
        let case = runner
            .run_case(&Document::new("a-1", CANNABIS_ARTICLE))
            .await;

        assert_eq!(case.verdict, Verdict::Hit);
        assert_eq!(case.risk_score, 0.3);
        assert_eq!(case.path, vec!["Q1"]);
        assert_eq!(case.answers["Q1"].source, AnswerSource::Answerer);
    }

    #[tokio::test]
    async fn test_no_hit_walks_no_branch() {
        let runner = runner(MockAgent::new(Behavior::Answer(false, 0.9)), no_cache());
        let case = runner
            .run_case(&Document::new("a-2", CANNABIS_ARTICLE))
            .await;

        assert_eq!(case.verdict, Verdict::NoHit);
        assert_eq!(case.risk_score, 0.0);
        assert_eq!(case.path, vec!["Q1", "Q2"]);
    }

    #[tokio::test]
    async fn test_low_confidence_is_missing_info() {
        let runner = runner(MockAgent::new(Behavior::Answer(false, 0.3)), no_cache());
        let case = runner
            .run_case(&Document::new("a-3", CANNABIS_ARTICLE))
            .await;

        assert_eq!(case.verdict, Verdict::MissingInfo);
        assert_eq!(case.risk_score, 0.0);
        assert_eq!(case.missing_fields.len(), 1);
        assert_eq!(case.missing_fields[0].question_id, "Q1");
    }

    #[tokio::test]
    async fn test_agent_failure_falls_back_to_scorer() {
        let agent = MockAgent::new(Behavior::Fail);
        let runner = runner(agent.clone(), no_cache());
        let case = runner
            .run_case(&Document::new("a-4", CANNABIS_ARTICLE))
            .await;

        assert!(case.error.is_none());
        assert_ne!(case.verdict, Verdict::Pending);
        assert!(case
            .answers
            .values()
            .all(|record| record.source == AnswerSource::Fallback));
    }

    #[tokio::test]
    async fn test_open_circuit_skips_agent() {
        let agent = MockAgent::new(Behavior::Fail);
        let mut config = no_cache();
        config.circuit_breaker.failure_threshold = 1;
        config.circuit_breaker.recovery_timeout = Duration::from_secs(600);
        let runner = runner(agent.clone(), config);

        runner.run_case(&Document::new("a-5", CANNABIS_ARTICLE)).await;
        assert_eq!(agent.calls(), 1);

        let case = runner.run_case(&Document::new("a-6", CANNABIS_ARTICLE)).await;
        assert_eq!(agent.calls(), 1);
        assert_eq!(case.answers["Q1"].source, AnswerSource::Fallback);
    }

    #[tokio::test]
    async fn test_no_answer_does_not_open_circuit() {
        let agent = MockAgent::new(Behavior::GiveUp);
        let mut config = no_cache();
        config.circuit_breaker.failure_threshold = 1;
        let runner = runner(agent.clone(), config);

        let first = runner.run_case(&Document::new("a-11", CANNABIS_ARTICLE)).await;
        assert_eq!(first.answers["Q1"].source, AnswerSource::Fallback);

        runner.run_case(&Document::new("a-12", CANNABIS_ARTICLE)).await;
        assert_eq!(agent.calls(), 2);
        assert!(matches!(
            runner.circuit_breaker().state("mock"),
            CircuitState::Closed { .. }
        ));
    }

    #[tokio::test]
    async fn test_question_timeout_falls_back() {
        let mut config = no_cache();
        config.question_timeout = Duration::from_millis(20);
        let runner = runner(MockAgent::new(Behavior::Sleep(Duration::from_secs(5))), config);

        let case = runner
            .run_case(&Document::new("a-7", CANNABIS_ARTICLE))
            .await;
        assert_eq!(case.answers["Q1"].source, AnswerSource::Fallback);
        assert_ne!(case.answers["Q1"].evidence, "too late");
    }

    #[tokio::test]
    async fn test_llm_classification_fallback() {
        let agent = MockAgent::classifying(Behavior::Answer(true, 0.9), "cannabis_business");
        let runner = runner(agent, no_cache());

        let case = runner
            .run_case(&Document::new("a-8", "A grower in Oregon expanded its greenhouse."))
            .await;
        assert_eq!(case.scenario_id.as_deref(), Some("cannabis_business"));
        assert_eq!(case.classification_confidence, 0.0);
        assert_eq!(case.verdict, Verdict::Hit);
    }

    #[tokio::test]
    async fn test_unclassified_is_no_hit() {
        let agent = MockAgent::classifying(Behavior::Answer(true, 0.9), "none");
        let runner = runner(agent.clone(), no_cache());

        let case = runner
            .run_case(&Document::new("a-9", "Quarterly results of a shipping firm."))
            .await;
        assert_eq!(case.verdict, Verdict::NoHit);
        assert_eq!(case.phase, CasePhase::Aborted);
        assert_eq!(case.risk_score, 0.0);
        assert!(case.answers.is_empty());
        assert_eq!(agent.calls(), 0);
    }

    #[tokio::test]
    async fn test_cached_answers_skip_agent() {
        let agent = MockAgent::new(Behavior::Answer(false, 0.9));
        let runner = runner(agent.clone(), RuntimeConfig::default());
        let document = Document::new("a-10", CANNABIS_ARTICLE);

        runner.run_case(&document).await;
        assert_eq!(agent.calls(), 2);

        let case = runner.run_case(&document).await;
        assert_eq!(agent.calls(), 2);
        assert!(case
            .answers
            .values()
            .all(|record| record.source == AnswerSource::Cache));
        assert_eq!(case.verdict, Verdict::NoHit);
    }

    #[tokio::test]
    async fn test_batch_isolates_panicking_case() {
        let runner = runner(MockAgent::new(Behavior::PanicOn("CRASH")), no_cache());
        let documents = vec![
            Document::new("b-1", CANNABIS_ARTICLE),
            Document::new("b-2", format!("{} CRASH", CANNABIS_ARTICLE)),
            Document::new("b-3", CANNABIS_ARTICLE),
        ];

        let mut cases = runner.run_batch(documents).await;
        cases.sort_by(|a, b| a.article_id.cmp(&b.article_id));

        assert_eq!(cases.len(), 3);
        assert_eq!(cases[0].verdict, Verdict::NoHit);
        assert_eq!(cases[1].verdict, Verdict::Pending);
        assert!(cases[1].error.as_deref().unwrap_or("").contains("Case task failed"));
        assert_eq!(cases[2].verdict, Verdict::NoHit);
    }

    #[tokio::test]
    async fn test_builder_requires_registry() {
        let result = CaseRunner::builder().build();
        assert!(matches!(result, Err(RuntimeError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_sample_scenarios_offline() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios");
        let registry = Arc::new(ScenarioRegistry::load_dir(dir).unwrap());
        let runner = CaseRunner::builder().registry(registry).build().unwrap();

        let case = runner
            .run_case(&Document::new(
                "sample",
                "The client operates a licensed cannabis dispensary and a hemp farm.",
            ))
            .await;
        assert_eq!(case.scenario_id.as_deref(), Some("cannabis_business"));
        assert!(case.is_closed());
        assert!((0.0..=1.0).contains(&case.risk_score));
    }
}
