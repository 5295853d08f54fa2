use crate::config::RouterConfig;
use crate::decision::{Alternative, Rationale, RouteOutcome, RouteResponse, RoutingDecision};
use crate::disambiguate::{Disambiguator, Resolution, ResolutionKind, ResolvedAction};
use crate::dispatch::{outcome_state, ExecutorAdapter, StepReport};
use crate::error::{EngineError, Result};
use crate::scoring::{ConfidenceScorer, ScoredCandidate};
use crate::session::{SessionState, SessionTrace, SuspendedSession};
use router_context::{capture_snapshot, detect_urgency, ContextCollector, ContextSnapshot};
use router_feedback::{FeedbackStore, WeightSnapshot};
use router_matcher::tokens::normalize;
use router_matcher::{MatchReport, PatternMatcher, RuleTable};
use router_planner::{PlanBuilder, PlanIntent, PlanRequest};
use router_protocol::{ExecutionPlan, FeedbackIngest, RouteRequest};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Entry point: one call per user utterance.
///
/// The rule table is swappable at runtime; the feedback store is shared by handle. Everything
/// else is per session.
pub struct Router {
    config: RouterConfig,
    rules: RwLock<Arc<RuleTable>>,
    collector: Arc<dyn ContextCollector>,
    feedback: Arc<FeedbackStore>,
    executor: Option<Arc<dyn ExecutorAdapter>>,
    scorer: ConfidenceScorer,
    disambiguator: Disambiguator,
    planner: PlanBuilder,
}

impl Router {
    /// Build a router with the table named by `config.rules`, or the built-in one.
    pub fn new(
        config: RouterConfig,
        collector: Arc<dyn ContextCollector>,
        feedback: Arc<FeedbackStore>,
    ) -> Result<Self> {
        let table = match &config.rules {
            Some(path) => RuleTable::from_path(path)?,
            None => RuleTable::builtin()?,
        };
        Ok(Self::with_rules(config, table, collector, feedback))
    }

    pub fn with_rules(
        config: RouterConfig,
        table: RuleTable,
        collector: Arc<dyn ContextCollector>,
        feedback: Arc<FeedbackStore>,
    ) -> Self {
        let scorer = ConfidenceScorer::new(config.scoring, config.feedback.cap);
        let disambiguator = Disambiguator::new(config.max_candidates);
        Self {
            config,
            rules: RwLock::new(Arc::new(table)),
            collector,
            feedback,
            executor: None,
            scorer,
            disambiguator,
            planner: PlanBuilder::new(),
        }
    }

    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn ExecutorAdapter>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn feedback(&self) -> &Arc<FeedbackStore> {
        &self.feedback
    }

    pub fn rules(&self) -> Arc<RuleTable> {
        match self.rules.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Swap in a new rule table. Sessions already running keep the table they started with.
    pub fn replace_rules(&self, table: RuleTable) {
        let table = Arc::new(table);
        match self.rules.write() {
            Ok(mut slot) => *slot = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
    }

    /// Hot reload from disk. A table that fails validation leaves the current one in place.
    pub fn reload_rules(&self, path: &Path) -> Result<usize> {
        let table = RuleTable::from_path(path)?;
        let count = table.rules().len();
        self.replace_rules(table);
        log::info!("reloaded {count} rules from {}", path.display());
        Ok(count)
    }

    pub fn weights(&self) -> Arc<WeightSnapshot> {
        self.feedback.snapshot()
    }

    /// Route a fresh request: capture context once, then score and decide.
    pub async fn route(&self, request: &RouteRequest) -> Result<RouteResponse> {
        let trace = SessionTrace::start(uuid::Uuid::new_v4().to_string());
        let snapshot = capture_snapshot(
            self.collector.as_ref(),
            &request.text,
            request.urgency,
            self.config.context_timeout,
        )
        .await;
        self.evaluate(trace, request, snapshot).await
    }

    /// Route against an already captured snapshot (the collector is not consulted).
    pub async fn route_with_snapshot(
        &self,
        request: &RouteRequest,
        snapshot: ContextSnapshot,
    ) -> Result<RouteResponse> {
        let trace = SessionTrace::start(uuid::Uuid::new_v4().to_string());
        self.evaluate(trace, request, snapshot).await
    }

    /// Answer a clarification. The answer is routed as a brand-new request against the
    /// session's original snapshot. Urgency wording in the answer can raise the session's
    /// urgency but never lower it; an explicit override from the original request still wins.
    pub async fn resume(&self, suspended: SuspendedSession, answer: &str) -> Result<RouteResponse> {
        let trace = SessionTrace::suspended(suspended.session_id.clone());
        let mut snapshot = suspended.snapshot;
        if suspended.request.urgency.is_none() {
            snapshot.urgency = snapshot.urgency.escalate(detect_urgency(answer));
        }
        let request = RouteRequest {
            text: answer.to_string(),
            urgency: suspended.request.urgency,
        };
        self.evaluate(trace, &request, snapshot).await
    }

    /// Abandon a clarification. Nothing is learned from it.
    pub fn cancel_suspended(&self, suspended: &SuspendedSession) -> Result<SessionState> {
        let mut trace = SessionTrace::suspended(suspended.session_id.clone());
        trace.advance(SessionState::Cancelled)?;
        log::info!("session {} cancelled while awaiting clarification", trace.session_id);
        Ok(trace.state)
    }

    /// Cancel a dispatched plan. Steps that already finished are reported as they ended.
    pub async fn cancel(&self, decision_id: &str) -> Result<(SessionState, Vec<StepReport>)> {
        let executor = self.executor.as_ref().ok_or(EngineError::NoExecutor)?;
        let reports = executor
            .cancel(decision_id)
            .await
            .map_err(|err| EngineError::Dispatch(err.to_string()))?;
        self.feedback.discard(decision_id)?;
        log::info!(
            "decision {decision_id} cancelled ({} step reports)",
            reports.len()
        );
        Ok((SessionState::Cancelled, reports))
    }

    /// Fold executor step reports into a terminal state. Failures cancel the implicit success.
    pub fn report_outcome(&self, decision_id: &str, reports: &[StepReport]) -> Result<SessionState> {
        let state = outcome_state(reports);
        match state {
            SessionState::Failed | SessionState::Partial => {
                self.feedback.record_failure(decision_id)?;
            }
            SessionState::Cancelled => {
                self.feedback.discard(decision_id)?;
            }
            _ => {}
        }
        log::info!("decision {decision_id} finished as {state:?}");
        Ok(state)
    }

    pub fn ingest_feedback(&self, feedback: &FeedbackIngest) -> Result<()> {
        Ok(self.feedback.ingest(feedback)?)
    }

    /// Count uncorrected decisions older than the window as successes.
    pub fn settle_feedback(&self) -> Result<usize> {
        Ok(self.feedback.settle_expired()?)
    }

    async fn evaluate(
        &self,
        mut trace: SessionTrace,
        request: &RouteRequest,
        snapshot: ContextSnapshot,
    ) -> Result<RouteResponse> {
        trace.advance(SessionState::Scoring)?;

        let table = self.rules();
        let tokens = normalize(&request.text);
        let report = PatternMatcher::new(&table).match_tokens(&tokens);
        let weights = self.feedback.snapshot();
        let scored = self.scorer.score(&table, &report, &snapshot, &weights);
        let threshold = self.config.thresholds.for_urgency(snapshot.urgency);

        let resolution = self
            .disambiguator
            .decide(&table, &report, &scored, &tokens, threshold);

        let (kind, actions) = match resolution {
            Resolution::Clarify(clarification) => {
                trace.advance(SessionState::AwaitingClarification)?;
                log::info!(
                    "session {}: clarification ({:?}, {} candidates)",
                    trace.session_id,
                    clarification.reason,
                    clarification.candidates.len()
                );
                let suspended = SuspendedSession {
                    session_id: trace.session_id.clone(),
                    request: request.clone(),
                    snapshot,
                    candidates: scored,
                    clarification,
                };
                return Ok(RouteResponse {
                    session_id: trace.session_id,
                    state: trace.state,
                    history: trace.history,
                    outcome: RouteOutcome::Clarification { suspended },
                });
            }
            Resolution::Resolved { kind, actions } => (kind, actions),
        };

        trace.advance(SessionState::AutoResolved)?;
        let plan = self.build_plan(&table, &tokens, &report, &scored, &snapshot, request, &actions)?;
        trace.advance(SessionState::PlanBuilt)?;

        let decision = build_decision(kind, actions, &scored, &snapshot, threshold);
        log::info!(
            "session {}: {:?} -> [{}] ({} stages)",
            trace.session_id,
            kind,
            decision
                .actions
                .iter()
                .map(|a| format!("{}={:.2}", a.action, a.confidence))
                .collect::<Vec<_>>()
                .join(", "),
            plan.stages.len()
        );

        // The decision stands even when the store cannot persist it; only learning is lost.
        if let Err(err) = self.feedback.register_decision(
            &trace.session_id,
            &decision.action_ids(),
            &decision.fingerprint,
        ) {
            log::warn!(
                "session {}: feedback store rejected the decision: {err}",
                trace.session_id
            );
        }

        if let Some(executor) = &self.executor {
            match executor.dispatch(&trace.session_id, &plan).await {
                Ok(()) => trace.advance(SessionState::Dispatched)?,
                Err(err) => {
                    log::warn!("dispatch of {} failed: {err}", trace.session_id);
                    if let Err(err) = self.feedback.record_failure(&trace.session_id) {
                        log::warn!(
                            "session {}: could not record dispatch failure: {err}",
                            trace.session_id
                        );
                    }
                    trace.advance(SessionState::Failed)?;
                }
            }
        }

        Ok(RouteResponse {
            session_id: trace.session_id,
            state: trace.state,
            history: trace.history,
            outcome: RouteOutcome::Routed { decision, plan },
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_plan(
        &self,
        table: &RuleTable,
        tokens: &[String],
        report: &MatchReport,
        scored: &[ScoredCandidate],
        snapshot: &ContextSnapshot,
        request: &RouteRequest,
        actions: &[ResolvedAction],
    ) -> Result<ExecutionPlan> {
        let intents = actions
            .iter()
            .filter_map(|resolved| {
                let (_, rule) = table.rule(&resolved.action)?;
                let matched = scored
                    .iter()
                    .find(|c| c.action == resolved.action)
                    .map(|c| c.matched.clone())
                    .unwrap_or_default();
                Some(PlanIntent {
                    action: resolved.action.clone(),
                    position: resolved.position,
                    phase: rule.family().map_or(0, |verb| table.phase(verb)),
                    resources: rule.resources.clone(),
                    gated: rule.gated,
                    destructive: rule.destructive,
                    writes_git: rule.writes_git(),
                    matched,
                })
            })
            .collect();

        let plan_request = PlanRequest {
            text: request.text.clone(),
            tokens: tokens.to_vec(),
            paths: report.paths.clone(),
            urgency: snapshot.urgency,
            intents,
        };
        Ok(self.planner.build(&plan_request)?)
    }
}

fn build_decision(
    kind: ResolutionKind,
    actions: Vec<ResolvedAction>,
    scored: &[ScoredCandidate],
    snapshot: &ContextSnapshot,
    threshold: f32,
) -> RoutingDecision {
    let chosen = |candidate: &ScoredCandidate| actions.iter().any(|a| a.action == candidate.action);
    let rationale = scored
        .iter()
        .filter(|c| chosen(c))
        .map(Rationale::from)
        .collect();
    let alternatives = scored
        .iter()
        .filter(|c| !chosen(c))
        .map(|c| Alternative {
            action: c.action.clone(),
            confidence: c.confidence,
        })
        .collect();

    RoutingDecision {
        resolution: kind,
        actions,
        alternatives,
        rationale,
        urgency: snapshot.urgency,
        threshold,
        fingerprint: snapshot.fingerprint(),
    }
}
