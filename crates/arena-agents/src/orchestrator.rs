use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arena_ledger::TradeExecutor;
use arena_market::{MarketHoursGate, QuoteSource};
use arena_models::agent::AgentProfile;
use arena_models::config::{CycleConfig, SymbolAssignment};
use arena_models::cycle::{AgentCycleResult, CycleReport, CycleStatus};
use arena_models::trade::Decision;
use chrono::Utc;
use rand::seq::SliceRandom;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::decision_source::DecisionSource;
use crate::error::AgentError;

/// Everything one agent pipeline needs, cheap to clone into a task.
#[derive(Clone)]
struct Pipeline {
    decisions: Arc<dyn DecisionSource>,
    quotes: Arc<dyn QuoteSource>,
    gate: Arc<dyn MarketHoursGate>,
    executor: Arc<TradeExecutor>,
    decision_timeout: Duration,
}

/// Agents currently inside a pipeline in this process.
type InFlight = Arc<Mutex<HashSet<String>>>;

/// Holds an agent's in-flight slot; released on drop, including on panic.
struct InFlightSlot {
    in_flight: InFlight,
    agent_name: String,
}

impl InFlightSlot {
    fn claim(in_flight: &InFlight, agent_name: &str) -> Option<Self> {
        let mut agents = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        agents.insert(agent_name.to_string()).then(|| Self {
            in_flight: Arc::clone(in_flight),
            agent_name: agent_name.to_string(),
        })
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        let mut agents = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        agents.remove(&self.agent_name);
    }
}

/// Runs one trading cycle: every agent's pipeline concurrently, one result each.
///
/// Per agent: gate (market hours, daily quota) → quote → decision → execution.
/// A failing or slow agent never affects the others.
pub struct CycleOrchestrator {
    agents: Vec<AgentProfile>,
    cycle: CycleConfig,
    pipeline: Pipeline,
    in_flight: InFlight,
}

impl CycleOrchestrator {
    pub fn new(
        agents: Vec<AgentProfile>,
        cycle: CycleConfig,
        decisions: Arc<dyn DecisionSource>,
        quotes: Arc<dyn QuoteSource>,
        gate: Arc<dyn MarketHoursGate>,
        executor: Arc<TradeExecutor>,
    ) -> Self {
        let decision_timeout = Duration::from_secs(cycle.decision_timeout_seconds);
        Self {
            agents,
            cycle,
            pipeline: Pipeline {
                decisions,
                quotes,
                gate,
                executor,
                decision_timeout,
            },
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn agents(&self) -> &[AgentProfile] {
        &self.agents
    }

    pub fn executor(&self) -> &Arc<TradeExecutor> {
        &self.pipeline.executor
    }

    /// Run the configured roster. `force` skips the market-hours and quota gates.
    pub async fn run_cycle(&self, force: bool) -> CycleReport {
        self.run_cycle_for(&self.agents, force).await
    }

    pub async fn run_cycle_for(&self, agents: &[AgentProfile], force: bool) -> CycleReport {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(cycle = %id, agents = agents.len(), forced = force, "Starting cycle");

        let symbols = self.assign_symbols(agents.len());
        let budget = Duration::from_secs(self.cycle.agent_timeout_seconds);

        // 1. Fan out, one task per agent
        let mut handles = Vec::new();
        let mut results: Vec<Option<AgentCycleResult>> = Vec::with_capacity(agents.len());
        for (agent, symbol) in agents.iter().zip(symbols) {
            let Some(slot) = InFlightSlot::claim(&self.in_flight, &agent.name) else {
                warn!(agent = %agent.name, "Agent still running in another cycle");
                results.push(Some(AgentCycleResult::skipped(
                    &agent.name,
                    &agent.provider,
                    CycleStatus::AlreadyRunning,
                    "Previous cycle still in progress".to_string(),
                )));
                continue;
            };

            let pipeline = self.pipeline.clone();
            let task_agent = agent.clone();
            let task_symbol = symbol.clone();
            let handle = tokio::spawn(async move {
                let _slot = slot;
                let agent_start = Instant::now();
                let outcome = tokio::time::timeout(
                    budget,
                    pipeline.run(&task_agent, task_symbol.as_deref(), force),
                )
                .await;
                (outcome, agent_start.elapsed())
            });
            handles.push((results.len(), agent, symbol, handle));
            results.push(None);
        }

        // 2. Collect every result (graceful degradation)
        for (index, agent, symbol, handle) in handles {
            let result = match handle.await {
                Ok((Ok(mut result), elapsed)) => {
                    result.elapsed_ms = elapsed.as_millis() as u64;
                    info!(
                        agent = %agent.name,
                        status = ?result.status,
                        action = ?result.action,
                        symbol = ?result.symbol,
                        elapsed_ms = result.elapsed_ms,
                        "Agent finished"
                    );
                    result
                }
                Ok((Err(_), elapsed)) => {
                    warn!(
                        agent = %agent.name,
                        elapsed_ms = elapsed.as_millis(),
                        "Agent pipeline timed out"
                    );
                    AgentCycleResult {
                        status: CycleStatus::TimedOut,
                        elapsed_ms: elapsed.as_millis() as u64,
                        ..AgentCycleResult::failed(
                            &agent.name,
                            &agent.provider,
                            symbol.as_deref(),
                            format!("Pipeline exceeded {}s budget", budget.as_secs()),
                        )
                    }
                }
                Err(e) => {
                    error!(agent = %agent.name, error = %e, "Agent task panicked");
                    AgentCycleResult::failed(
                        &agent.name,
                        &agent.provider,
                        symbol.as_deref(),
                        format!("Agent task failed: {e}"),
                    )
                }
            };
            results[index] = Some(result);
        }

        let report = CycleReport {
            id,
            started_at,
            forced: force,
            results: results.into_iter().flatten().collect(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            cycle = %id,
            succeeded = report.count(CycleStatus::Success),
            failed = report.count(CycleStatus::Error),
            elapsed_ms = report.elapsed_ms,
            "Cycle complete"
        );
        report
    }

    /// One symbol per agent. `None` only when the universe is empty.
    fn assign_symbols(&self, count: usize) -> Vec<Option<String>> {
        match &self.cycle.assignment {
            SymbolAssignment::Shared { symbol } => vec![Some(symbol.clone()); count],
            SymbolAssignment::PerAgent => {
                let mut universe: Vec<&String> = self
                    .cycle
                    .universe
                    .iter()
                    .filter(|s| !s.trim().is_empty())
                    .collect();
                if universe.is_empty() {
                    return vec![None; count];
                }
                universe.shuffle(&mut rand::thread_rng());
                (0..count)
                    .map(|i| Some(universe[i % universe.len()].clone()))
                    .collect()
            }
        }
    }
}

impl Pipeline {
    async fn run(
        &self,
        agent: &AgentProfile,
        symbol: Option<&str>,
        force: bool,
    ) -> AgentCycleResult {
        match self.try_run(agent, symbol, force).await {
            Ok(result) => result,
            Err(e) => {
                error!(agent = %agent.name, error = %e, "Agent pipeline failed");
                AgentCycleResult::failed(&agent.name, &agent.provider, symbol, e.to_string())
            }
        }
    }

    async fn try_run(
        &self,
        agent: &AgentProfile,
        symbol: Option<&str>,
        force: bool,
    ) -> Result<AgentCycleResult, AgentError> {
        if !force {
            let market = self.gate.check(Utc::now());
            if !market.is_open {
                info!(agent = %agent.name, reason = %market.reason, "Market closed, skipping");
                return Ok(AgentCycleResult::skipped(
                    &agent.name,
                    &agent.provider,
                    CycleStatus::MarketClosed,
                    market.reason,
                ));
            }
            if self.executor.limit_reached(&agent.name) {
                info!(agent = %agent.name, "Daily trade limit reached, skipping");
                return Ok(AgentCycleResult::skipped(
                    &agent.name,
                    &agent.provider,
                    CycleStatus::LimitReached,
                    format!(
                        "Daily limit of {} trades reached",
                        self.executor.quota().ceiling()
                    ),
                ));
            }
        }

        let symbol =
            symbol.ok_or_else(|| AgentError::Config("symbol universe is empty".to_string()))?;
        let quote = self.quotes.quote(symbol).await;

        let decision = match tokio::time::timeout(
            self.decision_timeout,
            self.decisions.decide(agent, &quote.summary),
        )
        .await
        {
            Ok(Ok(payload)) => Decision::from_payload(&payload),
            Ok(Err(e @ AgentError::Config(_))) => {
                warn!(agent = %agent.name, error = %e, "Decision source misconfigured, holding");
                Decision::hold(format!("System error: {e}"))
            }
            Ok(Err(e)) => {
                warn!(agent = %agent.name, error = %e, "Decision failed, holding");
                Decision::hold(format!("AI Error: {e}"))
            }
            Err(_) => {
                let e = AgentError::Timeout(self.decision_timeout.as_secs());
                warn!(agent = %agent.name, error = %e, "Decision timed out, holding");
                Decision::hold(format!("AI Error: {e}"))
            }
        };

        // No await point from here on: a pipeline timeout cannot split the write.
        let trade = self
            .executor
            .execute_decision(&agent.name, &decision, &quote)?;

        Ok(AgentCycleResult {
            agent_name: agent.name.clone(),
            provider: agent.provider.clone(),
            symbol: Some(quote.symbol.clone()),
            status: trade.status.into(),
            action: Some(trade.action),
            price: Some(quote.price),
            quantity: Some(trade.quantity),
            reason: trade.reason,
            simulated_price: quote.simulated,
            elapsed_ms: 0,
        })
    }
}
