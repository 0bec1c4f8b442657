//! The host-facing entry point
//!
//! The host calls [`SqlObserver::observe`] after every statement with the
//! statement, a provider for fresh connections and the measured execution
//! time. The observer runs the gate and then either analyzes inline or
//! queues the analysis on its worker pool.

use crate::acquirer::{AcquirerRegistry, PlanAcquirer};
use crate::cache::{CacheStats, ResultCache};
use crate::config::{OverflowPolicy, SqlScopeConfig};
use crate::error::{AnalysisError, ConfigError, ObserveError, PoolError};
use crate::gate::DispatchGate;
use crate::pool::WorkerPool;
use crate::sink::{FanOutSink, ReportSink, TracingSink};
use sqlscope_analyzer::{
    AdviceEngine, AnalysisResult, JoinScanRule, LimitRule, MySqlPlanRule, PostgresPlanRule,
    SelectRule, SlowStatementRule, WhereClauseRule,
};
use sqlscope_core::{BoundStatement, ConnectionProvider, DialectTag, placeholders};
use std::sync::Arc;

/// What `observe` did with a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Not analyzed: gate declined, or no acquirer for the dialect
    Skipped,
    /// Analyzed inline and reported
    Completed(Box<AnalysisResult>),
    /// Handed to the worker pool
    Queued,
    /// Queue full; logged and dropped
    Dropped,
}

pub struct ObserverBuilder {
    config: SqlScopeConfig,
    acquirers: AcquirerRegistry,
    sinks: Vec<Arc<dyn ReportSink>>,
    engine: Option<AdviceEngine>,
}

impl ObserverBuilder {
    pub fn new(config: SqlScopeConfig) -> Self {
        Self {
            config,
            acquirers: AcquirerRegistry::standard(),
            sinks: Vec::new(),
            engine: None,
        }
    }

    /// Add a sink; without any, reports go to [`TracingSink`]
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Register or replace the acquirer for its dialect
    pub fn with_acquirer(mut self, acquirer: Arc<dyn PlanAcquirer>) -> Self {
        self.acquirers.register(acquirer);
        self
    }

    pub fn with_acquirers(mut self, acquirers: AcquirerRegistry) -> Self {
        self.acquirers = acquirers;
        self
    }

    /// Use a custom engine instead of the one derived from the rule toggles
    pub fn with_advice_engine(mut self, engine: AdviceEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Validate the configuration and start the worker pool if analysis is
    /// asynchronous; must then be called inside a tokio runtime
    pub fn build(self) -> Result<SqlObserver, ConfigError> {
        let config = self.config;
        config.validate()?;

        let engine = self.engine.unwrap_or_else(|| advice_engine(&config));
        let cache = if config.cache.enabled {
            Some(ResultCache::new(config.cache.resolve()?))
        } else {
            None
        };
        let mut sinks = self.sinks;
        let sink: Arc<dyn ReportSink> = match sinks.len() {
            0 => Arc::new(TracingSink),
            1 => sinks.remove(0),
            _ => Arc::new(FanOutSink::new(sinks)),
        };
        let pool = if config.async_analysis {
            Some(WorkerPool::new(config.pool_size, config.queue_capacity)?)
        } else {
            None
        };

        tracing::info!(
            enabled = config.enabled,
            sample_rate = config.sample_rate,
            threshold_ms = config.threshold_ms,
            async_analysis = config.async_analysis,
            cache = config.cache.enabled,
            rules = ?engine.rule_names(),
            "sqlscope observer ready"
        );

        Ok(SqlObserver {
            gate: DispatchGate::from_config(&config),
            overflow_policy: config.overflow_policy,
            pool,
            context: Arc::new(AnalysisContext {
                acquirers: self.acquirers,
                engine,
                cache,
                sink,
                normalize_key: config.cache.normalize_key,
            }),
        })
    }
}

/// The engine described by the configuration's rule toggles. Plan rules for
/// MySQL and PostgreSQL are always registered.
pub(crate) fn advice_engine(config: &SqlScopeConfig) -> AdviceEngine {
    let rules = config.rules;
    let mut engine = AdviceEngine::new()
        .with_rule(MySqlPlanRule)
        .with_rule(PostgresPlanRule);
    if rules.select {
        engine = engine.with_rule(SelectRule);
    }
    if rules.where_clause {
        engine = engine.with_rule(WhereClauseRule::new(config.allowed_functions()));
    }
    if rules.join {
        engine = engine.with_rule(JoinScanRule);
    }
    if rules.limit {
        engine = engine.with_rule(LimitRule);
    }
    if rules.common {
        engine = engine.with_rule(SlowStatementRule);
    }
    engine
}

pub struct SqlObserver {
    gate: DispatchGate,
    overflow_policy: OverflowPolicy,
    pool: Option<WorkerPool>,
    context: Arc<AnalysisContext>,
}

impl SqlObserver {
    pub fn builder(config: SqlScopeConfig) -> ObserverBuilder {
        ObserverBuilder::new(config)
    }

    pub fn new(config: SqlScopeConfig) -> Result<Self, ConfigError> {
        ObserverBuilder::new(config).build()
    }

    pub fn gate(&self) -> &DispatchGate {
        &self.gate
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.context.cache.as_ref()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache().map(ResultCache::stats)
    }

    /// Observe one executed statement.
    ///
    /// Inline analysis returns its failure to the caller. Queued analysis
    /// logs failures on the worker; only a full queue under
    /// [`OverflowPolicy::Propagate`] or a shut-down pool is returned.
    pub async fn observe(
        &self,
        statement_id: impl Into<String>,
        statement: BoundStatement,
        provider: Arc<dyn ConnectionProvider>,
        execution_time_ms: u64,
    ) -> Result<Outcome, ObserveError> {
        if !self.gate.should_analyze(&statement.sql, execution_time_ms) {
            return Ok(Outcome::Skipped);
        }

        let dialect = provider.dialect();
        if !self.context.acquirers.supports(dialect) {
            tracing::debug!(url = provider.url(), %dialect, "no plan acquirer for dialect, skipping");
            return Ok(Outcome::Skipped);
        }

        let task = AnalysisTask {
            statement_id: statement_id.into(),
            statement,
            provider,
            dialect,
            execution_time_ms,
        };

        let Some(pool) = &self.pool else {
            let result = self.context.run(task).await?;
            return Ok(Outcome::Completed(Box::new(result)));
        };

        let context = self.context.clone();
        let statement_id = task.statement_id.clone();
        let submitted = pool.try_submit(async move {
            if let Err(err) = context.run(task).await {
                tracing::error!(statement_id, error = %err, "SQL analysis failed");
            }
        });

        match submitted {
            Ok(()) => Ok(Outcome::Queued),
            Err(PoolError::Overflow(overflow)) => match self.overflow_policy {
                OverflowPolicy::Log => {
                    tracing::warn!(error = %overflow, "analysis queue full, dropping analysis");
                    Ok(Outcome::Dropped)
                }
                OverflowPolicy::Propagate => Err(ObserveError::Overflow(overflow)),
            },
            Err(_) => Err(ObserveError::PoolClosed),
        }
    }

    /// Stop accepting analyses and wait for queued ones to finish
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown().await;
        }
    }
}

impl std::fmt::Debug for SqlObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlObserver")
            .field("gate", &self.gate)
            .field("overflow_policy", &self.overflow_policy)
            .field("pool", &self.pool)
            .field("engine", &self.context.engine)
            .finish()
    }
}

struct AnalysisTask {
    statement_id: String,
    statement: BoundStatement,
    provider: Arc<dyn ConnectionProvider>,
    dialect: DialectTag,
    execution_time_ms: u64,
}

struct AnalysisContext {
    acquirers: AcquirerRegistry,
    engine: AdviceEngine,
    cache: Option<ResultCache>,
    sink: Arc<dyn ReportSink>,
    normalize_key: bool,
}

impl AnalysisContext {
    #[tracing::instrument(
        skip_all,
        fields(statement_id = %task.statement_id, dialect = %task.dialect)
    )]
    async fn run(&self, task: AnalysisTask) -> Result<AnalysisResult, AnalysisError> {
        let acquirer = self.acquirers.get(task.dialect)?;
        let provider = task.provider.as_ref();
        let statement = &task.statement;

        let mut result = match &self.cache {
            Some(cache) => {
                let key = if self.normalize_key {
                    placeholders::normalize(&statement.sql)
                } else {
                    statement.sql.clone()
                };
                cache
                    .get_or_compute(&key, || acquirer.acquire(provider, statement))
                    .await?
            }
            None => acquirer.acquire(provider, statement).await?,
        };

        result.sql = statement.sql.clone();
        result.execution_time_ms = task.execution_time_ms;
        result.advice = self.engine.generate(&result, task.dialect)?;

        self.sink
            .report(&result, task.dialect, &task.statement_id)
            .await?;
        Ok(result)
    }
}
