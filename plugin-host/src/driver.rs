//! Import cycle driver.
//!
//! Runs a plugin's ordered stages for one tick: seeds a fresh cursor,
//! invokes the current stage page by page, advances on completion, and
//! hands control back to the caller once the time or payload budget is
//! spent. The caller persists the returned cursor and calls again until it
//! comes back empty.

use crate::host::HostApi;
use crate::page::ImportCursor;
use crate::problem::{ProblemLevel, ProblemTable, StageError};
use crate::stage::{ResultBuffer, Stage, StageContext};
use anyhow::{bail, Context, Result};
use pluginkit::{ApiLimits, Edge, ImportPayload, PluginConfig, RunBudget, Vertex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where an import stands, derived from its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    /// No cursor yet (or the previous import completed)
    NotStarted,
    /// Stage `i` resumes on the next invocation
    Active(usize),
    /// Every stage has finished
    Complete,
}

/// Result of one stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// More pages remain
    Pending,
    /// No more pages for this import
    Finished,
    /// The invocation failed and was reported
    Failed,
}

/// What a failed stage does to the stage index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep the index; the stage is retried from its cursor next tick
    #[default]
    Stay,
    /// Treat the failure like completion and move on for good
    Advance,
}

impl ImportState {
    /// Reads the state a cursor is in.
    ///
    /// A cursor that claims to be initialized but has no usable stage index,
    /// or one pointing past the stage list, is malformed.
    pub fn from_cursor(cursor: &ImportCursor, stage_count: usize) -> Result<Self> {
        if !cursor.is_initialized() {
            return Ok(ImportState::NotStarted);
        }
        let index = cursor
            .stage_index()
            .context("Paging context has no valid stageIndex")?;
        if index >= stage_count {
            bail!(
                "Paging context stageIndex {} is out of range for {} stages",
                index,
                stage_count
            );
        }
        Ok(ImportState::Active(index))
    }

    /// `NotStarted → Active(0)`, or straight to `Complete` with no stages.
    pub fn begin(self, stage_count: usize) -> Self {
        match self {
            ImportState::NotStarted if stage_count == 0 => ImportState::Complete,
            ImportState::NotStarted => ImportState::Active(0),
            other => other,
        }
    }

    /// Applies one stage outcome. `NotStarted` and `Complete` do not react
    /// to stage outcomes.
    pub fn advance(self, outcome: StageOutcome, stage_count: usize, policy: FailurePolicy) -> Self {
        let ImportState::Active(index) = self else {
            return self;
        };
        let moves_on = match outcome {
            StageOutcome::Pending => false,
            StageOutcome::Finished => true,
            StageOutcome::Failed => policy == FailurePolicy::Advance,
        };
        if !moves_on {
            ImportState::Active(index)
        } else if index + 1 >= stage_count {
            ImportState::Complete
        } else {
            ImportState::Active(index + 1)
        }
    }
}

/// Why a tick handed control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEnd {
    /// All stages finished; the returned cursor is empty
    Complete,
    /// Elapsed time reached the budget
    ElapsedBudget,
    /// Serialized payload reached the budget
    PayloadBudget,
    /// A stage asked for a delay the budget could not absorb
    RateLimited,
    /// A stage failed and keeps its position for the next tick
    StageFailed,
}

/// Payload returned to the caller of a tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    #[serde(rename = "pagingContext")]
    pub paging_context: ImportCursor,
}

impl ImportResult {
    /// An empty paging context means nothing is left to import.
    pub fn is_complete(&self) -> bool {
        self.paging_context.is_empty()
    }

    /// Serialized size in bytes, as measured against the payload budget.
    pub fn serialized_len(&self) -> Result<usize> {
        serialized_len(&self.vertices, &self.edges, &self.paging_context)
    }

    pub fn into_payload(self) -> (ImportPayload, ImportCursor) {
        (
            ImportPayload {
                vertices: self.vertices,
                edges: self.edges,
            },
            self.paging_context,
        )
    }
}

/// Bookkeeping for one tick, for logs and scheduler status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub end: TickEnd,
    /// Stage invocations made during the tick
    pub invocations: usize,
    /// Stage index at the start of the tick (`None` if there were no stages)
    pub first_stage: Option<usize>,
    pub elapsed: Duration,
    pub payload_bytes: usize,
}

/// Output of [`ImportDriver::run_tick`].
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub result: ImportResult,
    pub summary: TickSummary,
}

/// Drives an ordered list of stages across ticks.
pub struct ImportDriver {
    name: String,
    stages: Vec<Box<dyn Stage>>,
    initial_values: Map<String, Value>,
    default_api_limits: ApiLimits,
    problems: ProblemTable,
    policy: FailurePolicy,
}

impl ImportDriver {
    pub fn new(name: impl Into<String>, stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            name: name.into(),
            stages,
            initial_values: Map::new(),
            default_api_limits: ApiLimits::default(),
            problems: ProblemTable::default(),
            policy: FailurePolicy::default(),
        }
    }

    /// Values seeded into the cursor on the first tick of an import.
    pub fn with_initial_values(mut self, initial_values: Map<String, Value>) -> Self {
        self.initial_values = initial_values;
        self
    }

    /// Page sizes used unless `testSettings.apiLimits` overrides them.
    pub fn with_api_limits(mut self, limits: ApiLimits) -> Self {
        self.default_api_limits = limits;
        self
    }

    pub fn with_problem_table(mut self, problems: ProblemTable) -> Self {
        self.problems = problems;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Runs one tick.
    ///
    /// # Arguments
    /// * `config` - plugin configuration (budgets and api limits are read
    ///   from its `testSettings`)
    /// * `cursor` - paging context returned by the previous tick, or empty
    /// * `host` - report channel
    ///
    /// # Errors
    /// Fails on a malformed cursor, when a fatal problem is reported through
    /// the host, or when the payload cannot be serialized. Classified stage
    /// failures do not fail the tick.
    pub async fn run_tick(
        &self,
        config: &PluginConfig,
        mut cursor: ImportCursor,
        host: &dyn HostApi,
    ) -> Result<TickOutcome> {
        let start = Instant::now();
        let mut results = ResultBuffer::new();

        if self.stages.is_empty() {
            debug!(plugin = %self.name, "No import stages, import complete");
            cursor.clear();
            let result = ImportResult {
                paging_context: cursor,
                ..ImportResult::default()
            };
            let payload_bytes = result.serialized_len()?;
            return Ok(TickOutcome {
                result,
                summary: TickSummary {
                    end: TickEnd::Complete,
                    invocations: 0,
                    first_stage: None,
                    elapsed: start.elapsed(),
                    payload_bytes,
                },
            });
        }

        let stage_count = self.stages.len();
        let mut state = ImportState::from_cursor(&cursor, stage_count)?;
        if state == ImportState::NotStarted {
            cursor.seed(&self.initial_values);
            state = state.begin(stage_count);
        }
        let ImportState::Active(mut index) = state else {
            bail!("Import for plugin '{}' has no active stage", self.name);
        };
        let first_stage = index;

        let api_limits = self
            .default_api_limits
            .clone()
            .with_overrides(config.api_limit_overrides());
        let budget: RunBudget = config.budget();

        debug!(
            plugin = %self.name,
            stage = index,
            api_limits = %api_limits,
            max_elapsed_ms = budget.max_elapsed.as_millis() as u64,
            max_payload_size = budget.max_payload_bytes,
            "importObjects starts"
        );

        let mut invocations = 0;
        let mut payload_bytes;
        let mut elapsed;

        let end = loop {
            let stage = &self.stages[index];

            let (outcome, delay) = {
                let mut ctx =
                    StageContext::new(config, &api_limits, host, &mut cursor, &mut results);
                let outcome = match stage.run(&mut ctx).await {
                    Ok(true) => StageOutcome::Finished,
                    Ok(false) => StageOutcome::Pending,
                    Err(err) => {
                        self.report_problem(&err, stage.name(), host)?;
                        StageOutcome::Failed
                    }
                };
                (outcome, ctx.requested_delay())
            };
            invocations += 1;

            state = state.advance(outcome, stage_count, self.policy);
            match state {
                ImportState::Complete => {
                    // No further budget checks needed once the import is done
                    cursor.clear();
                    elapsed = start.elapsed();
                    payload_bytes = serialized_len(results.vertices(), results.edges(), &cursor)?;
                    break TickEnd::Complete;
                }
                ImportState::Active(next) if next != index => {
                    index = next;
                    cursor.set_stage_index(index);
                }
                _ => {}
            }

            elapsed = start.elapsed();
            payload_bytes = serialized_len(results.vertices(), results.edges(), &cursor)?;

            if outcome == StageOutcome::Failed && self.policy == FailurePolicy::Stay {
                break TickEnd::StageFailed;
            }

            if let Some(delay) = delay {
                if elapsed.saturating_add(delay) < budget.max_elapsed
                    && payload_bytes < budget.max_payload_bytes
                {
                    debug!(
                        plugin = %self.name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        delay_ms = delay.as_millis() as u64,
                        "importObjects rate limited, delaying"
                    );
                    tokio::time::sleep(delay).await;
                    elapsed = start.elapsed();
                } else {
                    debug!(
                        plugin = %self.name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "importObjects rate limited, ending page early"
                    );
                    break TickEnd::RateLimited;
                }
            }

            debug!(
                plugin = %self.name,
                elapsed_ms = elapsed.as_millis() as u64,
                payload_bytes = payload_bytes,
                "importObjects looping"
            );

            if elapsed >= budget.max_elapsed {
                break TickEnd::ElapsedBudget;
            }
            if payload_bytes >= budget.max_payload_bytes {
                break TickEnd::PayloadBudget;
            }
        };

        let (vertices, edges) = results.into_parts();
        info!(
            plugin = %self.name,
            end = ?end,
            invocations = invocations,
            vertices = vertices.len(),
            edges = edges.len(),
            payload_bytes = payload_bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            "importObjects tick ends"
        );

        Ok(TickOutcome {
            result: ImportResult {
                vertices,
                edges,
                paging_context: cursor,
            },
            summary: TickSummary {
                end,
                invocations,
                first_stage: Some(first_stage),
                elapsed,
                payload_bytes,
            },
        })
    }

    /// Logs or reports a stage failure according to the problem table.
    ///
    /// Fatal problems go through the host's error channel, whose error is
    /// returned so the tick ends.
    fn report_problem(&self, err: &StageError, stage: &str, host: &dyn HostApi) -> Result<()> {
        let problem = self.problems.classify(err, stage);
        match (problem.fatal, problem.level) {
            (true, _) => host.report_error(&problem.message),
            (false, ProblemLevel::Error) => {
                host.report_warning(&problem.message);
                Ok(())
            }
            (false, ProblemLevel::Warning) => {
                warn!(
                    plugin = %self.name,
                    stage = %stage,
                    kind = %err.kind,
                    "{}",
                    problem.message
                );
                Ok(())
            }
        }
    }
}

/// Serialized length of `{vertices, edges, pagingContext}`.
fn serialized_len(vertices: &[Vertex], edges: &[Edge], cursor: &ImportCursor) -> Result<usize> {
    #[derive(Serialize)]
    struct PayloadView<'a> {
        vertices: &'a [Vertex],
        edges: &'a [Edge],
        #[serde(rename = "pagingContext")]
        paging_context: &'a ImportCursor,
    }

    let mut counter = ByteCounter(0);
    serde_json::to_writer(
        &mut counter,
        &PayloadView {
            vertices,
            edges,
            paging_context: cursor,
        },
    )
    .context("Failed to serialize import payload")?;
    Ok(counter.0)
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
