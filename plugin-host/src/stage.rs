use crate::host::HostApi;
use crate::page::ImportCursor;
use crate::problem::StageError;
use async_trait::async_trait;
use pluginkit::{ApiLimits, Edge, PluginConfig, Vertex};
use std::time::Duration;

/// One ordered unit of import work, usually one entity type or endpoint.
///
/// The driver calls [`Stage::run`] repeatedly, one page per call, until it
/// reports it is finished. All paging state must live in the cursor
/// (`ctx.page`) since the stage may resume in a later tick, possibly in
/// another process.
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use plugin_host::{Stage, StageContext, StageError};
/// use pluginkit::Vertex;
///
/// struct Hosts;
///
/// #[async_trait]
/// impl Stage for Hosts {
///     fn name(&self) -> &str {
///         "Hosts"
///     }
///
///     async fn run(&self, ctx: &mut StageContext<'_>) -> Result<bool, StageError> {
///         let offset = ctx.page.get_as::<u64>("hostOffset").unwrap_or(0);
///         // fetch one page from the source...
///         ctx.results.push_vertex(Vertex::new(format!("host_{}", offset), "host", "host", "hosts"));
///         ctx.page.set("hostOffset", offset + 1);
///         Ok(offset + 1 >= 10)
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in logs and problem messages (e.g. "Apps").
    fn name(&self) -> &str;

    /// Imports one page.
    ///
    /// # Returns
    /// * `Ok(true)` - no more pages for this import; move to the next stage
    /// * `Ok(false)` - more pages remain; call again
    /// * `Err(...)` - the page failed; the driver classifies and reports it
    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<bool, StageError>;
}

/// Vertices and edges produced during one tick. Append-only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultBuffer {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_vertex(&mut self, vertex: Vertex) {
        self.vertices.push(vertex);
    }

    pub fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn into_parts(self) -> (Vec<Vertex>, Vec<Edge>) {
        (self.vertices, self.edges)
    }
}

/// Everything a stage invocation can see.
///
/// The shared references are fixed for the tick; `page` and `results` are
/// the only state a stage mutates.
pub struct StageContext<'a> {
    /// Plugin instance configuration
    pub config: &'a PluginConfig,
    /// Page sizes per entity type
    pub api_limits: &'a ApiLimits,
    /// Report channel and config patching
    pub host: &'a dyn HostApi,
    /// Paging context persisted between ticks
    pub page: &'a mut ImportCursor,
    /// Output of the current tick
    pub results: &'a mut ResultBuffer,
    rate_limit: Option<Duration>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        config: &'a PluginConfig,
        api_limits: &'a ApiLimits,
        host: &'a dyn HostApi,
        page: &'a mut ImportCursor,
        results: &'a mut ResultBuffer,
    ) -> Self {
        Self {
            config,
            api_limits,
            host,
            page,
            results,
            rate_limit: None,
        }
    }

    /// Asks the driver to wait before the next invocation.
    ///
    /// Honoured only if the tick's budget allows; otherwise the tick ends
    /// early. The last request in an invocation wins.
    pub fn request_delay(&mut self, delay: Duration) {
        self.rate_limit = Some(delay);
    }

    pub fn requested_delay(&self) -> Option<Duration> {
        self.rate_limit
    }
}
