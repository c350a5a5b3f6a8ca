//! The synchronous products frame and its nested resolve.
//!
//! A `ShellStage` is mounted for one set of raw parameters. Mounting spawns the
//! resolve and returns at once; the frame renders from whatever state the
//! resolve has reached. Dropping the stage aborts a resolve still in flight.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, info_span, warn};

use crate::application::logic::{LogicStage, RenderPayload, ResolveError};
use crate::application::params::RawParams;
use crate::presentation::products::render_products;
use crate::presentation::views::{
    ProductsFailedTemplate, ProductsLoadingTemplate, TemplateRenderError, render_fragment,
};

const METRIC_RESOLVE_FAILED: &str = "vitrine_resolve_failed_total";

#[derive(Debug, Clone)]
pub enum ResolveState {
    Pending,
    Resolved(Arc<RenderPayload>),
    Failed(Arc<ResolveError>),
}

impl ResolveState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Render the slot for this state. Pure: no I/O, no awaiting.
    ///
    /// Failures render a fixed message; error details stay in the logs.
    pub fn render(&self) -> Result<String, TemplateRenderError> {
        match self {
            Self::Pending => render_fragment(
                ProductsLoadingTemplate::new(),
                "application::shell::ResolveState::render",
            ),
            Self::Resolved(payload) => render_products(payload),
            Self::Failed(_) => render_fragment(
                ProductsFailedTemplate,
                "application::shell::ResolveState::render",
            ),
        }
    }
}

pub struct ShellStage {
    raw: RawParams,
    state: watch::Receiver<ResolveState>,
    task: JoinHandle<()>,
}

impl ShellStage {
    /// Register the resolve for `raw` and return immediately in `Pending`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn mount(logic: LogicStage, raw: RawParams) -> Self {
        let (tx, state) = watch::channel(ResolveState::Pending);
        let span = info_span!("shell_resolve", raw = %raw);
        let task_raw = raw.clone();

        let task = tokio::spawn(
            async move {
                let next = match logic.resolve(&task_raw).await {
                    Ok(payload) => ResolveState::Resolved(Arc::new(payload)),
                    Err(err) => {
                        counter!(METRIC_RESOLVE_FAILED).increment(1);
                        warn!(error = %err, "products resolve failed");
                        ResolveState::Failed(Arc::new(err))
                    }
                };
                tx.send_replace(next);
            }
            .instrument(span),
        );

        Self { raw, state, task }
    }

    pub fn raw_params(&self) -> &RawParams {
        &self.raw
    }

    pub fn state(&self) -> ResolveState {
        self.state.borrow().clone()
    }

    pub fn render(&self) -> Result<String, TemplateRenderError> {
        self.state.borrow().render()
    }

    /// Wait for the terminal state. Resolved and failed are exclusive and
    /// each is reached at most once.
    pub async fn settled(&mut self) -> ResolveState {
        match self.state.wait_for(|state| !state.is_pending()).await {
            Ok(state) => state.clone(),
            Err(_) => ResolveState::Failed(Arc::new(ResolveError::Abandoned)),
        }
    }
}

impl Drop for ShellStage {
    fn drop(&mut self) {
        self.task.abort();
    }
}
