use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use scribe_primitives::LazyCell;
use tokio_util::sync::CancellationToken;

use crate::scheduler::RequestQueue;
use crate::{BoxError, Error, ResponseFuture, Result};

/// Capability interface for one request method.
///
/// Whether a handler mutates shared state is declared here, at registration
/// time, and drives the queue's admission discipline for every item
/// dispatched to it.
#[async_trait]
pub trait RequestHandler<C, R>: Send + Sync {
	/// Whether executions of this handler may change shared document state.
	fn mutates_state(&self) -> bool {
		false
	}

	/// Handles one admitted request.
	async fn execute(&self, context: C, cancel: CancellationToken) -> std::result::Result<R, BoxError>;
}

/// Statically-typed method-to-handler registry.
///
/// Handlers are registered at process start; the lookup table is resolved
/// once, on first dispatch, and reused afterwards. No runtime type scanning.
pub struct HandlerRegistry<C, R> {
	providers: Vec<(String, Arc<dyn RequestHandler<C, R>>)>,
	resolved: LazyCell<HashMap<String, Arc<dyn RequestHandler<C, R>>>>,
}

impl<C, R> Default for HandlerRegistry<C, R>
where
	C: Clone + Send + 'static,
	R: Send + 'static,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<C, R> HandlerRegistry<C, R>
where
	C: Clone + Send + 'static,
	R: Send + 'static,
{
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self {
			providers: Vec::new(),
			resolved: LazyCell::new(),
		}
	}

	/// Registers a handler for `method`. Last registration of a method wins.
	///
	/// All registrations must happen before the first dispatch.
	pub fn register(&mut self, method: impl Into<String>, handler: Arc<dyn RequestHandler<C, R>>) -> &mut Self {
		assert!(self.resolved.get().is_none(), "handlers must be registered before the first dispatch");
		self.providers.push((method.into(), handler));
		self
	}

	/// Looks up the handler for `method`, resolving the provider table on
	/// first use.
	pub fn handler(&self, method: &str) -> Option<Arc<dyn RequestHandler<C, R>>> {
		let table = self.resolved.initialize(|| {
			tracing::debug!(providers = self.providers.len(), "registry.resolve");
			self.providers.iter().cloned().collect()
		});
		table.get(method).cloned()
	}

	/// Enqueues a request for `method` on `queue`.
	pub fn dispatch(&self, queue: &RequestQueue<C, R>, method: &str, cancel: CancellationToken) -> Result<ResponseFuture<R>> {
		let handler = self.handler(method).ok_or_else(|| Error::UnknownMethod(method.to_string()))?;
		let mutates_state = handler.mutates_state();
		queue.enqueue(method, mutates_state, cancel, move |context, token| async move {
			handler.execute(context, token).await
		})
	}
}
