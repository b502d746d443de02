use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::Error;

/// Error type handlers may fail with; mapped into [`Error::Fault`] or
/// [`Error::Cancelled`] depending on the item's token.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type HandlerFuture<R> = Pin<Box<dyn Future<Output = Result<R, BoxError>> + Send>>;
pub(crate) type BoxHandler<C, R> = Box<dyn FnOnce(C, CancellationToken) -> HandlerFuture<R> + Send>;

/// The work a queue item performs once admitted.
pub(crate) enum Work<C, R> {
	/// An inbound request with its handler and result sink.
	Request {
		handler: BoxHandler<C, R>,
		result: oneshot::Sender<Result<R, Error>>,
	},
	/// The distinguished shutdown control operation. Routed through the
	/// mutating lane so it runs after all earlier writes and before all
	/// later ones.
	Shutdown { ack: oneshot::Sender<()> },
}

/// The unit of work submitted to the scheduler.
///
/// Immutable after creation except for cancellation and result delivery.
/// Conceptually each item moves `Pending -> Admitted -> Running ->
/// Completed | Cancelled | Faulted`; terminal states are delivered through
/// the result sink.
pub(crate) struct QueueItem<C, R> {
	pub id: u64,
	pub method: String,
	pub mutates_state: bool,
	pub cancel: CancellationToken,
	pub work: Work<C, R>,
}

impl<C, R> QueueItem<C, R> {
	/// Retires a pending item whose token fired before admission. No side
	/// effects: the handler never runs.
	pub fn finish_cancelled(self) {
		tracing::debug!(id = self.id, method = %self.method, "queue.cancel_pending");
		if let Work::Request { result, .. } = self.work {
			let _ = result.send(Err(Error::Cancelled));
		}
	}

	/// Retires an item the queue refuses to admit.
	pub fn finish_rejected(self) {
		tracing::debug!(id = self.id, method = %self.method, "queue.reject");
		match self.work {
			Work::Request { result, .. } => {
				let _ = result.send(Err(Error::AdmissionRejected { method: self.method }));
			}
			Work::Shutdown { ack } => drop(ack),
		}
	}
}

/// Future side of a queue item's result sink.
///
/// Resolves to the handler's result, a cancellation indication, or a fault.
/// A faulted item is distinct from a successful empty result, so callers can
/// tell "no answer" from "failed to compute".
pub struct ResponseFuture<R> {
	rx: oneshot::Receiver<Result<R, Error>>,
}

impl<R> ResponseFuture<R> {
	pub(crate) fn new(rx: oneshot::Receiver<Result<R, Error>>) -> Self {
		Self { rx }
	}
}

impl<R> Future for ResponseFuture<R> {
	type Output = Result<R, Error>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match ready!(Pin::new(&mut self.rx).poll(cx)) {
			Ok(outcome) => Poll::Ready(outcome),
			// Sender dropped without a result: the handler task panicked or
			// the queue was torn down mid-flight.
			Err(_) => Poll::Ready(Err(Error::Fault("handler task ended without delivering a result".into()))),
		}
	}
}

impl<R> std::fmt::Debug for ResponseFuture<R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ResponseFuture").finish_non_exhaustive()
	}
}
