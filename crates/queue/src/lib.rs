//! Request execution queue for a language-service backend.
//!
//! Inbound operations become queue items carrying a method name, a
//! mutates-state flag, a cancellation token, and a result future. The
//! [`RequestQueue`] admits items in arrival order under a reader/writer
//! discipline: at most one mutating item executes at a time and acts as a
//! full barrier relative to arrival order, while read items between two
//! mutating boundaries run concurrently. Handlers never need their own
//! locks on shared state; each mutating item produces the next immutable
//! state that later items observe.
//!
//! [`LifecycleManager`] drives graceful shutdown through the same mutating
//! lane, and [`HandlerRegistry`] maps method names to statically-registered
//! handlers.

mod item;
mod lifecycle;
mod registry;
mod scheduler;

pub use item::{BoxError, ResponseFuture};
pub use lifecycle::LifecycleManager;
pub use registry::{HandlerRegistry, RequestHandler};
pub use scheduler::RequestQueue;

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The queue refused the item: mutating work after shutdown began, or
	/// any work after the queue closed.
	#[error("request '{method}' rejected: queue is shutting down")]
	AdmissionRejected {
		/// Method name of the rejected item.
		method: String,
	},
	/// The item's cancellation token fired and the item unwound
	/// cooperatively.
	#[error("request was cancelled")]
	Cancelled,
	/// The handler failed or panicked. Captured per item; the queue
	/// continues.
	#[error("handler fault: {0}")]
	Fault(String),
	/// Queue items must carry a non-empty method name.
	#[error("method name must not be empty")]
	EmptyMethodName,
	/// No handler is registered for the method.
	#[error("no handler registered for method '{0}'")]
	UnknownMethod(String),
	/// Exit was requested before the server was initialized.
	#[error("exit requested before initialize")]
	ExitBeforeInitialize,
}
