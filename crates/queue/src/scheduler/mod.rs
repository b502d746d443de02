//! Admission and dispatch of queue items.
//!
//! Items are admitted in arrival (FIFO) order from a single ordering
//! structure:
//!
//! * a **read** item is admitted as soon as it reaches the head and no
//!   earlier-arrived mutating item is still pending or running; reads run
//!   concurrently with each other on a task set;
//! * a **mutating** item is admitted only once every earlier item has
//!   reached a terminal state, and while running it blocks admission of
//!   everything behind it.
//!
//! Mutating items therefore execute strictly in arrival order and act as
//! full barriers; FIFO arrival order is the admission order, not the
//! completion order, for reads. Cancellation is cooperative: a cancelled
//! running mutator still holds the barrier until its handler finishes.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::item::{BoxHandler, QueueItem, Work};
use crate::{BoxError, Error, ResponseFuture, Result};


/// Method name carried by the shutdown control item.
const SHUTDOWN_METHOD: &str = "shutdown";

/// Queue admission phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Phase {
	/// Admitting everything.
	Running = 0,
	/// Shutdown control item has run: draining queued work, rejecting new
	/// mutating work.
	Draining = 1,
	/// Drained: rejecting all work.
	Closed = 2,
}

struct Shared {
	phase: AtomicU8,
	next_id: AtomicU64,
}

impl Shared {
	fn new() -> Self {
		Self {
			phase: AtomicU8::new(Phase::Running as u8),
			next_id: AtomicU64::new(0),
		}
	}

	fn phase(&self) -> Phase {
		match self.phase.load(Ordering::Acquire) {
			0 => Phase::Running,
			1 => Phase::Draining,
			_ => Phase::Closed,
		}
	}

	fn set_phase(&self, phase: Phase) {
		self.phase.store(phase as u8, Ordering::Release);
	}

	fn next_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}
}

/// Handle to a running request queue.
///
/// Cheap to clone; all clones feed the same dispatcher. Dropping every
/// clone closes the queue once in-flight work finishes.
pub struct RequestQueue<C, R> {
	tx: mpsc::UnboundedSender<QueueItem<C, R>>,
	shared: Arc<Shared>,
	terminated: watch::Receiver<bool>,
}

impl<C, R> Clone for RequestQueue<C, R> {
	fn clone(&self) -> Self {
		Self {
			tx: self.tx.clone(),
			shared: self.shared.clone(),
			terminated: self.terminated.clone(),
		}
	}
}

impl<C, R> RequestQueue<C, R>
where
	C: Clone + Send + 'static,
	R: Send + 'static,
{
	/// Starts a queue over `context` and spawns its dispatcher.
	///
	/// `context` is cloned into every admitted item's handler; it is
	/// expected to be a cheap handle (an `Arc` of the shared state). Must
	/// be called within a Tokio runtime.
	pub fn start(context: C) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let (terminated_tx, terminated_rx) = watch::channel(false);
		let shared = Arc::new(Shared::new());

		let dispatcher = Dispatcher {
			context,
			rx,
			pending: VecDeque::new(),
			reads: JoinSet::new(),
			shared: shared.clone(),
			draining: false,
			input_closed: false,
		};
		tokio::spawn(dispatcher.run(terminated_tx));

		Self {
			tx,
			shared,
			terminated: terminated_rx,
		}
	}

	/// Submits an operation, returning a future for its result.
	///
	/// `handler` is invoked exactly once if the item is admitted, with the
	/// queue context and the item's own token. A handler that observes
	/// cancellation should return an error; the queue reports it as
	/// [`Error::Cancelled`] when the token has fired, and as
	/// [`Error::Fault`] otherwise.
	///
	/// Rejection at enqueue time (closed queue, mutating work while
	/// draining, empty method name) is synchronous; rejection decided later
	/// by the dispatcher resolves through the returned future.
	pub fn enqueue<H, Fut>(&self, method: impl Into<String>, mutates_state: bool, cancel: CancellationToken, handler: H) -> Result<ResponseFuture<R>>
	where
		H: FnOnce(C, CancellationToken) -> Fut + Send + 'static,
		Fut: Future<Output = std::result::Result<R, BoxError>> + Send + 'static,
	{
		let method = method.into();
		if method.is_empty() {
			return Err(Error::EmptyMethodName);
		}
		match self.shared.phase() {
			Phase::Running => {}
			Phase::Draining if !mutates_state => {}
			_ => return Err(Error::AdmissionRejected { method }),
		}

		let id = self.shared.next_id();
		tracing::trace!(id, method = %method, mutates_state, "queue.enqueue");

		let (result_tx, result_rx) = oneshot::channel();
		let handler: BoxHandler<C, R> = Box::new(move |context, token| Box::pin(handler(context, token)));
		let item = QueueItem {
			id,
			method: method.clone(),
			mutates_state,
			cancel,
			work: Work::Request {
				handler,
				result: result_tx,
			},
		};
		self.tx.send(item).map_err(|_| Error::AdmissionRejected { method })?;
		Ok(ResponseFuture::new(result_rx))
	}

	/// Enqueues the shutdown control operation through the mutating lane.
	///
	/// The returned receiver resolves once the control item has run and the
	/// queue has entered its draining phase. Fails with
	/// [`Error::AdmissionRejected`] if shutdown already began.
	pub fn shutdown(&self) -> Result<oneshot::Receiver<()>> {
		if self.shared.phase() != Phase::Running {
			return Err(Error::AdmissionRejected {
				method: SHUTDOWN_METHOD.into(),
			});
		}

		let (ack_tx, ack_rx) = oneshot::channel();
		let item = QueueItem {
			id: self.shared.next_id(),
			method: SHUTDOWN_METHOD.into(),
			mutates_state: true,
			cancel: CancellationToken::new(),
			work: Work::Shutdown { ack: ack_tx },
		};
		self.tx.send(item).map_err(|_| Error::AdmissionRejected {
			method: SHUTDOWN_METHOD.into(),
		})?;
		Ok(ack_rx)
	}

	/// Observable termination state: flips to `true` once the queue has
	/// drained and closed.
	pub fn terminated(&self) -> watch::Receiver<bool> {
		self.terminated.clone()
	}

	/// Waits until the queue has drained and closed.
	pub async fn wait_terminated(&self) {
		let mut terminated = self.terminated.clone();
		while !*terminated.borrow_and_update() {
			if terminated.changed().await.is_err() {
				break;
			}
		}
	}
}

/// Owns the ordering structure and drives admission.
struct Dispatcher<C, R> {
	context: C,
	rx: mpsc::UnboundedReceiver<QueueItem<C, R>>,
	pending: VecDeque<QueueItem<C, R>>,
	/// Concurrently running read items.
	reads: JoinSet<()>,
	shared: Arc<Shared>,
	draining: bool,
	input_closed: bool,
}

impl<C, R> Dispatcher<C, R>
where
	C: Clone + Send + 'static,
	R: Send + 'static,
{
	async fn run(mut self, terminated: watch::Sender<bool>) {
		loop {
			self.pull_arrivals();
			self.admit().await;

			if (self.draining || self.input_closed) && self.pending.is_empty() && self.reads.is_empty() {
				break;
			}

			tokio::select! {
				biased;

				Some(joined) = self.reads.join_next(), if !self.reads.is_empty() => {
					if let Err(error) = joined {
						// The item's result sink was dropped with it, so the
						// caller still observes a fault; the queue continues.
						tracing::error!(%error, "read handler task panicked or was aborted");
					}
				}

				item = self.rx.recv(), if !self.input_closed => match item {
					Some(item) => self.pending.push_back(item),
					None => self.input_closed = true,
				},

				else => break,
			}
		}

		self.close(terminated);
	}

	/// Moves everything already sitting in the channel into the ordering
	/// structure, preserving arrival order.
	fn pull_arrivals(&mut self) {
		loop {
			match self.rx.try_recv() {
				Ok(item) => self.pending.push_back(item),
				Err(TryRecvError::Empty) => break,
				Err(TryRecvError::Disconnected) => {
					self.input_closed = true;
					break;
				}
			}
		}
	}

	/// Runs the admission policy over the head of the queue.
	async fn admit(&mut self) {
		while let Some(head) = self.pending.front() {
			if head.cancel.is_cancelled() {
				if let Some(item) = self.pending.pop_front() {
					item.finish_cancelled();
				}
				continue;
			}

			if head.mutates_state {
				if self.draining {
					if let Some(item) = self.pending.pop_front() {
						item.finish_rejected();
					}
					continue;
				}
				if !self.reads.is_empty() {
					// Barrier: earlier-admitted reads are still running.
					return;
				}
				if let Some(item) = self.pending.pop_front() {
					self.run_mutating(item).await;
					// Items that arrived during the mutating run slot in
					// behind the ones already ordered.
					self.pull_arrivals();
				}
				continue;
			}

			if let Some(item) = self.pending.pop_front() {
				self.spawn_read(item);
			}
		}
	}

	/// Runs one mutating item to a terminal state, holding the lane.
	async fn run_mutating(&mut self, item: QueueItem<C, R>) {
		let QueueItem { id, method, cancel, work, .. } = item;
		match work {
			Work::Shutdown { ack } => {
				tracing::info!(id, "queue.draining");
				self.draining = true;
				self.shared.set_phase(Phase::Draining);
				let _ = ack.send(());
			}
			Work::Request { handler, result } => {
				tracing::debug!(id, method = %method, "queue.admit_mutating");
				let context = self.context.clone();
				let task = tokio::spawn(run_handler(context, cancel, handler, result));
				// Cancellation is advisory: a cancelled mutator keeps the
				// barrier until the handler actually finishes.
				if let Err(error) = task.await {
					tracing::error!(id, method = %method, %error, "mutating handler task panicked or was aborted");
				}
			}
		}
	}

	/// Admits one read item into the concurrent task set.
	fn spawn_read(&mut self, item: QueueItem<C, R>) {
		let QueueItem { id, method, cancel, work, .. } = item;
		match work {
			Work::Request { handler, result } => {
				tracing::trace!(id, method = %method, "queue.admit_read");
				let context = self.context.clone();
				self.reads.spawn(run_handler(context, cancel, handler, result));
			}
			Work::Shutdown { .. } => unreachable!("shutdown control item is always mutating"),
		}
	}

	/// Transitions to `Closed` and rejects anything that raced the close.
	fn close(mut self, terminated: watch::Sender<bool>) {
		self.shared.set_phase(Phase::Closed);
		self.rx.close();
		while let Ok(item) = self.rx.try_recv() {
			item.finish_rejected();
		}
		for item in self.pending.drain(..) {
			item.finish_rejected();
		}
		tracing::info!("queue.closed");
		let _ = terminated.send(true);
	}
}

/// Executes one admitted item's handler and delivers its terminal state.
async fn run_handler<C, R>(context: C, cancel: CancellationToken, handler: BoxHandler<C, R>, result: oneshot::Sender<std::result::Result<R, Error>>) {
	let outcome = match handler(context, cancel.clone()).await {
		Ok(value) => Ok(value),
		Err(_) if cancel.is_cancelled() => Err(Error::Cancelled),
		Err(error) => Err(Error::Fault(error.to_string())),
	};
	// The caller may have dropped its future; delivery is best-effort.
	let _ = result.send(outcome);
}
