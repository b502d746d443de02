use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::scheduler::RequestQueue;
use crate::{Error, Result};

/// Coordinates graceful server shutdown.
///
/// Exit is routed through the queue's mutating lane, so it runs after every
/// earlier admitted write and before every later one; afterwards the queue
/// drains and rejects further mutating work. Exit before initialization is a
/// protocol error.
pub struct LifecycleManager<C, R> {
	queue: RequestQueue<C, R>,
	initialized: Arc<AtomicBool>,
}

impl<C, R> Clone for LifecycleManager<C, R> {
	fn clone(&self) -> Self {
		Self {
			queue: self.queue.clone(),
			initialized: self.initialized.clone(),
		}
	}
}

impl<C, R> LifecycleManager<C, R>
where
	C: Clone + Send + 'static,
	R: Send + 'static,
{
	/// Creates a manager over the queue it will drain on exit.
	pub fn new(queue: RequestQueue<C, R>) -> Self {
		Self {
			queue,
			initialized: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Marks the server initialized; exit requests are honored afterwards.
	pub fn initialize(&self) {
		tracing::debug!("lifecycle.initialized");
		self.initialized.store(true, Ordering::Release);
	}

	/// Whether the server completed initialization.
	pub fn is_initialized(&self) -> bool {
		self.initialized.load(Ordering::Acquire)
	}

	/// Requests exit without waiting for the drain to finish.
	///
	/// Idempotent once shutdown has begun.
	pub fn request_exit(&self) -> Result<()> {
		if !self.is_initialized() {
			return Err(Error::ExitBeforeInitialize);
		}
		match self.queue.shutdown() {
			Ok(_) => Ok(()),
			// Shutdown already went through the lane.
			Err(Error::AdmissionRejected { .. }) => Ok(()),
			Err(other) => Err(other),
		}
	}

	/// Requests exit and waits until the queue has drained and closed.
	pub async fn exit(&self) -> Result<()> {
		if !self.is_initialized() {
			return Err(Error::ExitBeforeInitialize);
		}
		match self.queue.shutdown() {
			Ok(ack) => {
				// A dropped ack means the queue closed before the control
				// item ran; the terminated watch below still settles.
				let _ = ack.await;
			}
			Err(Error::AdmissionRejected { .. }) => {}
			Err(other) => return Err(other),
		}
		self.queue.wait_terminated().await;
		Ok(())
	}

	/// Observable termination state for the hosting process.
	pub fn terminated(&self) -> watch::Receiver<bool> {
		self.queue.terminated()
	}
}
