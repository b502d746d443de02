use std::cell::UnsafeCell;
use std::fmt;
use std::mem::{ManuallyDrop, MaybeUninit};
use std::sync::atomic::{AtomicU8, Ordering};

/// Value slot is uninitialized.
const EMPTY: u8 = 0;
/// A caller won the slot and is writing its value.
const COMPUTING: u8 = 1;
/// Value is published and visible to all threads.
const DONE: u8 = 2;

/// Spins before falling back to `thread::yield_now`.
const SPIN_LIMIT: u32 = 64;

/// Thread-safe compute-once value holder.
///
/// Multiple concurrent callers may invoke their factory speculatively, but
/// exactly one computed value is ever stored; every caller observes that one
/// value once it is published. The critical section guarded by the
/// `COMPUTING` state is a single assignment, so contending callers busy-wait
/// with bounded spinning instead of blocking.
///
/// Liveness assumption: the caller that wins the `EMPTY` → `COMPUTING`
/// transition must complete the publish. If that thread is torn down
/// mid-publish the cell stays `COMPUTING` forever and later callers spin
/// indefinitely. This is not detected; factories must terminate.
pub struct LazyCell<T> {
	state: AtomicU8,
	value: UnsafeCell<MaybeUninit<T>>,
}

// The value is written by exactly one thread and read only after the
// release-store of DONE, so sharing is sound under the usual bounds.
unsafe impl<T: Send> Send for LazyCell<T> {}
unsafe impl<T: Send + Sync> Sync for LazyCell<T> {}

impl<T> LazyCell<T> {
	/// Creates an empty cell.
	pub const fn new() -> Self {
		Self {
			state: AtomicU8::new(EMPTY),
			value: UnsafeCell::new(MaybeUninit::uninit()),
		}
	}

	/// Returns the published value, or `None` if no publish happened yet.
	pub fn get(&self) -> Option<&T> {
		if self.state.load(Ordering::Acquire) == DONE {
			// DONE is only stored with release ordering after the write to
			// the slot, so the acquire load above makes the value visible.
			Some(unsafe { self.value_ref() })
		} else {
			None
		}
	}

	/// Returns the published value, computing it with `factory` if the cell
	/// is still empty.
	///
	/// `factory` may run on several threads at once; only the first caller to
	/// claim the slot stores its result, and the losers' values are dropped.
	pub fn initialize(&self, factory: impl FnOnce() -> T) -> &T {
		if let Some(value) = self.get() {
			return value;
		}
		self.publish(factory())
	}

	/// Consumes the cell, returning the value if one was published.
	pub fn into_inner(self) -> Option<T> {
		let mut this = ManuallyDrop::new(self);
		if *this.state.get_mut() == DONE {
			Some(unsafe { this.value.get_mut().assume_init_read() })
		} else {
			None
		}
	}

	fn publish(&self, value: T) -> &T {
		match self.state.compare_exchange(EMPTY, COMPUTING, Ordering::Acquire, Ordering::Relaxed) {
			Ok(_) => {
				// This caller owns the slot.
				unsafe { (*self.value.get()).write(value) };
				self.state.store(DONE, Ordering::Release);
				unsafe { self.value_ref() }
			}
			Err(_) => {
				// Another caller claimed the slot (or already finished);
				// this speculative value loses.
				drop(value);
				self.wait_done()
			}
		}
	}

	fn wait_done(&self) -> &T {
		let mut spins = 0u32;
		while self.state.load(Ordering::Acquire) != DONE {
			if spins < SPIN_LIMIT {
				std::hint::spin_loop();
			} else {
				std::thread::yield_now();
			}
			spins = spins.wrapping_add(1);
		}
		unsafe { self.value_ref() }
	}

	/// Caller must have observed `DONE` with acquire ordering.
	unsafe fn value_ref(&self) -> &T {
		unsafe { (*self.value.get()).assume_init_ref() }
	}
}

impl<T> Default for LazyCell<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Drop for LazyCell<T> {
	fn drop(&mut self) {
		if *self.state.get_mut() == DONE {
			unsafe { self.value.get_mut().assume_init_drop() };
		}
	}
}

impl<T> fmt::Debug for LazyCell<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = match self.state.load(Ordering::Acquire) {
			EMPTY => "empty",
			COMPUTING => "computing",
			_ => "done",
		};
		f.debug_struct("LazyCell").field("state", &state).finish_non_exhaustive()
	}
}
