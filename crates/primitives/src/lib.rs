//! Compute-once concurrency primitives shared across scribe crates.

mod lazy;

pub use lazy::LazyCell;
