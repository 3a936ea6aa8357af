//! Optional observability helpers for fetch and decorate operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `vouch.op` with the `kind` (credential
//!   strategy) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `vouch_op_total` counter for every attempt/success/failure,
//!   labeled by `kind` + `stage` + `outcome`.
//!
//! These complement the in-process [`EventBus`](crate::events::EventBus), which is always on.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an instrumented operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}

	/// Maps a result into its terminal outcome.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		match result {
			Ok(_) => OpOutcome::Success,
			Err(_) => OpOutcome::Failure,
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
