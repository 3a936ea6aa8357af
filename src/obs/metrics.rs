// self
use crate::{events::CredentialKind, obs::OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: CredentialKind, stage: &'static str, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"vouch_op_total",
			"kind" => kind.as_str(),
			"stage" => stage,
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, stage, outcome);
	}
}
