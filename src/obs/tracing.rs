// self
use crate::{_prelude::*, events::CredentialKind};

/// Future returned by [`OpSpan::instrument`]; the bare future when `tracing` is off.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`OpSpan::instrument`]; the bare future when `tracing` is off.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// `vouch.op` span covering one fetch, strategy decoration, or chain run.
///
/// The credential kind and call-site stage are kept even without the `tracing` feature so the
/// span still identifies the operation in `Debug` output.
#[derive(Clone, Debug)]
pub struct OpSpan {
	kind: CredentialKind,
	stage: &'static str,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens a span for `stage` of the `kind` strategy.
	pub fn new(kind: CredentialKind, stage: &'static str) -> Self {
		Self {
			kind,
			stage,
			#[cfg(feature = "tracing")]
			span: tracing::info_span!("vouch.op", kind = kind.as_str(), stage),
		}
	}

	/// Strategy the span belongs to.
	pub fn kind(&self) -> CredentialKind {
		self.kind
	}

	/// Call site label, such as `fetch`, `decorate`, or `chain`.
	pub fn stage(&self) -> &'static str {
		self.stage
	}

	/// Runs `fut` inside the span; the span is entered on every poll, never across an `.await`.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::FetchError;

	#[test]
	fn labels_survive_without_subscriber() {
		let span = OpSpan::new(CredentialKind::Basic, "decorate");

		assert_eq!(span.kind(), CredentialKind::Basic);
		assert_eq!(span.stage(), "decorate");
		assert!(format!("{span:?}").contains("decorate"));
	}

	#[tokio::test]
	async fn instrumented_fetch_keeps_its_result() {
		let span = OpSpan::new(CredentialKind::OAuth2, "fetch");
		let ok = span.instrument(async { Ok::<_, FetchError>("token") }).await;
		let err = span
			.instrument(async {
				Err::<&str, _>(FetchError::TokenEndpoint {
					message: "unavailable".into(),
					status: Some(503),
					retry_after: None,
				})
			})
			.await;

		assert_eq!(ok.ok(), Some("token"));
		assert!(matches!(err, Err(FetchError::TokenEndpoint { status: Some(503), .. })));
	}
}
