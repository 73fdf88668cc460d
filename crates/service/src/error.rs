/// Errors surfaced by the worker service and its sessions.
///
/// None of these are fatal to the hosting process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
	/// `process_async` was called while a job is running. Retry later.
	#[error("service is already processing data")]
	AlreadyProcessing,
	/// The running job was cancelled or its worker failed. The store is unchanged.
	#[error("processing was interrupted: {0}")]
	ProcessingInterrupted(String),
	/// The session handle was detached or the service was torn down.
	#[error("session is not attached")]
	NotAttached,
}

impl ServiceError {
	/// Returns `true` when retrying the same call later can succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::AlreadyProcessing | Self::ProcessingInterrupted(_))
	}
}
