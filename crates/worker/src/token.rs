use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Identifier of one job started through a [`JobClock`]. Strictly increasing per clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Monotonic job id source. The first id handed out is 1.
#[derive(Debug, Default, Clone)]
pub struct JobClock {
	next: Arc<AtomicU64>,
}

impl JobClock {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn next(&self) -> JobId {
		JobId(self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
	}
}

/// Cancellation token scoped to one job.
#[derive(Debug, Clone)]
pub struct JobToken {
	id: JobId,
	cancel: CancellationToken,
}

impl JobToken {
	pub fn new(id: JobId, cancel: CancellationToken) -> Self {
		Self { id, cancel }
	}

	pub const fn id(&self) -> JobId {
		self.id
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Resolves once the job (or any parent scope) is cancelled.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}
}
