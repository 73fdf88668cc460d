//! Single-flight job slot sharing one lock with the state it reads.
//!
//! A [`FlightCell`] owns a value and at most one running job. Starting a job
//! checks and sets the running slot and captures whatever the job needs from
//! the value inside the same critical section, so two starters can never both
//! observe an idle cell. The returned [`FlightGuard`] is the only way to clear
//! the slot; dropping it (including on panic or task cancellation) clears it
//! as well.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::token::{JobClock, JobId, JobToken};

/// Rejection returned by [`FlightCell::try_begin`] while a job is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightBusy {
	/// Job currently holding the slot.
	pub running: JobId,
}

impl fmt::Display for FlightBusy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "job {} is already in flight", self.running)
	}
}

impl std::error::Error for FlightBusy {}

struct FlightState<S> {
	value: S,
	running: Option<JobToken>,
}

/// Guarded state plus a single-flight job slot.
pub struct FlightCell<S> {
	state: Mutex<FlightState<S>>,
	clock: JobClock,
	scope: CancellationToken,
}

impl<S> FlightCell<S> {
	/// Creates a cell with its own cancellation scope.
	pub fn new(value: S) -> Self {
		Self::with_scope(value, CancellationToken::new())
	}

	/// Creates a cell whose job tokens are children of `scope`.
	pub fn with_scope(value: S, scope: CancellationToken) -> Self {
		Self {
			state: Mutex::new(FlightState { value, running: None }),
			clock: JobClock::new(),
			scope,
		}
	}

	/// Runs `f` with shared access to the value.
	pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
		f(&self.state.lock().value)
	}

	/// Runs `f` with the value and the running flag observed atomically.
	pub fn read_with_status<R>(&self, f: impl FnOnce(&S, bool) -> R) -> R {
		let state = self.state.lock();
		f(&state.value, state.running.is_some())
	}

	/// Runs `f` with exclusive access to the value. Never waits on a running job.
	pub fn write<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
		f(&mut self.state.lock().value)
	}

	pub fn is_running(&self) -> bool {
		self.state.lock().running.is_some()
	}

	pub fn current_job(&self) -> Option<JobId> {
		self.state.lock().running.as_ref().map(JobToken::id)
	}

	/// Claims the job slot and captures the job input from the value.
	///
	/// `capture` runs under the cell lock; keep it short.
	pub fn try_begin<T>(self: &Arc<Self>, capture: impl FnOnce(&S) -> T) -> Result<(FlightGuard<S>, T), FlightBusy> {
		let mut state = self.state.lock();
		if let Some(running) = &state.running {
			return Err(FlightBusy { running: running.id() });
		}
		let token = JobToken::new(self.clock.next(), self.scope.child_token());
		state.running = Some(token.clone());
		let input = capture(&state.value);
		drop(state);

		tracing::trace!(job = %token.id(), "worker.flight.begin");
		Ok((
			FlightGuard {
				cell: Arc::clone(self),
				token,
				released: false,
			},
			input,
		))
	}

	/// Cancels the running job, if any. The job still has to release the slot.
	pub fn cancel_current(&self) -> bool {
		let state = self.state.lock();
		match &state.running {
			Some(token) => {
				token.cancel();
				true
			}
			None => false,
		}
	}

	/// Cancels the cell scope: the running job and every job started afterwards.
	pub fn cancel_all(&self) {
		self.scope.cancel();
	}

	pub fn is_closed(&self) -> bool {
		self.scope.is_cancelled()
	}

	fn release(&self, state: &mut FlightState<S>, id: JobId) {
		if state.running.as_ref().map(JobToken::id) == Some(id) {
			state.running = None;
		}
	}
}

impl<S: fmt::Debug> fmt::Debug for FlightCell<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.lock();
		f.debug_struct("FlightCell")
			.field("value", &state.value)
			.field("running", &state.running.as_ref().map(JobToken::id))
			.finish()
	}
}

/// Ownership of the job slot of one [`FlightCell`].
pub struct FlightGuard<S> {
	cell: Arc<FlightCell<S>>,
	token: JobToken,
	released: bool,
}

impl<S> FlightGuard<S> {
	pub fn job_id(&self) -> JobId {
		self.token.id()
	}

	pub fn token(&self) -> &JobToken {
		&self.token
	}

	/// Releases the slot and applies `f` to the value in one critical section.
	pub fn complete<R>(mut self, f: impl FnOnce(&mut S) -> R) -> R {
		let mut state = self.cell.state.lock();
		self.cell.release(&mut state, self.token.id());
		self.released = true;
		f(&mut state.value)
	}

	/// Releases the slot without touching the value.
	pub fn abort(mut self) {
		let mut state = self.cell.state.lock();
		self.cell.release(&mut state, self.token.id());
		self.released = true;
	}
}

impl<S> fmt::Debug for FlightGuard<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FlightGuard")
			.field("job", &self.token.id())
			.field("released", &self.released)
			.finish()
	}
}

impl<S> Drop for FlightGuard<S> {
	fn drop(&mut self) {
		if self.released {
			return;
		}
		tracing::debug!(job = %self.token.id(), "worker.flight.release_on_drop");
		let mut state = self.cell.state.lock();
		self.cell.release(&mut state, self.token.id());
	}
}
