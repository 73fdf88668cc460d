//! Periodic background task with start/stop control.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tether_worker::{JobClock, JobToken, TaskClass};
use tokio_util::sync::CancellationToken;

use crate::config::TickerConfig;
use crate::notify::Notifier;

/// Ticks forwarded to the notifier; later ticks are only traced.
const NOTIFIED_TICKS: u32 = 3;

struct TickerState {
	running: Mutex<Option<JobToken>>,
	/// Counter of the current (or last) run. Each run gets its own.
	ticks: Mutex<Arc<AtomicU32>>,
}

/// Runs a numbered unit of work every `interval` until stopped.
///
/// The first tick runs as soon as the ticker starts. With `max_ticks` set, the
/// ticker stops itself after that many ticks.
pub struct Ticker {
	name: Arc<str>,
	interval: Duration,
	max_ticks: Option<u32>,
	notifier: Arc<dyn Notifier>,
	clock: JobClock,
	state: Arc<TickerState>,
}

impl Ticker {
	pub fn new(name: impl Into<String>, interval: Duration, max_ticks: Option<u32>, notifier: Arc<dyn Notifier>) -> Self {
		Self {
			name: Arc::from(name.into()),
			interval,
			max_ticks,
			notifier,
			clock: JobClock::new(),
			state: Arc::new(TickerState {
				running: Mutex::new(None),
				ticks: Mutex::new(Arc::default()),
			}),
		}
	}

	pub fn from_config(name: impl Into<String>, config: &TickerConfig, notifier: Arc<dyn Notifier>) -> Self {
		Self::new(name, config.interval(), config.max_ticks, notifier)
	}

	/// Starts ticking from zero. Returns `false` if already running.
	pub fn start(&self) -> bool {
		let (token, ticks) = {
			let mut running = self.state.running.lock();
			if running.is_some() {
				return false;
			}
			let token = JobToken::new(self.clock.next(), CancellationToken::new());
			let ticks = Arc::new(AtomicU32::new(0));
			*running = Some(token.clone());
			*self.state.ticks.lock() = Arc::clone(&ticks);
			(token, ticks)
		};
		tracing::debug!(ticker = %self.name, run = %token.id(), "ticker.start");

		let name = Arc::clone(&self.name);
		let state = Arc::clone(&self.state);
		let notifier = Arc::clone(&self.notifier);
		tether_worker::spawn(TaskClass::Periodic, run_ticks(name, self.interval, self.max_ticks, state, ticks, notifier, token));
		true
	}

	/// Stops ticking. Returns `false` if it was not running.
	pub fn stop(&self) -> bool {
		let Some(token) = self.state.running.lock().take() else {
			return false;
		};
		token.cancel();
		tracing::debug!(ticker = %self.name, run = %token.id(), ticks = self.tick_count(), "ticker.stop");
		true
	}

	pub fn is_running(&self) -> bool {
		self.state.running.lock().is_some()
	}

	/// Ticks performed by the current (or last) run.
	pub fn tick_count(&self) -> u32 {
		self.state.ticks.lock().load(Ordering::Acquire)
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

impl Drop for Ticker {
	fn drop(&mut self) {
		self.stop();
	}
}

async fn run_ticks(name: Arc<str>, interval: Duration, max_ticks: Option<u32>, state: Arc<TickerState>, ticks: Arc<AtomicU32>, notifier: Arc<dyn Notifier>, token: JobToken) {
	loop {
		if token.is_cancelled() {
			break;
		}
		let tick = ticks.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
		let message = format!("{name} task #{tick} completed");
		tracing::info!(ticker = %name, tick, "ticker.tick");
		if tick <= NOTIFIED_TICKS {
			notifier.notify(&message);
		}

		if max_ticks.is_some_and(|max| tick >= max) {
			tracing::info!(ticker = %name, tick, "ticker.finished");
			notifier.notify(&format!("{name} work completed, stopping"));
			break;
		}

		tokio::select! {
			biased;
			_ = token.cancelled() => break,
			_ = tokio::time::sleep(interval) => {}
		}
	}

	let mut running = state.running.lock();
	if running.as_ref().map(JobToken::id) == Some(token.id()) {
		*running = None;
	}
}
