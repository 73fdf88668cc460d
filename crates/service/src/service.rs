//! The worker service: shared record store plus single-flight processing.

use std::sync::Arc;
use std::time::Duration;

use tether_worker::{Dispatcher, FlightCell, FlightGuard, JobId, TaskClass, join_error_panic_message};
use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::notify::Notifier;
use crate::store::{Stats, Store};

/// Result delivered to a processing continuation.
pub type ProcessOutcome = Result<Vec<String>, ServiceError>;

/// Long-lived owner of the record store and its processing job.
///
/// Query and mutation methods run synchronously on the calling thread and take
/// the store lock only for the duration of the call. They never wait for a
/// running processing job.
pub struct WorkerService {
	cell: Arc<FlightCell<Store>>,
	shutdown: CancellationToken,
	processed_prefix: Arc<str>,
	processing_delay: Duration,
	notifier: Arc<dyn Notifier>,
}

impl WorkerService {
	/// Creates a service whose store is seeded from `config`.
	pub fn new(config: &ServiceConfig, notifier: Arc<dyn Notifier>) -> Self {
		let service = Self::unannounced(config, notifier);
		service.announce();
		service
	}

	/// Builds the service without notifying, for callers that hold a lock.
	pub(crate) fn unannounced(config: &ServiceConfig, notifier: Arc<dyn Notifier>) -> Self {
		let shutdown = CancellationToken::new();
		let store = Store::seeded(config.seed.iter().cloned());
		Self {
			cell: Arc::new(FlightCell::with_scope(store, shutdown.child_token())),
			shutdown,
			processed_prefix: Arc::from(config.processed_prefix.as_str()),
			processing_delay: config.processing_delay(),
			notifier,
		}
	}

	pub(crate) fn announce(&self) {
		let seeded = self.count();
		tracing::debug!(records = seeded, "service.created");
		self.notifier.notify(&format!("Worker service initialized with {seeded} items"));
	}

	pub fn add(&self, record: impl Into<String>) {
		let record = record.into();
		let total = self.cell.write(|store| {
			store.add(record.clone());
			store.count()
		});
		tracing::debug!(record = %record, total, "service.add");
		self.notifier.notify(&format!("Data added: {record} (Total: {total})"));
	}

	/// Removes the first record equal to `record`. `false` means nothing matched.
	pub fn remove(&self, record: &str) -> bool {
		let removed = self.cell.write(|store| store.remove(record).then(|| store.count()));
		match removed {
			Some(total) => {
				tracing::debug!(record, total, "service.remove");
				self.notifier.notify(&format!("Data removed: {record} (Total: {total})"));
				true
			}
			None => {
				tracing::trace!(record, "service.remove.not_found");
				false
			}
		}
	}

	pub fn clear(&self) {
		let cleared = self.cell.write(Store::clear);
		tracing::debug!(cleared, "service.clear");
		self.notifier.notify(&format!("Cleared {cleared} items"));
	}

	pub fn list(&self) -> Vec<String> {
		self.cell.read(Store::list)
	}

	pub fn search(&self, query: &str) -> Vec<String> {
		let results = self.cell.read(|store| store.search(query));
		tracing::debug!(query, results = results.len(), "service.search");
		results
	}

	pub fn count(&self) -> usize {
		self.cell.read(Store::count)
	}

	pub fn operation_count(&self) -> u64 {
		self.cell.read(Store::operation_count)
	}

	pub fn is_processing(&self) -> bool {
		self.cell.is_running()
	}

	pub fn stats(&self) -> Stats {
		self.cell.read_with_status(Stats::of)
	}

	/// Starts transforming a snapshot of the store on a worker task.
	///
	/// `on_result` is called exactly once. When a job is already running it is
	/// called synchronously on this thread with [`ServiceError::AlreadyProcessing`]
	/// and the same error is returned. Otherwise it is posted through
	/// `dispatcher` once the job finishes, so it runs on the dispatcher's home
	/// context; if that context is gone by then the result is dropped.
	///
	/// Mutations made after this returns are not visible to the job.
	pub fn process_async<F>(&self, dispatcher: &Dispatcher, on_result: F) -> Result<JobId, ServiceError>
	where
		F: FnOnce(ProcessOutcome) + Send + 'static,
	{
		let (guard, snapshot) = match self.cell.try_begin(Store::list) {
			Ok(begun) => begun,
			Err(busy) => {
				tracing::debug!(running = %busy.running, "service.process.rejected");
				on_result(Err(ServiceError::AlreadyProcessing));
				return Err(ServiceError::AlreadyProcessing);
			}
		};

		let job = guard.job_id();
		tracing::info!(job = %job, records = snapshot.len(), "service.process.start");
		self.notifier.notify("Starting async data processing...");

		let run = ProcessRun {
			guard,
			snapshot,
			prefix: Arc::clone(&self.processed_prefix),
			delay: self.processing_delay,
			notifier: Arc::clone(&self.notifier),
		};
		let dispatcher = dispatcher.clone();
		tether_worker::spawn(TaskClass::Background, async move {
			let outcome = run.execute().await;
			if !dispatcher.post(move || on_result(outcome)) {
				tracing::debug!(job = %job, home = dispatcher.home_name(), "service.process.undelivered");
			}
		});
		Ok(job)
	}

	/// Interrupts the running job, if any. It reports `ProcessingInterrupted`.
	pub fn cancel_processing(&self) -> bool {
		let cancelled = self.cell.cancel_current();
		if cancelled {
			tracing::debug!("service.process.cancel_requested");
		}
		cancelled
	}

	/// Interrupts the running job and every job started afterwards.
	pub fn shutdown(&self) {
		if self.shutdown.is_cancelled() {
			return;
		}
		self.shutdown.cancel();
		tracing::debug!(processing = self.is_processing(), "service.shutdown");
	}

	pub fn is_shut_down(&self) -> bool {
		self.shutdown.is_cancelled()
	}
}

impl Drop for WorkerService {
	fn drop(&mut self) {
		self.shutdown();
		tracing::debug!("service.destroyed");
		self.notifier.notify("Worker service destroyed");
	}
}

impl std::fmt::Debug for WorkerService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorkerService").field("stats", &self.stats()).finish_non_exhaustive()
	}
}

/// One processing job, moved onto the worker task.
struct ProcessRun {
	guard: FlightGuard<Store>,
	snapshot: Vec<String>,
	prefix: Arc<str>,
	delay: Duration,
	notifier: Arc<dyn Notifier>,
}

impl ProcessRun {
	async fn execute(self) -> ProcessOutcome {
		let Self {
			guard,
			snapshot,
			prefix,
			delay,
			notifier,
		} = self;
		let token = guard.token().clone();
		let job = guard.job_id();

		let work = async move {
			if !delay.is_zero() {
				tokio::time::sleep(delay).await;
			}
			tether_worker::spawn_blocking(TaskClass::CpuBlocking, move || transform(&snapshot, &prefix)).await
		};

		let result = tokio::select! {
			biased;
			_ = token.cancelled() => Err("job cancelled".to_string()),
			joined = work => joined.map_err(|err| match join_error_panic_message(err) {
				Some(msg) => format!("worker panicked: {msg}"),
				None => "worker task cancelled".to_string(),
			}),
		};

		match result {
			Ok(processed) => {
				let operations = guard.complete(|store| {
					store.record_operation();
					store.operation_count()
				});
				tracing::info!(job = %job, records = processed.len(), operations, "service.process.complete");
				notifier.notify("Data processing completed");
				Ok(processed)
			}
			Err(reason) => {
				guard.abort();
				tracing::warn!(job = %job, reason = %reason, "service.process.interrupted");
				notifier.notify("Data processing interrupted");
				Err(ServiceError::ProcessingInterrupted(reason))
			}
		}
	}
}

fn transform(records: &[String], prefix: &str) -> Vec<String> {
	records.iter().map(|record| format!("{prefix}{record}")).collect()
}
