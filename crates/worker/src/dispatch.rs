//! Delivery of continuations onto a home context.
//!
//! Work may finish on any worker thread, but its continuation often touches
//! state owned by one context (a UI loop, a REPL task). A [`HomeContext`] is
//! that context's inbox; [`Dispatcher`] is the cloneable posting side handed
//! to workers. Continuations only ever run inside `HomeContext::pump*`/`next`,
//! so they run on whichever thread drives the home context.
//!
//! Liveness is tracked through the channel: once the [`HomeContext`] is
//! dropped, posts fail and the continuation is dropped without running.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type Continuation = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
	name: String,
	dropped: AtomicU64,
}

/// Receiving side of a home context. Owned by the context that must observe results.
pub struct HomeContext {
	tx: mpsc::UnboundedSender<Continuation>,
	rx: mpsc::UnboundedReceiver<Continuation>,
	shared: Arc<Shared>,
}

impl HomeContext {
	pub fn new(name: impl Into<String>) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		Self {
			tx,
			rx,
			shared: Arc::new(Shared {
				name: name.into(),
				dropped: AtomicU64::new(0),
			}),
		}
	}

	pub fn name(&self) -> &str {
		&self.shared.name
	}

	/// Returns a posting handle bound to this context.
	pub fn dispatcher(&self) -> Dispatcher {
		Dispatcher {
			tx: self.tx.clone(),
			shared: Arc::clone(&self.shared),
		}
	}

	/// Runs the continuations queued at entry without waiting. Returns how many ran.
	///
	/// Anything posted while pumping stays queued for the next call.
	pub fn pump(&mut self) -> usize {
		let queued = self.rx.len();
		let mut ran = 0usize;
		while ran < queued {
			let Ok(continuation) = self.rx.try_recv() else {
				break;
			};
			continuation();
			ran = ran.wrapping_add(1);
		}
		ran
	}

	/// Waits for the next continuation and runs it.
	pub async fn next(&mut self) {
		// The context holds a sender itself, so the channel never reports closed here.
		if let Some(continuation) = self.rx.recv().await {
			continuation();
		}
	}

	/// Runs continuations until `stop` is cancelled, then drains what is already queued.
	pub async fn run_until(&mut self, stop: &CancellationToken) -> usize {
		let mut ran = 0usize;
		loop {
			tokio::select! {
				biased;
				_ = stop.cancelled() => break,
				maybe = self.rx.recv() => {
					let Some(continuation) = maybe else {
						break;
					};
					continuation();
					ran = ran.wrapping_add(1);
				}
			}
		}
		ran.wrapping_add(self.pump())
	}

	/// Blocks the current thread until one continuation has run.
	///
	/// For plain threads acting as the home context. Panics when called from
	/// inside an async runtime, like [`mpsc::UnboundedReceiver::blocking_recv`].
	pub fn blocking_next(&mut self) {
		if let Some(continuation) = self.rx.blocking_recv() {
			continuation();
		}
	}
}

impl Drop for HomeContext {
	fn drop(&mut self) {
		self.rx.close();
		let mut discarded = 0u64;
		while self.rx.try_recv().is_ok() {
			discarded = discarded.wrapping_add(1);
		}
		if discarded > 0 {
			self.shared.dropped.fetch_add(discarded, Ordering::Relaxed);
			tracing::debug!(home = %self.shared.name, discarded, "worker.dispatch.discard_on_drop");
		}
	}
}

/// Cloneable handle that posts continuations to one [`HomeContext`].
#[derive(Clone)]
pub struct Dispatcher {
	tx: mpsc::UnboundedSender<Continuation>,
	shared: Arc<Shared>,
}

impl Dispatcher {
	/// Queues `continuation` on the home context.
	///
	/// Returns `false` and drops the continuation when the home context is gone.
	pub fn post<F>(&self, continuation: F) -> bool
	where
		F: FnOnce() + Send + 'static,
	{
		if self.tx.send(Box::new(continuation)).is_ok() {
			return true;
		}
		let count = self.shared.dropped.fetch_add(1, Ordering::Relaxed);
		tracing::debug!(home = %self.shared.name, dropped = count + 1, "worker.dispatch.home_gone");
		false
	}

	/// Returns `true` while the home context exists.
	pub fn is_alive(&self) -> bool {
		!self.tx.is_closed()
	}

	/// Number of continuations discarded because the home context was gone.
	pub fn dropped(&self) -> u64 {
		self.shared.dropped.load(Ordering::Relaxed)
	}

	pub fn home_name(&self) -> &str {
		&self.shared.name
	}
}

impl std::fmt::Debug for Dispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dispatcher")
			.field("home", &self.shared.name)
			.field("alive", &self.is_alive())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;
	use std::sync::atomic::AtomicBool;
	use std::time::Duration;

	use super::*;
	use crate::{TaskClass, spawn_blocking};

	#[test]
	fn continuation_runs_on_pumping_thread() {
		let mut home = HomeContext::new("test.home");
		let dispatcher = home.dispatcher();
		let home_thread = std::thread::current().id();
		let seen = Arc::new(Mutex::new(None));

		let seen_clone = Arc::clone(&seen);
		let worker = std::thread::spawn(move || {
			let worker_thread = std::thread::current().id();
			dispatcher.post(move || {
				*seen_clone.lock().unwrap() = Some(std::thread::current().id());
			});
			worker_thread
		});
		let worker_thread = worker.join().unwrap();

		home.blocking_next();
		let ran_on = (*seen.lock().unwrap()).expect("continuation should have run");
		assert_eq!(ran_on, home_thread);
		assert_ne!(ran_on, worker_thread);
	}

	#[test]
	fn post_after_home_dropped_is_discarded() {
		let home = HomeContext::new("gone");
		let dispatcher = home.dispatcher();
		assert!(dispatcher.is_alive());
		drop(home);

		let ran = Arc::new(AtomicBool::new(false));
		let ran_clone = Arc::clone(&ran);
		assert!(!dispatcher.post(move || ran_clone.store(true, Ordering::SeqCst)));
		assert!(!dispatcher.is_alive());
		assert!(!ran.load(Ordering::SeqCst));
		assert_eq!(dispatcher.dropped(), 1);
	}

	#[test]
	fn queued_work_is_discarded_when_home_drops() {
		let home = HomeContext::new("pending");
		let dispatcher = home.dispatcher();
		let ran = Arc::new(AtomicBool::new(false));
		let ran_clone = Arc::clone(&ran);
		assert!(dispatcher.post(move || ran_clone.store(true, Ordering::SeqCst)));
		drop(home);
		assert!(!ran.load(Ordering::SeqCst));
		assert_eq!(dispatcher.dropped(), 1);
	}

	#[test]
	fn pump_preserves_post_order() {
		let mut home = HomeContext::new("fifo");
		let dispatcher = home.dispatcher();
		let order = Arc::new(Mutex::new(Vec::new()));
		for i in 0..5 {
			let order = Arc::clone(&order);
			dispatcher.post(move || order.lock().unwrap().push(i));
		}
		assert_eq!(home.pump(), 5);
		assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
		assert_eq!(home.pump(), 0);
	}

	#[test]
	fn pump_leaves_reposted_work_for_the_next_call() {
		fn repost(dispatcher: Dispatcher, left: u32, runs: Arc<Mutex<u32>>) {
			*runs.lock().unwrap() += 1;
			if left > 0 {
				let next = dispatcher.clone();
				dispatcher.post(move || repost(next, left - 1, runs));
			}
		}

		let mut home = HomeContext::new("repost");
		let dispatcher = home.dispatcher();
		let runs = Arc::new(Mutex::new(0));
		let runs_clone = Arc::clone(&runs);
		let first = dispatcher.clone();
		dispatcher.post(move || repost(first, 9, runs_clone));

		assert_eq!(home.pump(), 1);
		assert_eq!(*runs.lock().unwrap(), 1);
		assert_eq!(home.pump(), 1);
		assert_eq!(*runs.lock().unwrap(), 2);
	}

	#[tokio::test]
	async fn run_until_delivers_worker_results() {
		let mut home = HomeContext::new("async.home");
		let dispatcher = home.dispatcher();
		let stop = CancellationToken::new();
		let got = Arc::new(Mutex::new(Vec::new()));

		let got_clone = Arc::clone(&got);
		let stop_clone = stop.clone();
		let job = spawn_blocking(TaskClass::CpuBlocking, move || {
			let out: Vec<u32> = (1..=3).map(|n| n * 10).collect();
			dispatcher.post(move || {
				got_clone.lock().unwrap().extend(out);
				stop_clone.cancel();
			});
		});

		let ran = tokio::time::timeout(Duration::from_secs(2), home.run_until(&stop)).await.expect("home loop should stop");
		job.await.unwrap();
		assert_eq!(ran, 1);
		assert_eq!(*got.lock().unwrap(), vec![10, 20, 30]);
	}
}
