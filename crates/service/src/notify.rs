//! Lifecycle notification sinks.

use std::sync::Arc;

use tether_worker::Dispatcher;

/// Receives human-readable lifecycle messages. Must be callable from any thread.
pub trait Notifier: Send + Sync {
	fn notify(&self, message: &str);
}

impl<F> Notifier for F
where
	F: Fn(&str) + Send + Sync,
{
	fn notify(&self, message: &str) {
		self(message)
	}
}

/// Emits every message as an info-level trace event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
	fn notify(&self, message: &str) {
		tracing::info!(target: "tether::notify", "{message}");
	}
}

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
	fn notify(&self, _message: &str) {}
}

/// Marshals messages onto a home context before handing them to `sink`.
///
/// Messages posted after the home context is gone are dropped.
pub struct DispatchNotifier {
	dispatcher: Dispatcher,
	sink: Arc<dyn Fn(&str) + Send + Sync>,
}

impl DispatchNotifier {
	pub fn new(dispatcher: Dispatcher, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
		Self {
			dispatcher,
			sink: Arc::new(sink),
		}
	}
}

impl Notifier for DispatchNotifier {
	fn notify(&self, message: &str) {
		let sink = Arc::clone(&self.sink);
		let message = message.to_owned();
		self.dispatcher.post(move || sink(&message));
	}
}

#[cfg(test)]
mod tests {
	use parking_lot::Mutex;
	use tether_worker::HomeContext;

	use super::*;

	#[test]
	fn dispatch_notifier_delivers_on_pump() {
		let mut home = HomeContext::new("notify.home");
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink_seen = Arc::clone(&seen);
		let notifier = DispatchNotifier::new(home.dispatcher(), move |msg: &str| sink_seen.lock().push(msg.to_owned()));

		let notifier = Arc::new(notifier);
		let remote = Arc::clone(&notifier);
		std::thread::spawn(move || remote.notify("from worker")).join().unwrap();
		assert!(seen.lock().is_empty(), "nothing runs before the home context pumps");

		assert_eq!(home.pump(), 1);
		assert_eq!(*seen.lock(), vec!["from worker".to_string()]);
	}

	#[test]
	fn closures_are_notifiers() {
		let count = Arc::new(Mutex::new(0));
		let counter = Arc::clone(&count);
		let notifier: Arc<dyn Notifier> = Arc::new(move |_: &str| *counter.lock() += 1);
		notifier.notify("one");
		notifier.notify("two");
		assert_eq!(*count.lock(), 2);
	}
}
