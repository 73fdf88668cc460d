use std::sync::Mutex;
use std::time::Duration;

use tether_service::{HomeContext, NullNotifier, TickerConfig};

use crate::command::{TickerAction, TickerKind};

use super::*;

struct Harness {
	app: App,
	home: HomeContext,
	lines: Arc<Mutex<Vec<String>>>,
}

impl Harness {
	fn new(config: ServiceConfig) -> Self {
		let home = HomeContext::new("app.test");
		let lines = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&lines);
		let console: Console = Arc::new(move |line: &str| sink.lock().unwrap().push(line.to_owned()));
		let app = App::new(config, home.dispatcher(), Arc::new(NullNotifier), console);
		Self { app, home, lines }
	}

	fn run(&mut self, command: Command) -> Vec<String> {
		self.app.handle(command);
		self.take()
	}

	fn take(&self) -> Vec<String> {
		std::mem::take(&mut *self.lines.lock().unwrap())
	}

	async fn deliver(&mut self) -> Vec<String> {
		tokio::time::timeout(Duration::from_secs(2), self.home.next()).await.expect("result should be delivered");
		self.take()
	}
}

#[test]
fn commands_require_binding() {
	let mut h = Harness::new(ServiceConfig::default());
	assert_eq!(h.run(Command::List), ["Service not bound"]);
	assert_eq!(h.run(Command::Add(Some("x".into()))), ["Service not bound"]);
	assert_eq!(h.run(Command::Unbind), ["Service not bound"]);
}

#[test]
fn bind_add_list() {
	let mut h = Harness::new(ServiceConfig::default());
	assert_eq!(h.run(Command::Bind), ["Connected to worker service"]);
	assert_eq!(h.run(Command::Bind), ["Already bound to worker service"]);
	assert_eq!(h.run(Command::Add(Some("Fresh".into()))), ["Added data: Fresh"]);
	assert_eq!(
		h.run(Command::List),
		[
			"Retrieved 4 items from service:",
			"  1. Sample Item 1",
			"  2. Sample Item 2",
			"  3. Sample Item 3",
			"  4. Fresh",
		]
	);
}

#[test]
fn add_without_text_uses_sample_record() {
	let mut h = Harness::new(ServiceConfig::default());
	h.run(Command::Bind);
	let out = h.run(Command::Add(None));
	assert!(out[0].starts_with("Added data: Sample Data "), "{out:?}");
}

#[test]
fn unbind_then_rebind_keeps_data() {
	let mut h = Harness::new(ServiceConfig::default());
	h.run(Command::Bind);
	h.run(Command::Remove("Sample Item 2".into()));
	assert_eq!(h.run(Command::Unbind), ["Unbound from worker service"]);
	assert_eq!(h.run(Command::Search(Some("item".into()))), ["Service not bound"]);

	h.run(Command::Bind);
	assert_eq!(
		h.run(Command::Search(Some("ITEM".into()))),
		["Search for 'ITEM' returned 2 results", "  1. Sample Item 1", "  2. Sample Item 3"]
	);
}

#[test]
fn stats_as_json() {
	let mut h = Harness::new(ServiceConfig::default());
	h.run(Command::Bind);
	assert_eq!(
		h.run(Command::Stats { json: true }),
		[r#"{"record_count":3,"operation_count":0,"is_processing":false}"#]
	);
}

#[tokio::test]
async fn process_prints_result_on_delivery() {
	let mut h = Harness::new(ServiceConfig::default());
	h.run(Command::Bind);
	assert_eq!(h.run(Command::Process), ["Starting async data processing..."]);
	assert_eq!(
		h.deliver().await,
		[
			"Data processing completed:",
			"  1. Processed: Sample Item 1",
			"  2. Processed: Sample Item 2",
			"  3. Processed: Sample Item 3",
		]
	);
}

#[tokio::test]
async fn long_results_are_summarized() {
	let config = ServiceConfig {
		seed: (1..=7).map(|i| format!("r{i}")).collect(),
		..ServiceConfig::default()
	};
	let mut h = Harness::new(config);
	h.run(Command::Bind);
	h.run(Command::Process);
	let out = h.deliver().await;
	assert_eq!(out.len(), 7);
	assert_eq!(out[5], "  5. Processed: r5");
	assert_eq!(out[6], "  ... and 2 more items");
}

#[tokio::test]
async fn busy_service_and_cancel() {
	let config = ServiceConfig {
		processing_delay_ms: 60_000,
		..ServiceConfig::default()
	};
	let mut h = Harness::new(config);
	h.run(Command::Bind);
	h.run(Command::Process);
	assert_eq!(h.run(Command::Process), ["Service is already processing data"]);
	assert_eq!(h.run(Command::Cancel), ["Cancellation requested"]);
	let out = h.deliver().await;
	assert_eq!(out.len(), 1);
	assert!(out[0].starts_with("Data processing error: processing was interrupted"), "{out:?}");
	assert_eq!(h.run(Command::Cancel), ["No processing job running"]);
}

#[test]
fn quit_ends_the_session() {
	let mut h = Harness::new(ServiceConfig::default());
	assert_eq!(h.app.handle(Command::Quit), Flow::Quit);
	h.app.shutdown();
	assert!(!h.app.is_bound());
}

#[test]
fn bare_search_repeats_the_last_query_across_rebinds() {
	let mut h = Harness::new(ServiceConfig::default());
	h.run(Command::Bind);
	assert_eq!(h.run(Command::Search(None)), ["No previous search to repeat"]);
	h.run(Command::Search(Some("item 3".into())));

	h.run(Command::Unbind);
	h.run(Command::Bind);
	assert_eq!(h.run(Command::Search(None)), ["Search for 'item 3' returned 1 results", "  1. Sample Item 3"]);
}

#[tokio::test]
async fn foreground_ticker_stops_itself() {
	let config = ServiceConfig {
		foreground: TickerConfig {
			interval_ms: 1,
			max_ticks: Some(3),
		},
		..ServiceConfig::default()
	};
	let mut h = Harness::new(config);
	let fg = |action| Command::Ticker(TickerKind::Foreground, action);

	assert_eq!(h.run(fg(TickerAction::Start)), ["Started Foreground ticker"]);
	tokio::time::timeout(Duration::from_secs(2), async {
		while h.app.foreground.is_running() {
			tokio::time::sleep(Duration::from_millis(2)).await;
		}
	})
	.await
	.expect("foreground ticker should stop");

	assert_eq!(h.run(fg(TickerAction::Status)), ["Foreground ticker running: false, ticks: 3"]);
	assert_eq!(h.run(fg(TickerAction::Stop)), ["Foreground ticker not running"]);
	assert_eq!(
		h.run(Command::Ticker(TickerKind::Background, TickerAction::Status)),
		["Background ticker running: false, ticks: 0"]
	);
}
