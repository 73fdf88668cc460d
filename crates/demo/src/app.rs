//! Console host: binds to the worker service and renders results.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tether_service::{Dispatcher, MemorySettings, Notifier, ServiceConfig, ServiceError, SessionHandle, SessionManager, SettingsStore, Ticker};

use crate::command::{Command, HELP, TickerAction, TickerKind};

/// Processed records shown before the remainder is summarized.
const PREVIEW_LIMIT: usize = 5;

const LAST_SEARCH_KEY: &str = "last-search";

/// Where the host writes its output lines. Only called on the home context.
pub type Console = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	Continue,
	Quit,
}

pub struct App {
	manager: SessionManager,
	session: Option<SessionHandle>,
	dispatcher: Dispatcher,
	background: Ticker,
	foreground: Ticker,
	/// Host preferences; outlive bind/unbind cycles.
	settings: MemorySettings,
	console: Console,
}

impl App {
	pub fn new(config: ServiceConfig, dispatcher: Dispatcher, notifier: Arc<dyn Notifier>, console: Console) -> Self {
		let background = Ticker::from_config("Background", &config.ticker, Arc::clone(&notifier));
		let foreground = Ticker::from_config("Foreground", &config.foreground, Arc::clone(&notifier));
		Self {
			manager: SessionManager::new(config, notifier),
			session: None,
			dispatcher,
			background,
			foreground,
			settings: MemorySettings::new(),
			console,
		}
	}

	fn say(&self, line: impl AsRef<str>) {
		(self.console)(line.as_ref());
	}

	pub fn is_bound(&self) -> bool {
		self.session.as_ref().is_some_and(SessionHandle::is_attached)
	}

	pub fn handle(&mut self, command: Command) -> Flow {
		let result = match command {
			Command::Bind => {
				self.bind();
				Ok(())
			}
			Command::Unbind => {
				self.unbind();
				Ok(())
			}
			Command::Help => {
				self.say(HELP);
				Ok(())
			}
			Command::Ticker(kind, action) => {
				self.ticker(kind, action);
				Ok(())
			}
			Command::Quit => return Flow::Quit,
			other => self.session_command(other),
		};
		if let Err(err) = result {
			match err {
				ServiceError::NotAttached => self.say("Service not bound"),
				other => self.say(format!("Error: {other}")),
			}
		}
		Flow::Continue
	}

	fn bind(&mut self) {
		if self.is_bound() {
			self.say("Already bound to worker service");
			return;
		}
		self.session = Some(self.manager.attach());
		self.say("Connected to worker service");
	}

	fn unbind(&mut self) {
		match self.session.take() {
			Some(session) if session.detach() => self.say("Unbound from worker service"),
			_ => self.say("Service not bound"),
		}
	}

	fn session(&self) -> Result<&SessionHandle, ServiceError> {
		self.session.as_ref().ok_or(ServiceError::NotAttached)
	}

	fn session_command(&self, command: Command) -> Result<(), ServiceError> {
		let session = self.session()?;
		match command {
			Command::Add(text) => {
				let record = text.unwrap_or_else(sample_record);
				session.add(record.clone())?;
				self.say(format!("Added data: {record}"));
			}
			Command::List => {
				let records = session.list()?;
				self.say(format!("Retrieved {} items from service:", records.len()));
				self.say_numbered(&records);
			}
			Command::Remove(record) => {
				if session.remove(&record)? {
					self.say(format!("Removed data: {record}"));
				} else {
					self.say(format!("No record matching '{record}'"));
				}
			}
			Command::Clear => {
				session.clear()?;
				self.say("Cleared all data");
			}
			Command::Search(query) => {
				let query = match query {
					Some(query) => {
						self.settings.set_value(LAST_SEARCH_KEY, query.as_str().into());
						query
					}
					None => self.settings.get_text(LAST_SEARCH_KEY, ""),
				};
				if query.is_empty() {
					self.say("No previous search to repeat");
					return Ok(());
				}
				let results = session.search(&query)?;
				self.say(format!("Search for '{query}' returned {} results", results.len()));
				self.say_numbered(&results);
			}
			Command::Process => self.process(session)?,
			Command::Cancel => {
				if session.cancel_processing()? {
					self.say("Cancellation requested");
				} else {
					self.say("No processing job running");
				}
			}
			Command::Stats { json } => {
				let stats = session.stats()?;
				if json {
					match serde_json::to_string(&stats) {
						Ok(encoded) => self.say(encoded),
						Err(err) => self.say(format!("Error: {err}")),
					}
				} else {
					self.say("Service Statistics:");
					self.say(format!("  Data Count: {}", stats.record_count));
					self.say(format!("  Operations: {}", stats.operation_count));
					self.say(format!("  Processing: {}", stats.is_processing));
				}
			}
			Command::Bind | Command::Unbind | Command::Ticker(..) | Command::Help | Command::Quit => {}
		}
		Ok(())
	}

	fn process(&self, session: &SessionHandle) -> Result<(), ServiceError> {
		if session.is_processing()? {
			self.say("Service is already processing data");
			return Ok(());
		}
		self.say("Starting async data processing...");
		let console = Arc::clone(&self.console);
		let started = session.process_async(&self.dispatcher, move |outcome| match outcome {
			Ok(processed) => {
				console("Data processing completed:");
				for (i, record) in processed.iter().take(PREVIEW_LIMIT).enumerate() {
					console(&format!("  {}. {record}", i + 1));
				}
				if processed.len() > PREVIEW_LIMIT {
					console(&format!("  ... and {} more items", processed.len() - PREVIEW_LIMIT));
				}
			}
			Err(err) => console(&format!("Data processing error: {err}")),
		});
		// A rejection has already been reported through the continuation.
		match started {
			Err(ServiceError::AlreadyProcessing) => Ok(()),
			other => other.map(drop),
		}
	}

	fn ticker(&self, kind: TickerKind, action: TickerAction) {
		let ticker = match kind {
			TickerKind::Background => &self.background,
			TickerKind::Foreground => &self.foreground,
		};
		let name = ticker.name();
		match action {
			TickerAction::Start => {
				if ticker.start() {
					self.say(format!("Started {name} ticker"));
				} else {
					self.say(format!("{name} ticker already running"));
				}
			}
			TickerAction::Stop => {
				if ticker.stop() {
					self.say(format!("Stopped {name} ticker after {} ticks", ticker.tick_count()));
				} else {
					self.say(format!("{name} ticker not running"));
				}
			}
			TickerAction::Status => self.say(format!("{name} ticker running: {}, ticks: {}", ticker.is_running(), ticker.tick_count())),
		}
	}

	fn say_numbered(&self, records: &[String]) {
		for (i, record) in records.iter().enumerate() {
			self.say(format!("  {}. {record}", i + 1));
		}
	}

	/// Detaches, stops background work and tears the service down.
	pub fn shutdown(&mut self) {
		if let Some(session) = self.session.take() {
			session.detach();
		}
		self.background.stop();
		self.foreground.stop();
		self.manager.shutdown();
	}
}

fn sample_record() -> String {
	let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or_default();
	format!("Sample Data {millis}")
}

#[cfg(test)]
mod tests;
