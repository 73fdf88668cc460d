//! Bindable stateful worker service.
//!
//! A [`WorkerService`] owns an ordered in-memory record [`Store`] and runs at
//! most one asynchronous processing job at a time. Clients reach it through
//! [`SessionHandle`]s handed out by a [`SessionManager`]; a handle only holds a
//! weak reference, so detaching (explicitly or by dropping the handle) never
//! tears down the service, and a detached handle can no longer reach the store.
//!
//! Processing results are delivered through a [`tether_worker::Dispatcher`],
//! which runs the continuation on the caller's home context rather than on the
//! worker thread that produced the result.

pub mod config;
mod error;
pub mod notify;
pub mod service;
pub mod session;
pub mod settings;
pub mod store;
pub mod ticker;

pub use config::{ConfigError, ServiceConfig, TickerConfig};
pub use error::ServiceError;
pub use notify::{DispatchNotifier, Notifier, NullNotifier, TracingNotifier};
pub use service::{ProcessOutcome, WorkerService};
pub use session::{SessionHandle, SessionId, SessionManager};
pub use settings::{MemorySettings, SettingValue, SettingsStore};
pub use store::{Stats, Store};
pub use tether_worker::{Dispatcher, HomeContext, JobId};
pub use ticker::Ticker;
