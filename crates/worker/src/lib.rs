//! Worker runtime primitives shared by tether services.
//!
//! * [`FlightCell`]: guarded state with a single-flight job slot
//! * [`HomeContext`] / [`Dispatcher`]: deliver continuations on the owning context
//! * classified [`spawn`] / [`spawn_blocking`] entrypoints with a global runtime fallback

mod class;
pub mod dispatch;
pub mod flight;
mod spawn;
mod token;

pub use class::TaskClass;
pub use dispatch::{Dispatcher, HomeContext};
pub use flight::{FlightBusy, FlightCell, FlightGuard};
pub use spawn::{spawn, spawn_blocking};
pub use token::{JobClock, JobId, JobToken};

/// Extracts the panic payload message from a failed join, if the task panicked.
///
/// Returns `None` for cancelled tasks.
pub fn join_error_panic_message(err: tokio::task::JoinError) -> Option<String> {
	if !err.is_panic() {
		return None;
	}
	let payload = err.into_panic();
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return Some((*msg).to_string());
	}
	if let Some(msg) = payload.downcast_ref::<String>() {
		return Some(msg.clone());
	}
	Some("non-string panic payload".to_string())
}
