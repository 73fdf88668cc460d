//! Client attach/detach bookkeeping.
//!
//! The [`SessionManager`] is the single owner of the [`WorkerService`]. Every
//! [`SessionHandle`] holds only a weak reference plus its own attached flag, so
//! a handle can outlive the service or be detached without affecting other
//! handles, and a detached handle rejects every call with
//! [`ServiceError::NotAttached`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tether_worker::{Dispatcher, JobId};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::notify::Notifier;
use crate::service::{ProcessOutcome, WorkerService};
use crate::store::Stats;

/// Identifier of one attachment. Never reused by a manager.
pub type SessionId = u64;

#[derive(Default)]
struct SessionRegistry {
	live: Mutex<BTreeMap<SessionId, Arc<AtomicBool>>>,
	bound_before: AtomicBool,
}

impl SessionRegistry {
	fn release(&self, id: SessionId) -> bool {
		self.live.lock().remove(&id).is_some()
	}
}

/// Hands out session handles to the one live worker service.
pub struct SessionManager {
	config: ServiceConfig,
	notifier: Arc<dyn Notifier>,
	service: Mutex<Option<Arc<WorkerService>>>,
	registry: Arc<SessionRegistry>,
	next_id: AtomicU64,
}

impl SessionManager {
	/// Creates a manager. The service itself is created on the first attach.
	pub fn new(config: ServiceConfig, notifier: Arc<dyn Notifier>) -> Self {
		Self {
			config,
			notifier,
			service: Mutex::new(None),
			registry: Arc::default(),
			next_id: AtomicU64::new(0),
		}
	}

	/// Returns the live service, creating it if needed.
	///
	/// The creation notice goes out after the slot lock is released, so a
	/// notifier may call back into the manager.
	fn ensure_service(&self) -> Arc<WorkerService> {
		let service = {
			let mut slot = self.service.lock();
			if let Some(service) = slot.as_ref() {
				return Arc::clone(service);
			}
			let service = Arc::new(WorkerService::unannounced(&self.config, Arc::clone(&self.notifier)));
			*slot = Some(Arc::clone(&service));
			service
		};
		service.announce();
		service
	}

	/// Attaches a new client. Each call returns an independent handle; all of
	/// them reach the same service.
	pub fn attach(&self) -> SessionHandle {
		let service = self.ensure_service();
		let id = self.next_id.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
		let attached = Arc::new(AtomicBool::new(true));

		let (rebind, live) = {
			let mut live = self.registry.live.lock();
			let rebind = live.is_empty() && self.registry.bound_before.swap(true, Ordering::AcqRel);
			live.insert(id, Arc::clone(&attached));
			(rebind, live.len())
		};
		if rebind {
			tracing::debug!(session = id, "session.rebind");
			self.notifier.notify("Client rebound to service");
		} else {
			tracing::debug!(session = id, live, "session.attach");
			self.notifier.notify("Client bound to service");
		}

		SessionHandle {
			id,
			service: Arc::downgrade(&service),
			attached,
			registry: Arc::downgrade(&self.registry),
			notifier: Arc::clone(&self.notifier),
		}
	}

	/// Detaches `handle`. Returns `false` if it was already detached.
	pub fn detach(&self, handle: &SessionHandle) -> bool {
		handle.detach()
	}

	pub fn attached_count(&self) -> usize {
		self.registry.live.lock().len()
	}

	pub fn session_ids(&self) -> Vec<SessionId> {
		self.registry.live.lock().keys().copied().collect()
	}

	/// The live service, for hosts that inject it elsewhere.
	pub fn service(&self) -> Option<Arc<WorkerService>> {
		self.service.lock().clone()
	}

	/// Tears down the service and invalidates every outstanding handle.
	///
	/// A later [`Self::attach`] starts a fresh service.
	pub fn shutdown(&self) {
		let detached: Vec<_> = std::mem::take(&mut *self.registry.live.lock()).into_values().collect();
		for flag in &detached {
			flag.store(false, Ordering::Release);
		}
		self.registry.bound_before.store(false, Ordering::Release);
		let Some(service) = self.service.lock().take() else {
			return;
		};
		tracing::debug!(detached = detached.len(), "session.manager.shutdown");
		service.shutdown();
	}
}

impl Drop for SessionManager {
	fn drop(&mut self) {
		self.shutdown();
	}
}

/// One client's attachment to the worker service.
///
/// Dropping the handle detaches it.
pub struct SessionHandle {
	id: SessionId,
	service: Weak<WorkerService>,
	attached: Arc<AtomicBool>,
	registry: Weak<SessionRegistry>,
	notifier: Arc<dyn Notifier>,
}

impl SessionHandle {
	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn is_attached(&self) -> bool {
		self.attached.load(Ordering::Acquire) && self.service.strong_count() > 0
	}

	/// Detaches this handle. Idempotent; returns whether this call detached it.
	pub fn detach(&self) -> bool {
		if !self.attached.swap(false, Ordering::AcqRel) {
			return false;
		}
		if let Some(registry) = self.registry.upgrade() {
			registry.release(self.id);
		}
		tracing::debug!(session = self.id, "session.detach");
		self.notifier.notify("Client unbound from service");
		true
	}

	fn service(&self) -> Result<Arc<WorkerService>, ServiceError> {
		if !self.attached.load(Ordering::Acquire) {
			return Err(ServiceError::NotAttached);
		}
		self.service.upgrade().ok_or(ServiceError::NotAttached)
	}

	pub fn add(&self, record: impl Into<String>) -> Result<(), ServiceError> {
		self.service()?.add(record);
		Ok(())
	}

	pub fn remove(&self, record: &str) -> Result<bool, ServiceError> {
		Ok(self.service()?.remove(record))
	}

	pub fn clear(&self) -> Result<(), ServiceError> {
		self.service()?.clear();
		Ok(())
	}

	pub fn list(&self) -> Result<Vec<String>, ServiceError> {
		Ok(self.service()?.list())
	}

	pub fn search(&self, query: &str) -> Result<Vec<String>, ServiceError> {
		Ok(self.service()?.search(query))
	}

	pub fn count(&self) -> Result<usize, ServiceError> {
		Ok(self.service()?.count())
	}

	pub fn operation_count(&self) -> Result<u64, ServiceError> {
		Ok(self.service()?.operation_count())
	}

	pub fn is_processing(&self) -> Result<bool, ServiceError> {
		Ok(self.service()?.is_processing())
	}

	pub fn stats(&self) -> Result<Stats, ServiceError> {
		Ok(self.service()?.stats())
	}

	pub fn cancel_processing(&self) -> Result<bool, ServiceError> {
		Ok(self.service()?.cancel_processing())
	}

	/// Starts a processing job through this session.
	///
	/// Behaves like [`WorkerService::process_async`], except that a detached
	/// handle is rejected with `NotAttached` without calling `on_result`, and a
	/// result arriving after this handle was detached is dropped.
	pub fn process_async<F>(&self, dispatcher: &Dispatcher, on_result: F) -> Result<JobId, ServiceError>
	where
		F: FnOnce(ProcessOutcome) + Send + 'static,
	{
		let service = self.service()?;
		let attached = Arc::clone(&self.attached);
		let id = self.id;
		service.process_async(dispatcher, move |outcome| {
			if attached.load(Ordering::Acquire) {
				on_result(outcome);
			} else {
				tracing::debug!(session = id, "session.process.dropped_after_detach");
			}
		})
	}
}

impl Drop for SessionHandle {
	fn drop(&mut self) {
		self.detach();
	}
}

impl std::fmt::Debug for SessionHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionHandle").field("id", &self.id).field("attached", &self.is_attached()).finish()
	}
}
