//! Key/value settings persistence interface.
//!
//! The worker service does not depend on settings for correctness; hosts use
//! this to remember preferences across sessions of the same process.

use std::collections::HashMap;

use parking_lot::RwLock;

/// One stored setting.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
	Blob(Vec<u8>),
}

impl From<bool> for SettingValue {
	fn from(v: bool) -> Self {
		Self::Bool(v)
	}
}

impl From<i64> for SettingValue {
	fn from(v: i64) -> Self {
		Self::Int(v)
	}
}

impl From<f64> for SettingValue {
	fn from(v: f64) -> Self {
		Self::Float(v)
	}
}

impl From<&str> for SettingValue {
	fn from(v: &str) -> Self {
		Self::Text(v.to_owned())
	}
}

impl From<String> for SettingValue {
	fn from(v: String) -> Self {
		Self::Text(v)
	}
}

impl From<Vec<u8>> for SettingValue {
	fn from(v: Vec<u8>) -> Self {
		Self::Blob(v)
	}
}

/// Settings persistence. Last write wins; no cross-key atomicity.
pub trait SettingsStore: Send + Sync {
	/// Returns the stored value for `key`, or `default` when absent.
	fn get_value(&self, key: &str, default: SettingValue) -> SettingValue;

	fn set_value(&self, key: &str, value: SettingValue);

	fn get_bool(&self, key: &str, default: bool) -> bool {
		match self.get_value(key, SettingValue::Bool(default)) {
			SettingValue::Bool(v) => v,
			_ => default,
		}
	}

	fn get_int(&self, key: &str, default: i64) -> i64 {
		match self.get_value(key, SettingValue::Int(default)) {
			SettingValue::Int(v) => v,
			_ => default,
		}
	}

	fn get_text(&self, key: &str, default: &str) -> String {
		match self.get_value(key, SettingValue::Text(default.to_owned())) {
			SettingValue::Text(v) => v,
			_ => default.to_owned(),
		}
	}
}

/// In-memory settings, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemorySettings {
	values: RwLock<HashMap<String, SettingValue>>,
}

impl MemorySettings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.values.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.read().is_empty()
	}
}

impl SettingsStore for MemorySettings {
	fn get_value(&self, key: &str, default: SettingValue) -> SettingValue {
		self.values.read().get(key).cloned().unwrap_or(default)
	}

	fn set_value(&self, key: &str, value: SettingValue) {
		self.values.write().insert(key.to_owned(), value);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_key_yields_default() {
		let settings = MemorySettings::new();
		assert_eq!(settings.get_value("absent", 5i64.into()), SettingValue::Int(5));
		assert!(settings.is_empty());
	}

	#[test]
	fn last_write_wins() {
		let settings = MemorySettings::new();
		settings.set_value("user", "first".into());
		settings.set_value("user", "second".into());
		assert_eq!(settings.get_text("user", ""), "second");
		assert_eq!(settings.len(), 1);
	}

	#[test]
	fn typed_getters_fall_back_on_type_mismatch() {
		let settings = MemorySettings::new();
		settings.set_value("remember", true.into());
		settings.set_value("blob", vec![1u8, 2, 3].into());
		assert!(settings.get_bool("remember", false));
		assert_eq!(settings.get_int("remember", 7), 7);
		assert_eq!(settings.get_value("blob", SettingValue::Blob(Vec::new())), SettingValue::Blob(vec![1, 2, 3]));
	}
}
