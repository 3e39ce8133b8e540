//! Opaque settings pass-through (§6 `GET/PUT /api/settings`).
//!
//! Per the Open Question decision recorded in DESIGN.md, settings are an in-memory key/value
//! store scoped to the process — no persistence, no validation beyond being valid JSON.

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

#[derive(Clone, Default)]
pub struct SettingsStore {
    inner: Arc<Mutex<Map<String, Value>>>,
}

impl SettingsStore {
    pub fn get(&self) -> Value {
        Value::Object(self.inner.lock().expect("settings store poisoned").clone())
    }

    pub fn replace(&self, values: Map<String, Value>) {
        *self.inner.lock().expect("settings store poisoned") = values;
    }
}
