// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Module registry: name → instance, singleton per name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RuntimeError;
use crate::module::ModuleInstance;

#[derive(Default)]
pub struct ModuleRegistry {
    modules: Mutex<HashMap<String, Arc<ModuleInstance>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance under its module name.
    pub fn register(&self, instance: Arc<ModuleInstance>) -> Result<(), RuntimeError> {
        let mut modules = self.modules.lock();
        let name = instance.name().to_string();
        if modules.contains_key(&name) {
            return Err(RuntimeError::ModuleAlreadyLoaded(name));
        }
        modules.insert(name, instance);
        Ok(())
    }

    /// Swap the instance registered under a name, atomically.
    ///
    /// Reload goes through here so `list` never observes the name absent
    /// between the unload and the load.
    pub fn replace(
        &self,
        name: &str,
        instance: Arc<ModuleInstance>,
    ) -> Result<Arc<ModuleInstance>, RuntimeError> {
        let mut modules = self.modules.lock();
        match modules.insert(name.to_string(), instance) {
            Some(previous) => Ok(previous),
            None => {
                // Nothing was registered; undo and report.
                modules.remove(name);
                Err(RuntimeError::ModuleNotFound(name.to_string()))
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModuleInstance>> {
        self.modules.lock().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ModuleInstance>> {
        self.modules.lock().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of every registered instance, ordered by name.
    pub fn list(&self) -> Vec<Arc<ModuleInstance>> {
        let modules = self.modules.lock();
        let mut entries: Vec<_> = modules.values().cloned().collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries
    }

    pub fn len(&self) -> usize {
        self.modules.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
