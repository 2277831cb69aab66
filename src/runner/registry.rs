//! One active run per parser.

#![allow(missing_docs)]

use std::collections::HashSet;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Idle,
    Running,
}

/// Per-key Idle/Running state behind a mutex; [`RunGuard`] releases on drop.
#[derive(Debug, Default)]
pub struct RunRegistry {
    running: Mutex<HashSet<String>>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` running, or `None` if it already is.
    pub fn try_acquire(&self, key: &str) -> Option<RunGuard<'_>> {
        let mut running = self.running.lock();
        if !running.insert(key.to_string()) {
            return None;
        }
        Some(RunGuard {
            registry: self,
            key: key.to_string(),
        })
    }

    pub fn state(&self, key: &str) -> KeyState {
        if self.running.lock().contains(key) {
            KeyState::Running
        } else {
            KeyState::Idle
        }
    }

    /// Currently running keys, sorted.
    pub fn active(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.running.lock().iter().cloned().collect();
        keys.sort();
        keys
    }
}

#[derive(Debug)]
pub struct RunGuard<'a> {
    registry: &'a RunRegistry,
    key: String,
}

impl RunGuard<'_> {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.registry.running.lock().remove(&self.key);
    }
}
