//! Capability table gating which step actions may run.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::error::CapabilityError;

/// Capabilities enabled out of the box, including the planner's action names.
pub const DEFAULT_CAPABILITIES: &[&str] = &[
    "web_research",
    "notebook_query",
    "code_generate",
    "code_validate",
    "code_execute",
    "run_tests",
    "github_read",
    "github_write",
    "research",
    "artifact_write",
    "github_writeback",
];

/// Name to enabled-flag table.
///
/// Built at startup and shared by reference with the step executor; the
/// enable/disable toggles go through interior mutability so a shared handle
/// can feature-gate at runtime.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    table: RefCell<BTreeMap<String, bool>>,
}

impl CapabilityRegistry {
    /// Registry with no capabilities at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        for name in DEFAULT_CAPABILITIES {
            registry.register(name, true);
        }
        registry
    }

    /// Insert or overwrite a capability.
    pub fn register(&self, name: &str, enabled: bool) {
        self.table.borrow_mut().insert(name.to_string(), enabled);
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.table.borrow().get(name).copied().unwrap_or(false)
    }

    pub fn assert_capability(&self, name: &str) -> Result<(), CapabilityError> {
        if self.is_enabled(name) {
            Ok(())
        } else {
            Err(CapabilityError(name.to_string()))
        }
    }

    /// Enabled names, sorted.
    pub fn list_capabilities(&self) -> Vec<String> {
        self.table
            .borrow()
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Enable a known capability. Returns `false` for unknown names.
    pub fn enable(&self, name: &str) -> bool {
        self.set(name, true)
    }

    /// Disable a known capability. Returns `false` for unknown names.
    pub fn disable(&self, name: &str) -> bool {
        self.set(name, false)
    }

    fn set(&self, name: &str, enabled: bool) -> bool {
        match self.table.borrow_mut().get_mut(name) {
            Some(flag) => {
                *flag = enabled;
                true
            }
            None => false,
        }
    }
}
