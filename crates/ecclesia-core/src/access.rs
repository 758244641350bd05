//! Capability lookup boundary
//!
//! Permission data lives outside the engine; the engine only asks
//! `can(module, action)` before issuing a request on the operator's behalf.

use std::collections::HashSet;

/// Actions the engine performs on a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    View,
    Export,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::View => write!(f, "view"),
            Action::Export => write!(f, "export"),
        }
    }
}

/// Capability lookup supplied by the host application
pub trait Capabilities: Send + Sync {
    fn can(&self, module: &str, action: Action) -> bool;
}

/// Grants everything; used when no permission source is wired in
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Capabilities for AllowAll {
    fn can(&self, _module: &str, _action: Action) -> bool {
        true
    }
}

/// Fixed set of grants
#[derive(Debug, Default, Clone)]
pub struct StaticCapabilities {
    grants: HashSet<(String, Action)>,
}

impl StaticCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, module: &str, action: Action) -> Self {
        self.grants.insert((module.to_string(), action));
        self
    }
}

impl Capabilities for StaticCapabilities {
    fn can(&self, module: &str, action: Action) -> bool {
        self.grants.contains(&(module.to_string(), action))
    }
}
