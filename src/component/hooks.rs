//! Lifecycle hooks registered during setup.

use std::rc::Rc;

use crate::error::{ErrorSource, RuntimeError};

pub type Hook = Rc<dyn Fn()>;

/// Returns `false` to stop the error from propagating further up.
pub type ErrorCapturedHook = Rc<dyn Fn(&RuntimeError, ErrorSource) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

impl HookKind {
    pub fn label(self) -> &'static str {
        match self {
            HookKind::BeforeMount => "before_mount",
            HookKind::Mounted => "mounted",
            HookKind::BeforeUpdate => "before_update",
            HookKind::Updated => "updated",
            HookKind::BeforeUnmount => "before_unmount",
            HookKind::Unmounted => "unmounted",
        }
    }
}

#[derive(Clone, Default)]
pub struct LifecycleHooks {
    before_mount: Vec<Hook>,
    mounted: Vec<Hook>,
    before_update: Vec<Hook>,
    updated: Vec<Hook>,
    before_unmount: Vec<Hook>,
    unmounted: Vec<Hook>,
    error_captured: Vec<ErrorCapturedHook>,
}

impl LifecycleHooks {
    fn list_mut(&mut self, kind: HookKind) -> &mut Vec<Hook> {
        match kind {
            HookKind::BeforeMount => &mut self.before_mount,
            HookKind::Mounted => &mut self.mounted,
            HookKind::BeforeUpdate => &mut self.before_update,
            HookKind::Updated => &mut self.updated,
            HookKind::BeforeUnmount => &mut self.before_unmount,
            HookKind::Unmounted => &mut self.unmounted,
        }
    }

    pub fn register(&mut self, kind: HookKind, hook: Hook) {
        self.list_mut(kind).push(hook);
    }

    pub fn register_error_captured(&mut self, hook: ErrorCapturedHook) {
        self.error_captured.push(hook);
    }

    pub fn get(&self, kind: HookKind) -> &[Hook] {
        match kind {
            HookKind::BeforeMount => &self.before_mount,
            HookKind::Mounted => &self.mounted,
            HookKind::BeforeUpdate => &self.before_update,
            HookKind::Updated => &self.updated,
            HookKind::BeforeUnmount => &self.before_unmount,
            HookKind::Unmounted => &self.unmounted,
        }
    }

    pub fn error_captured(&self) -> &[ErrorCapturedHook] {
        &self.error_captured
    }
}
