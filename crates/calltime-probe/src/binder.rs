//! Binding probes to targets.
//!
//! [`InstrumentationBinder`] is the seam to whatever mechanism intercepts
//! calls. [`CallSiteBinder`] is the in-process implementation: call sites
//! opt in by routing the call through [`CallSiteBinder::call`].

use crate::catalog::{CatalogEntry, TargetId};
use crate::error::BindError;
use crate::session::Probe;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

/// Arranges for a probe to run around every future call of a target
pub trait InstrumentationBinder: Send + Sync {
    fn attach(&self, target: &CatalogEntry, probe: Arc<dyn Probe>) -> Result<(), BindError>;

    /// Remove every binding made so far
    fn detach_all(&self);
}

impl<T: InstrumentationBinder + ?Sized> InstrumentationBinder for Arc<T> {
    fn attach(&self, target: &CatalogEntry, probe: Arc<dyn Probe>) -> Result<(), BindError> {
        (**self).attach(target, probe)
    }

    fn detach_all(&self) {
        (**self).detach_all()
    }
}

type PatchableFilter = Box<dyn Fn(&CatalogEntry) -> Result<(), String> + Send + Sync>;

/// Binder for call sites that wrap their own calls.
///
/// Bindings are published through an atomic pointer swap, so `call` never
/// takes a lock.
pub struct CallSiteBinder {
    bound: ArcSwap<HashMap<TargetId, Arc<dyn Probe>>>,
    write: Mutex<()>,
    filter: Option<PatchableFilter>,
}

impl CallSiteBinder {
    pub fn new() -> Self {
        CallSiteBinder {
            bound: ArcSwap::from_pointee(HashMap::new()),
            write: Mutex::new(()),
            filter: None,
        }
    }

    /// Reject targets for which `filter` returns an error message
    pub fn with_filter<F>(filter: F) -> Self
    where
        F: Fn(&CatalogEntry) -> Result<(), String> + Send + Sync + 'static,
    {
        CallSiteBinder {
            filter: Some(Box::new(filter)),
            ..Self::new()
        }
    }

    pub fn is_bound(&self, target: TargetId) -> bool {
        self.bound.load().contains_key(&target)
    }

    pub fn bound_count(&self) -> usize {
        self.bound.load().len()
    }

    #[inline]
    fn probe_for(&self, target: TargetId) -> Option<Arc<dyn Probe>> {
        self.bound.load().get(&target).cloned()
    }

    /// Run `f` as a call of `target`.
    ///
    /// A panic in `f` is recorded as a fault and then resumed.
    pub fn call<R>(&self, target: TargetId, f: impl FnOnce() -> R) -> R {
        let Some(probe) = self.probe_for(target) else {
            return f();
        };

        let state = probe.on_enter(target);
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                probe.on_exit(state);
                value
            }
            Err(payload) => {
                probe.on_fault(state);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Like [`call`](Self::call), but an `Err` return also counts as a fault
    pub fn call_fallible<T, E>(
        &self,
        target: TargetId,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let Some(probe) = self.probe_for(target) else {
            return f();
        };

        let state = probe.on_enter(target);
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => {
                probe.on_exit(state);
                Ok(value)
            }
            Ok(Err(e)) => {
                probe.on_fault(state);
                Err(e)
            }
            Err(payload) => {
                probe.on_fault(state);
                panic::resume_unwind(payload)
            }
        }
    }
}

impl Default for CallSiteBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl InstrumentationBinder for CallSiteBinder {
    fn attach(&self, target: &CatalogEntry, probe: Arc<dyn Probe>) -> Result<(), BindError> {
        if let Some(filter) = &self.filter {
            filter(target).map_err(BindError::TargetNotPatchable)?;
        }

        let _guard = self.write.lock();
        let current = self.bound.load_full();
        if current.contains_key(&target.target) {
            return Err(BindError::AlreadyBound);
        }

        let mut next = (*current).clone();
        next.insert(target.target, probe);
        self.bound.store(Arc::new(next));
        debug!(target_id = %target.target, name = %target.name, "attached probe");
        Ok(())
    }

    fn detach_all(&self) {
        let _guard = self.write.lock();
        self.bound.store(Arc::new(HashMap::new()));
    }
}
