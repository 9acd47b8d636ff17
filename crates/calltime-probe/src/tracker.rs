//! Entry point tying resolution, registration, binding and timing together.

use crate::binder::InstrumentationBinder;
use crate::catalog::{CatalogEntry, FunctionCatalog};
use crate::error::{BindError, EntryWarning, ResolveError};
use crate::registry::{MethodRegistry, TrackedId};
use crate::request::{TrackRequest, compose_identifiers};
use crate::resolver::SymbolIndex;
use crate::session::{ReportSink, TimingSession};
use crate::stats::StatSnapshot;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of registering a batch of identifiers.
///
/// Partial success is normal: every entry that failed is listed in
/// `warnings` and the rest are tracked.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegisterReport {
    /// Display name and id of every tracked target
    pub tracked: Vec<(String, TrackedId)>,
    pub warnings: Vec<EntryWarning>,
}

impl RegisterReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn merge(&mut self, other: RegisterReport) {
        self.tracked.extend(other.tracked);
        self.warnings.extend(other.warnings);
    }
}

/// Call-timing tracker over a host catalog and binder
pub struct Tracker<C, B> {
    index: SymbolIndex<C>,
    binder: B,
    registry: Arc<MethodRegistry>,
    session: Arc<TimingSession>,
    fallback_namespaces: Vec<String>,
}

impl<C: FunctionCatalog, B: InstrumentationBinder> Tracker<C, B> {
    pub fn new(catalog: C, binder: B) -> Self {
        let registry = Arc::new(MethodRegistry::new());
        let session = Arc::new(TimingSession::new(registry.clone()));
        Tracker {
            index: SymbolIndex::new(catalog),
            binder,
            registry,
            session,
            fallback_namespaces: Vec::new(),
        }
    }

    /// Namespaces tried, in order, when a type name does not resolve directly
    pub fn with_fallback_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_fallback_namespaces(namespaces);
        self
    }

    pub fn set_fallback_namespaces<I, S>(&mut self, namespaces: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_namespaces = namespaces.into_iter().map(Into::into).collect();
    }

    pub fn fallback_namespaces(&self) -> &[String] {
        &self.fallback_namespaces
    }

    pub fn binder(&self) -> &B {
        &self.binder
    }

    pub fn index(&self) -> &SymbolIndex<C> {
        &self.index
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn session(&self) -> &Arc<TimingSession> {
        &self.session
    }

    pub fn start(&self) -> bool {
        self.session.start()
    }

    /// Stop timing; drains to the attached sink, if any
    pub fn stop(&self) -> bool {
        self.session.stop()
    }

    pub fn is_enabled(&self) -> bool {
        self.session.is_enabled()
    }

    pub fn set_sink(&self, sink: Box<dyn ReportSink>) {
        self.session.set_sink(sink);
    }

    pub fn snapshot(&self) -> StatSnapshot {
        self.session.stats().snapshot()
    }

    pub fn reset(&self) {
        self.session.stats().reset();
    }

    pub fn drain(&self) -> StatSnapshot {
        self.session.drain()
    }

    /// Detach every binding and start a new, empty epoch
    pub fn clear(&self) {
        self.binder.detach_all();
        let generation = self.registry.clear();
        debug!(generation, "cleared tracked functions");
    }

    /// Resolve one identifier and name every target it would register as.
    ///
    /// Overloads get a `(T1, T2)` suffix; a single match keeps the plain
    /// identifier.
    pub fn plan(&self, identifier: &str) -> Result<Vec<(String, &CatalogEntry)>, ResolveError> {
        let targets = self.index.resolve(identifier, &self.fallback_namespaces)?;
        let base = identifier.trim();
        let overloaded = targets.len() > 1;

        Ok(targets
            .into_iter()
            .map(|entry| {
                let name = if overloaded {
                    format!("{}{}", base, entry.overload_suffix())
                } else {
                    base.to_string()
                };
                (name, entry)
            })
            .collect())
    }

    /// Resolve, bind and register every identifier.
    ///
    /// Failures are reported per entry and never stop the batch.
    pub fn register<I, S>(&self, identifiers: I) -> RegisterReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = RegisterReport::default();

        for identifier in identifiers {
            let identifier = identifier.as_ref();
            match panic::catch_unwind(AssertUnwindSafe(|| self.register_one(identifier))) {
                Ok(entry_report) => report.merge(entry_report),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(entry = identifier, error = %message, "unexpected failure registering tracked function");
                    report.warnings.push(EntryWarning::Unexpected {
                        entry: identifier.to_string(),
                        message,
                    });
                }
            }
        }

        debug!(
            tracked = report.tracked.len(),
            warnings = report.warnings.len(),
            total = self.registry.count(),
            "registration finished"
        );
        report
    }

    /// Expand prefix/suffix requests and register the result
    pub fn register_requests(&self, requests: &[TrackRequest]) -> RegisterReport {
        self.register(compose_identifiers(requests))
    }

    fn register_one(&self, identifier: &str) -> RegisterReport {
        let mut report = RegisterReport::default();

        let planned = match self.plan(identifier) {
            Ok(planned) => planned,
            Err(e) => {
                warn!(entry = identifier, error = %e, "skipping tracked function");
                report.warnings.push(e.into());
                return report;
            }
        };

        for (name, entry) in planned {
            if let Some(id) = self.registry.id_of(entry.target) {
                report.tracked.push((name, id));
                continue;
            }

            match self.binder.attach(entry, self.session.clone()) {
                Ok(()) | Err(BindError::AlreadyBound) => {}
                Err(e) => {
                    warn!(entry = identifier, function = %name, error = %e, "cannot instrument function");
                    report.warnings.push(EntryWarning::Bind { name, source: e });
                    continue;
                }
            }

            let registration = self.registry.register(entry.target, name.as_str());
            report.tracked.push((name, registration.id));
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
