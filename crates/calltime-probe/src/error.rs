use thiserror::Error;

/// Why an identifier did not resolve to any function
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Malformed identifier '{0}': expected Type.Method")]
    MalformedIdentifier(String),

    #[error("No type found for '{0}'")]
    UnresolvedType(String),

    #[error("Type '{type_name}' has no function named '{member}' (from '{identifier}')")]
    UnresolvedMember {
        identifier: String,
        type_name: String,
        member: String,
    },
}

/// Failure reported by an instrumentation binder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Target is already bound")]
    AlreadyBound,

    #[error("Target cannot be intercepted: {0}")]
    TargetNotPatchable(String),
}

/// A non-fatal problem with one tracked-function entry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryWarning {
    #[error("{0}")]
    Resolve(#[from] ResolveError),

    #[error("Cannot instrument '{name}': {source}")]
    Bind {
        name: String,
        #[source]
        source: BindError,
    },

    #[error("Unexpected failure while processing '{entry}': {message}")]
    Unexpected { entry: String, message: String },
}

impl EntryWarning {
    /// True for warnings caused by the identifier text itself
    pub fn is_malformed(&self) -> bool {
        matches!(self, EntryWarning::Resolve(ResolveError::MalformedIdentifier(_)))
    }
}
