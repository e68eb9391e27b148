//! Error translation: fold backend failures into the `ErrorKind` taxonomy
//!
//! Each backend contributes one `TranslationTable`: an ordered list of
//! status ranges and the kind they map to. Supporting a new platform means
//! adding a table and naming it in [`table_for`].

use crate::error::{AdapterError, BackendError, ErrorEnvelope, ErrorKind};
use std::ops::RangeInclusive;

/// Maps a range of reported statuses to an error kind
#[derive(Debug, Clone)]
pub struct StatusRule {
    /// Inclusive status range
    pub statuses: RangeInclusive<u16>,
    /// Resulting kind
    pub kind: ErrorKind,
}

/// Status → kind mapping for one backend
#[derive(Debug, Clone)]
pub struct TranslationTable {
    /// Backend this table belongs to
    pub backend: &'static str,
    /// Credential to mention in authorization failures
    pub credential_hint: &'static str,
    /// Rules, first match wins
    pub rules: &'static [StatusRule],
}

impl TranslationTable {
    /// Classify a reported status; unmatched statuses are upstream failures
    pub fn classify_status(&self, status: u16) -> ErrorKind {
        self.rules
            .iter()
            .find(|rule| rule.statuses.contains(&status))
            .map(|rule| rule.kind)
            .unwrap_or(ErrorKind::UpstreamError)
    }

    /// Classify any backend failure
    pub fn classify(&self, err: &BackendError) -> ErrorKind {
        match err {
            BackendError::Status { status, .. } => self.classify_status(*status),
            BackendError::Transport(_) => ErrorKind::UpstreamError,
            BackendError::Decode(_) | BackendError::Unsupported { .. } => ErrorKind::InternalError,
        }
    }
}

/// LaunchDarkly REST API
pub static LAUNCHDARKLY_TABLE: TranslationTable = TranslationTable {
    backend: "launchdarkly",
    credential_hint: "LAUNCHDARKLY_API_KEY",
    rules: &[
        StatusRule {
            statuses: 401..=401,
            kind: ErrorKind::UnauthorizedError,
        },
        StatusRule {
            statuses: 403..=403,
            kind: ErrorKind::UnauthorizedError,
        },
        StatusRule {
            statuses: 404..=404,
            kind: ErrorKind::NotFoundError,
        },
        StatusRule {
            statuses: 400..=499,
            kind: ErrorKind::UpstreamError,
        },
        StatusRule {
            statuses: 500..=599,
            kind: ErrorKind::UpstreamError,
        },
    ],
};

/// Sentry REST API
pub static SENTRY_TABLE: TranslationTable = TranslationTable {
    backend: "sentry",
    credential_hint: "SENTRY_TOKEN",
    rules: &[
        StatusRule {
            statuses: 401..=401,
            kind: ErrorKind::UnauthorizedError,
        },
        StatusRule {
            statuses: 403..=403,
            kind: ErrorKind::UnauthorizedError,
        },
        StatusRule {
            statuses: 404..=404,
            kind: ErrorKind::NotFoundError,
        },
        StatusRule {
            statuses: 410..=410,
            kind: ErrorKind::NotFoundError,
        },
        StatusRule {
            statuses: 400..=599,
            kind: ErrorKind::UpstreamError,
        },
    ],
};

/// Fallback for backends without a dedicated table (e.g. memory)
pub static DEFAULT_TABLE: TranslationTable = TranslationTable {
    backend: "default",
    credential_hint: "credential",
    rules: &[
        StatusRule {
            statuses: 401..=401,
            kind: ErrorKind::UnauthorizedError,
        },
        StatusRule {
            statuses: 403..=403,
            kind: ErrorKind::UnauthorizedError,
        },
        StatusRule {
            statuses: 404..=404,
            kind: ErrorKind::NotFoundError,
        },
    ],
};

/// Translation table registered for a backend name
pub fn table_for(backend: &str) -> &'static TranslationTable {
    match backend {
        "launchdarkly" => &LAUNCHDARKLY_TABLE,
        "sentry" => &SENTRY_TABLE,
        _ => &DEFAULT_TABLE,
    }
}

/// Classify an adapter error without building the message
pub fn classify(err: &AdapterError) -> ErrorKind {
    match err {
        AdapterError::Configuration(_) => ErrorKind::ConfigurationError,
        AdapterError::InitTimeout { .. } => ErrorKind::InitTimeoutError,
        AdapterError::UnknownTool(_)
        | AdapterError::MissingArguments { .. }
        | AdapterError::InvalidArgument { .. } => ErrorKind::InvalidRequest,
        AdapterError::Validation(_) => ErrorKind::ValidationError,
        AdapterError::Backend { backend, source, .. } => table_for(backend).classify(source),
        AdapterError::Closed { .. } | AdapterError::Internal(_) => ErrorKind::InternalError,
    }
}

/// Translate any adapter error into the caller-facing envelope
pub fn translate(err: &AdapterError) -> ErrorEnvelope {
    let kind = classify(err);
    let message = match (kind, err) {
        (ErrorKind::UnauthorizedError, AdapterError::Backend { backend, context, .. }) => {
            format!(
                "Unauthorized. Please check your {} token. ({})",
                table_for(backend).credential_hint,
                context
            )
        }
        _ => err.to_string(),
    };
    ErrorEnvelope::new(kind, err.rpc_code(kind), message)
}
