use std::fmt;

/// Where in a payload a rejected key appeared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPosition {
    Table,
    Select,
    Filter,
    Sort,
    Join,
    Column,
}

impl fmt::Display for KeyPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Select => "select column",
            Self::Filter => "filter key",
            Self::Sort => "sort key",
            Self::Join => "join",
            Self::Column => "column",
        })
    }
}

/// Error during query compilation. No SQL is produced when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// The payload is structurally invalid (empty select, empty IN list,
    /// non-positive limit, missing table, condition tree too deep).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The payload references something outside the allowlist.
    ///
    /// `key` is the client's own input; the allowlist is never echoed.
    #[error("`{key}` is not permitted as a {position}")]
    PolicyViolation { position: KeyPosition, key: String },

    /// The requested construct has no rendering for the target dialect.
    #[error("{feature} is not supported by the {dialect} dialect")]
    Unsupported {
        feature: &'static str,
        dialect: &'static str,
    },
}

impl CompileError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub(crate) fn denied(position: KeyPosition, key: impl Into<String>) -> Self {
        Self::PolicyViolation {
            position,
            key: key.into(),
        }
    }
}

/// Error while validating a [`QueryConfig`](crate::QueryConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {context} identifier `{value}`")]
    InvalidIdentifier { context: &'static str, value: String },

    #[error("table `{table}` has an empty column allowlist")]
    EmptyAllowlist { table: String },

    #[error("join configuration `{view}` has no allowlist entry")]
    ViewWithoutAllowlist { view: String },

    #[error("join configuration `{view}` has an unsupported ON clause `{on}`")]
    UnsafeJoinCondition { view: String, on: String },

    #[error("max_condition_depth must be at least 1")]
    ZeroDepth,
}
