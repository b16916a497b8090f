use thiserror::Error;

/// Failures a caller has to tell apart from ordinary storage or parse errors.
///
/// These travel inside `anyhow::Error`; recover them with
/// `err.downcast_ref::<ScoreError>()`.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Intersecting a precinct with a district failed even after repair.
    #[error("topology failure intersecting precinct {precinct}")]
    Topology { precinct: String },

    #[error("unsupported plan file type: {0}")]
    UnsupportedPlan(String),

    #[error("malformed plan file {path}: {reason}")]
    MalformedPlan { path: String, reason: String },

    /// The district geometry object does not exist.
    #[error("missing district geometry at {0}")]
    MissingGeometry(String),

    /// A continuation chain ran past its wall-clock ceiling.
    #[error("district scoring overdue: {elapsed:.0}s elapsed, limit {limit:.0}s")]
    Overdue { elapsed: f64, limit: f64 },
}

impl ScoreError {
    /// None of these get better by trying the same invocation again.
    pub fn is_retryable(&self) -> bool { false }
}

/// Look for a `ScoreError` anywhere in an error chain.
pub fn score_error(err: &anyhow::Error) -> Option<&ScoreError> {
    err.chain().find_map(|cause| cause.downcast_ref::<ScoreError>())
}
