/// The outcome of one phase, replacing exception-based control flow: the
/// driver matches on this and decides whether to continue, skip forward
/// with a degraded input, or abort the whole pipeline for this expert.
pub enum PhaseOutcome<T> {
    /// The phase ran to completion.
    Completed(T),
    /// The phase could not fully complete but produced a usable fallback
    /// (e.g. Medium Scoring falling back to "keep everything" on a scoring
    /// failure). The pipeline continues with `reason` logged.
    Degraded(T, String),
    /// The phase was skipped entirely (e.g. Language Validation when
    /// detection is already confident and matches); the input passes
    /// through unchanged as `T`.
    Skipped(T, String),
}

impl<T> PhaseOutcome<T> {
    pub fn into_degraded_reason(&self) -> Option<&str> {
        match self {
            PhaseOutcome::Degraded(_, reason) => Some(reason.as_str()),
            PhaseOutcome::Skipped(_, reason) => Some(reason.as_str()),
            PhaseOutcome::Completed(_) => None,
        }
    }

    /// Every variant carries a usable `T`; the driver can always continue
    /// with it regardless of which path the phase took.
    pub fn into_value(self) -> T {
        match self {
            PhaseOutcome::Completed(v) => v,
            PhaseOutcome::Degraded(v, _) => v,
            PhaseOutcome::Skipped(v, _) => v,
        }
    }
}
