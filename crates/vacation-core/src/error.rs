/// Fatal, setup-phase-only failures.
///
/// Transactional aborts and logical (business-rule) failures are not
/// represented here — they are never exceptional from the caller's
/// point of view (see the workspace-level design notes). This enum
/// covers only the conditions that should terminate the process before
/// a single client thread is started.
#[derive(Debug, thiserror::Error)]
pub enum VacationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{flag} must be greater than zero, got {value}")]
    NonPositive { flag: &'static str, value: i64 },
}
