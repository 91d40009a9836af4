use thiserror::Error;

/// Failures surfaced by the controllers for display. Remote errors never
/// escape a controller in any other form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("Failed to fetch projects")]
    FetchFailed,
    #[error("Failed to create project")]
    CreateFailed,
    /// Provider message, shown verbatim.
    #[error("{0}")]
    AuthError(String),
    #[error("{0}")]
    InvalidInput(String),
    /// A submit arrived while the previous one was still waiting on the provider.
    #[error("a sign-in is already in progress")]
    InProgress,
}
