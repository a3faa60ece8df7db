use thiserror::Error;

pub type Result<T> = std::result::Result<T, GradeError>;

/// Failures raised by the grade tree and the edit session.
///
/// Building and scoring never fail; these come from edits, imports and
/// session bookkeeping.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradeError {
    #[error("item name must not be empty")]
    EmptyName,

    #[error("item name must not contain '/': {0}")]
    InvalidName(String),

    #[error("name is reserved for empty cells: {0}")]
    ReservedName(String),

    #[error("no item at path: {0}")]
    NotFound(String),

    #[error("item is not a category: {0}")]
    NotACategory(String),

    #[error("category grade is derived and cannot be set: {0}")]
    NotALeaf(String),

    #[error("hierarchy depth limit exceeded ({0})")]
    DepthExceeded(usize),

    #[error("no course is open")]
    NoSession,

    #[error("session {0} is no longer open")]
    StaleSession(String),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl GradeError {
    /// Stable error code for the IPC error object.
    pub fn code(&self) -> &'static str {
        match self {
            GradeError::EmptyName
            | GradeError::InvalidName(_)
            | GradeError::ReservedName(_)
            | GradeError::DepthExceeded(_) => "bad_params",
            GradeError::NotFound(_) => "not_found",
            GradeError::NotACategory(_) | GradeError::NotALeaf(_) => "bad_params",
            GradeError::NoSession => "no_session",
            GradeError::StaleSession(_) => "stale_session",
            GradeError::Parse { .. } => "import_failed",
        }
    }
}
