/// The synchronous, typed half of the error taxonomy: validation,
/// not-found, conflict, and misconfiguration all surface to the caller
/// immediately rather than being recorded on a Request row. Processing
/// failures (inside the processor) are instead folded into
/// `ProcessingStatus::Failed` and never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("misconfigured: {0}")]
    Misconfigured(String),

    #[error(transparent)]
    Db(#[from] abr_db::DbError),
}

pub type CoreResult<T> = Result<T, CoreError>;
