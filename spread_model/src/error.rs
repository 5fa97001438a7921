use thiserror::Error;

/// Failures that abort calibration or composition.
///
/// Degraded but usable states, such as an identity pass-through or missing
/// generation, are not errors; they are carried as flags on the artifacts.
#[derive(Error, Debug)]
pub enum ForecastError {
    /// A required series or calibration artifact is absent or empty.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Fewer observations than a regression or calibration window needs.
    #[error("insufficient data for {context}: {observations} observations, need at least {required}")]
    InsufficientData {
        context: String,
        observations: usize,
        required: usize,
    },

    /// Perfectly collinear regressors; the normal matrix has no inverse.
    #[error("singular design matrix: {0}")]
    SingularDesign(String),

    /// Power law at non-positive capacity, or seasonal scaling by a zero reference.
    #[error("undefined evaluation: {0}")]
    UndefinedEvaluation(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// A tabular input does not match its declared schema.
    #[error("schema error: {0}")]
    Schema(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

impl ForecastError {
    pub(crate) fn insufficient(context: impl Into<String>, observations: usize, required: usize) -> Self {
        ForecastError::InsufficientData {
            context: context.into(),
            observations,
            required,
        }
    }
}
