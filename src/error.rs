use thiserror::Error;

pub type Result<T> = std::result::Result<T, SurvivalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurvivalError {
    #[error("need at least 2 genes to build combinations, got {found} ({context})")]
    InsufficientGenes { found: usize, context: String },

    #[error("column '{column}' not found - available columns: [{}]", .available.join(", "))]
    MissingColumn { column: String, available: Vec<String> },

    #[error("bad parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    #[error("dimensions don't match: {message}")]
    InvalidDimensions { message: String },

    #[error("survival data is broken: {message}")]
    InvalidSurvivalData { message: String },

    #[error("status must be coded 0/1 or 1/2, found codes {found:?}")]
    StatusCoding { found: Vec<i32> },

    #[error("optimization blew up: {message}")]
    OptimizationFailed { message: String },

    #[error("numerical issues: {message}")]
    NumericalError { message: String },

    #[error("fit failed for {combination}: {message}")]
    FitFailed { combination: String, message: String },

    #[error("could not parse input: {message}")]
    Parse { message: String },

    #[error("io error: {message}")]
    Io { message: String },
}

impl SurvivalError {
    pub fn insufficient_genes(found: usize, context: impl Into<String>) -> Self {
        Self::InsufficientGenes {
            found,
            context: context.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>, available: &[String]) -> Self {
        Self::MissingColumn {
            column: column.into(),
            available: available.to_vec(),
        }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    pub fn invalid_dimensions(message: impl Into<String>) -> Self {
        Self::InvalidDimensions { message: message.into() }
    }

    pub fn invalid_survival_data(message: impl Into<String>) -> Self {
        Self::InvalidSurvivalData { message: message.into() }
    }

    pub fn optimization_failed(message: impl Into<String>) -> Self {
        Self::OptimizationFailed { message: message.into() }
    }

    pub fn numerical_error(message: impl Into<String>) -> Self {
        Self::NumericalError { message: message.into() }
    }

    pub fn fit_failed(combination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FitFailed {
            combination: combination.into(),
            message: message.into(),
        }
    }

    /// true for errors that abort a whole analysis rather than one combination
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InsufficientGenes { .. }
                | Self::MissingColumn { .. }
                | Self::InvalidParameter { .. }
                | Self::StatusCoding { .. }
                | Self::Parse { .. }
                | Self::Io { .. }
        )
    }
}

impl From<csv::Error> for SurvivalError {
    fn from(err: csv::Error) -> Self {
        Self::Parse { message: err.to_string() }
    }
}

impl From<std::io::Error> for SurvivalError {
    fn from(err: std::io::Error) -> Self {
        Self::Io { message: err.to_string() }
    }
}
