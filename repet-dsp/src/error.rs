use repet_analysis::AnalysisError;
use thiserror::Error;

/// Errors produced by the separator and the pitch-shifting engines.
///
/// Only `InvalidParameter` ever reaches a caller of the public operations.
/// The other two name conditions the engines recover from locally, so the
/// recovery can be reported in logs and outcomes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<AnalysisError> for DspError {
    fn from(err: AnalysisError) -> Self {
        DspError::InvalidParameter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_error_maps_to_invalid_parameter() {
        let err: DspError = AnalysisError::InvalidFftSize(3).into();
        assert!(matches!(err, DspError::InvalidParameter(ref msg) if msg.contains('3')));
    }
}
