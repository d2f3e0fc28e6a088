use thiserror::Error;

/// Errors that can occur while analysing source audio
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("source too short: no event fits a {gap}-sample grain/spacing step in {len} samples")]
    NoEvents { len: usize, gap: usize },
    #[error("grain spacing of {spacing} samples is too small for {width}-bin spectral features")]
    SpacingTooSmall { spacing: usize, width: usize },
    #[error("cannot cluster into {0} groups")]
    InvalidGroupCount(usize),
    #[error("feature matrix is empty")]
    EmptyFeatures,
}
