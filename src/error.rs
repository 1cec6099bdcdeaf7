use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HelmError {
    /// Rejected before the calculation starts.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("singular matrix: {0}")]
    Singular(String),

    /// A required division would be by an exact zero.
    #[error("numeric degeneracy: {0}")]
    Degenerate(String),

    /// An iterate became NaN or infinite.
    #[error("overflow: {0}")]
    Overflow(String),

    #[error("the network is infeasible for this embedding: {0}")]
    Infeasible(String),

    #[error("no voltage solution was recorded")]
    NoSolution,

    #[error("invalid handle: {0}")]
    InvalidHandle(u64),

    #[error("calculation cancelled")]
    Cancelled,
}

impl HelmError {
    /// Degeneracy and overflow stop the coefficient loop but keep the
    /// best voltages found so far.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HelmError::Degenerate(_) | HelmError::Overflow(_))
    }
}

pub type Result<T> = std::result::Result<T, HelmError>;
