use crate::solvers::SolverError;
use thiserror::Error;

/// Failures of the initial condition pipeline.
///
/// `Configuration` covers everything a caller can fix by changing inputs;
/// the remaining variants report conditions discovered while running.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("potential integration diverged: {0}")]
    NumericalDivergence(SolverError),

    /// The potential never crossed zero inside the tabulated domain, so the
    /// cluster boundary lies beyond `r_max`.
    #[error("no cluster boundary within r_max = {r_max}; increase r_max")]
    BoundaryNotFound { r_max: f64 },

    /// Rejection sampling hit its attempt budget before collecting the
    /// requested number of samples.
    #[error("sampling exhausted after {attempts} attempts ({accepted} of {requested} accepted)")]
    SamplingExhausted {
        attempts: u64,
        accepted: usize,
        requested: usize,
    },

    /// An output sink was fed steps with inconsistent shapes.
    #[error("output shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::solvers::SolverError;

    #[test]
    fn messages_carry_the_relevant_numbers() {
        let err = Error::BoundaryNotFound { r_max: 10.0 };
        assert!(err.to_string().contains("r_max = 10"));

        let err = Error::SamplingExhausted {
            attempts: 1000,
            accepted: 3,
            requested: 16,
        };
        let text = err.to_string();
        assert!(text.contains("1000") && text.contains("3 of 16"));

        let err = Error::NumericalDivergence(SolverError::NonFinite { accepted: 7 });
        assert!(err.to_string().contains("7 accepted steps"));
    }

    #[test]
    fn io_and_encode_errors_convert() {
        fn fails() -> crate::error::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(Error::Io(_))));
    }
}
