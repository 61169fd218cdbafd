use crate::pkg::PkgError;
use thiserror::Error;

/// Error code for an invalid `PCOMPOSER_*` environment value.
pub const CONFIG_INVALID: &str = "PCOMPOSER_CONFIG_INVALID";

/// Core error type for pcomposer operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid value for {var}: {message}")]
    ConfigInvalid { var: &'static str, message: String },

    #[error(transparent)]
    Pkg(#[from] PkgError),
}

impl Error {
    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigInvalid { .. } => CONFIG_INVALID,
            Self::Pkg(e) => e.code(),
        }
    }
}
