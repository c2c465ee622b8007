use thiserror::Error;

/// Failures raised by the drawing pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PadError {
    #[error("invalid {what} dimensions {width}x{height}")]
    InvalidDimension {
        what: &'static str,
        width: f32,
        height: f32,
    },

    #[error("raster surface not ready")]
    SurfaceNotReady,

    #[error("inference unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("digit out of range: {0}")]
    InvalidDigit(i64),
}

pub type PadResult<T> = std::result::Result<T, PadError>;

pub(crate) fn check_dims(what: &'static str, width: f32, height: f32) -> PadResult<()> {
    // NaN fails both comparisons
    if width > 0.0 && height > 0.0 {
        Ok(())
    } else {
        Err(PadError::InvalidDimension {
            what,
            width,
            height,
        })
    }
}
