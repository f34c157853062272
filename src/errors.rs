// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner core

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Malformed camera frame
    Frame(FrameError),
    /// Recognizer failure
    Recognizer(RecognizerError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Which plane of a planar YUV frame an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
    Luma,
    ChromaU,
    ChromaV,
}

impl fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaneKind::Luma => write!(f, "Y"),
            PlaneKind::ChromaU => write!(f, "U"),
            PlaneKind::ChromaV => write!(f, "V"),
        }
    }
}

/// Malformed frame errors
///
/// All of these are recoverable: the caller skips the frame and waits
/// for the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Width or height is zero
    EmptyFrame,
    /// A plane holds fewer bytes than its declared geometry needs
    PlaneTooShort {
        plane: PlaneKind,
        required: usize,
        actual: usize,
    },
    /// Strides that cannot describe the declared geometry
    InvalidStride {
        plane: PlaneKind,
        row_stride: usize,
        pixel_stride: usize,
    },
    /// Crop rectangle outside the color buffer
    RegionOutOfBounds,
}

/// Recognizer errors
///
/// Always terminal for a single frame only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerError {
    /// The recognizer could not decode the image
    Decode(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Frame(e) => write!(f, "Frame error: {}", e),
            AppError::Recognizer(e) => write!(f, "Recognizer error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::EmptyFrame => write!(f, "Frame has zero width or height"),
            FrameError::PlaneTooShort {
                plane,
                required,
                actual,
            } => write!(
                f,
                "{} plane too short: need {} bytes, got {}",
                plane, required, actual
            ),
            FrameError::InvalidStride {
                plane,
                row_stride,
                pixel_stride,
            } => write!(
                f,
                "{} plane has invalid strides (row {}, pixel {})",
                plane, row_stride, pixel_stride
            ),
            FrameError::RegionOutOfBounds => write!(f, "Region lies outside the frame"),
        }
    }
}

impl fmt::Display for RecognizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognizerError::Decode(msg) => write!(f, "Decode failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for FrameError {}
impl std::error::Error for RecognizerError {}

impl From<FrameError> for AppError {
    fn from(err: FrameError) -> Self {
        AppError::Frame(err)
    }
}

impl From<RecognizerError> for AppError {
    fn from(err: RecognizerError) -> Self {
        AppError::Recognizer(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

