// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Malformed detection tensor: {0}")]
    MalformedTensor(String),

    #[error("Tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
