// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 原始检测张量的 JSON 容器 (推理结果离线保存 / 回放)

use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::analysis::ImageDims;
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorFile {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
    pub original_width: u32,
    pub original_height: u32,
    #[serde(default = "default_input_size")]
    pub input_width: u32,
    #[serde(default = "default_input_size")]
    pub input_height: u32,
    /// Source image, relative paths resolve against the tensor file.
    #[serde(default)]
    pub image: Option<PathBuf>,
}

fn default_input_size() -> u32 {
    640
}

impl TensorFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let mut file: Self = serde_json::from_str(&json)?;
        if let Some(dir) = path.parent() {
            file.image = file.image.take().map(|image| {
                if image.is_relative() {
                    dir.join(image)
                } else {
                    image
                }
            });
        }
        Ok(file)
    }

    pub fn from_tensor(tensor: &ArrayD<f32>, original: ImageDims, input: ImageDims) -> Self {
        Self {
            shape: tensor.shape().to_vec(),
            data: tensor.iter().copied().collect(),
            original_width: original.width,
            original_height: original.height,
            input_width: input.width,
            input_height: input.height,
            image: None,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn tensor(&self) -> Result<ArrayD<f32>> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(AnalysisError::MalformedTensor(format!(
                "shape {:?} needs {} values, file has {}",
                self.shape,
                expected,
                self.data.len()
            )));
        }
        Ok(ArrayD::from_shape_vec(self.shape.clone(), self.data.clone())?)
    }

    /// Opens the source image, if the file names one.
    pub fn load_image(&self) -> Result<Option<DynamicImage>> {
        match &self.image {
            Some(path) => Ok(Some(image::open(path)?)),
            None => Ok(None),
        }
    }

    pub fn original_dims(&self) -> ImageDims {
        ImageDims::new(self.original_height, self.original_width)
    }

    pub fn input_dims(&self) -> ImageDims {
        ImageDims::new(self.input_height, self.input_width)
    }
}
