// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理引擎 (feature = "onnx")

use std::path::Path;

use anyhow::{anyhow, Result};
use log::{debug, info};
use ndarray::ArrayD;
use ort::session::Session;
use ort::value::{Value, ValueType};

use super::InferenceEngine;
use crate::analysis::ImageDims;

/// 输入尺寸无法从模型读取时使用
pub const DEFAULT_INPUT_SIZE: u32 = 640;

pub struct OnnxEngine {
    session: Session,
    input_name: String,
    output_name: String,
    input_dims: ImageDims,
}

impl OnnxEngine {
    pub fn new<P: AsRef<Path>>(model: P) -> Result<Self> {
        let model = model.as_ref();
        let session = Session::builder()
            .map_err(|e| anyhow!("Failed to create session builder: {}", e))?
            .commit_from_file(model)
            .map_err(|e| anyhow!("Failed to load model {}: {}", model.display(), e))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| anyhow!("Model {} has no inputs", model.display()))?;
        let output = session
            .outputs
            .first()
            .ok_or_else(|| anyhow!("Model {} has no outputs", model.display()))?;

        // [batch, 3, H, W]; dynamic axes come back as -1
        let input_dims = match &input.input_type {
            ValueType::Tensor { shape, .. } if shape.len() == 4 => {
                let dim = |v: i64| if v > 0 { v as u32 } else { DEFAULT_INPUT_SIZE };
                ImageDims::new(dim(shape[2]), dim(shape[3]))
            }
            other => {
                debug!("Unexpected input type {:?}, assuming 640x640", other);
                ImageDims::square(DEFAULT_INPUT_SIZE)
            }
        };

        let engine = Self {
            input_name: input.name.clone(),
            output_name: output.name.clone(),
            input_dims,
            session,
        };
        info!(
            "Model {} loaded: input {} {}x{}, output {}",
            model.display(),
            engine.input_name,
            engine.input_dims.width,
            engine.input_dims.height,
            engine.output_name
        );
        Ok(engine)
    }
}

impl InferenceEngine for OnnxEngine {
    fn input_dims(&self) -> ImageDims {
        self.input_dims
    }

    fn infer(&mut self, batch: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let input_value =
            Value::from_array(batch).map_err(|e| anyhow!("Failed to create input value: {}", e))?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| anyhow!("Failed to run inference: {}", e))?;

        let output_view = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| anyhow!("Failed to extract output array: {}", e))?;
        Ok(output_view.into_owned())
    }
}
