// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 推理引擎接口
///
/// 模型加载与推理属于外部协作方, 分析引擎只消费原始检测张量:
/// ```text
/// 原始图片 → preprocess_image → NCHW 张量
///          ↓
///     InferenceEngine::infer
///          ↓
///     原始输出 → analysis::analyze → 指标 + 标注指令
/// ```
///
/// 启用 `onnx` feature 后可使用 ONNX Runtime 实现 (`OnnxEngine`)。
use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::{Array, ArrayD, IxDyn};

use crate::analysis::{analyze, AnalysisOutput, ImageDims};
use crate::config::CalibrationContext;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEngine;

/// 推理引擎: 归一化图片批次 → 原始检测张量
pub trait InferenceEngine {
    /// Fixed model input resolution.
    fn input_dims(&self) -> ImageDims;

    /// `batch` is `[1, 3, H, W]`; the output is the raw detection tensor.
    fn infer(&mut self, batch: ArrayD<f32>) -> Result<ArrayD<f32>>;
}

/// Stretches the image to `input` and lays it out as `[1, 3, H, W]` in `0..=1`.
///
/// Each axis is scaled independently, which matches the x/y unscaling done
/// by the suppressor.
pub fn preprocess_image(image: &DynamicImage, input: ImageDims) -> Array<f32, IxDyn> {
    let resized = image
        .resize_exact(
            input.width,
            input.height,
            image::imageops::FilterType::Triangle,
        )
        .to_rgb8();

    let mut ys = Array::zeros((1, 3, input.height as usize, input.width as usize)).into_dyn();
    for (x, y, rgb) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = rgb.0;
        ys[[0, 0, y, x]] = (r as f32) / 255.0;
        ys[[0, 1, y, x]] = (g as f32) / 255.0;
        ys[[0, 2, y, x]] = (b as f32) / 255.0;
    }
    ys
}

/// preprocess → infer → analyze for a single image.
pub fn analyze_image<E: InferenceEngine + ?Sized>(
    engine: &mut E,
    image: &DynamicImage,
    calibration: &CalibrationContext,
) -> Result<AnalysisOutput> {
    let input = engine.input_dims();
    let original = ImageDims::new(image.height(), image.width());

    let batch = preprocess_image(image, input);
    let raw = engine.infer(batch).context("inference failed")?;
    let output = analyze(raw.view(), original, input, calibration)?;
    Ok(output)
}
