// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 毛囊单位分析 (Follicular Unit Analysis)
///
/// 输入: 原始检测张量 (JSON) 或图片 + ONNX 模型 (`--features onnx`)
/// 输出: 每张图片一个报告 (JSON) + 标注图片 (有原图时) + 会话汇总 session.report.json
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ab_glyph::FontVec;
use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use image::DynamicImage;
use log::{error, info, warn};
use serde::Serialize;

use follicle_rs::renderer::{load_font, render_annotations};
use follicle_rs::tensor_file::TensorFile;
use follicle_rs::{
    analyze_batch, gen_time_string, AnalysisJob, AnalysisOutput, AnalysisReport, Args,
    CalibrationContext, DrawInstruction, ImageMetrics, SessionSummary,
};

/// 写入磁盘的报告
#[derive(Serialize)]
struct ReportEnvelope<'a> {
    source: String,
    completed_at: String,
    processing_time_ms: u128,
    analysis: AnalysisReport,
    draw_instructions: &'a [DrawInstruction],
}

fn init_logger(args: &Args) {
    let use_env = args.verbose == 0 && args.quiet == 0 && std::env::var_os("RUST_LOG").is_some();
    let mut logger = if use_env {
        Builder::from_env(Env::default())
    } else {
        let mut b = Builder::new();
        b.filter_level(args.log_level());
        b
    };
    logger
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

/// 会话汇总文件名, 不分配给任何输入
const SESSION_STEM: &str = "session";

/// 一次运行的统计
#[derive(Default)]
struct RunTally {
    failures: usize,
    areas: Vec<(String, ImageMetrics)>,
}

/// `scalp.tensor.json` / `scalp.json` -> `scalp`; images lose their extension.
fn output_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match name.strip_suffix(".json") {
        Some(rest) => rest.strip_suffix(".tensor").unwrap_or(rest).to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    if stem.is_empty() {
        "input".to_string()
    } else {
        stem
    }
}

/// One output stem per input. A stem already taken gets the input index as
/// a suffix, so no two inputs write to the same files.
fn unique_stems(paths: &[PathBuf]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::from([SESSION_STEM.to_string()]);
    paths
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let base = output_stem(path);
            let mut stem = base.clone();
            let mut suffix = index;
            while !taken.insert(stem.clone()) {
                stem = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            if stem != base {
                warn!("{}: output name {} is taken, using {}", path.display(), base, stem);
            }
            stem
        })
        .collect()
}

/// Writes `<stem>.report.json` and, when the source image is known,
/// `<stem>.annotated.png`.
fn write_outputs(
    out_dir: &Path,
    stem: &str,
    source: &Path,
    output: &AnalysisOutput,
    elapsed: Duration,
    image: Option<&DynamicImage>,
    font: Option<&FontVec>,
) -> Result<()> {
    let envelope = ReportEnvelope {
        source: source.display().to_string(),
        completed_at: chrono::Utc::now().to_rfc3339(),
        processing_time_ms: elapsed.as_millis(),
        analysis: output.report(),
        draw_instructions: &output.draw_instructions,
    };
    let report_path = out_dir.join(format!("{}.report.json", stem));
    fs::write(&report_path, serde_json::to_string_pretty(&envelope)?)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    let m = &envelope.analysis;
    info!(
        "{}: {:.2} FU/cm², {:.2} hairs/FU, {:.2} µm ({} ms)",
        source.display(),
        m.metrics.follicular_unit_density,
        m.metrics.average_hairs_per_fu,
        m.metrics.average_hair_thickness_microns,
        envelope.processing_time_ms
    );

    if let Some(image) = image {
        let mut canvas = image.to_rgb8();
        render_annotations(&mut canvas, &output.draw_instructions, font);
        let image_path = out_dir.join(format!("{}.annotated.png", stem));
        canvas
            .save(&image_path)
            .with_context(|| format!("Failed to save {}", image_path.display()))?;
    }
    Ok(())
}

fn run_tensors(
    args: &Args,
    calibration: &CalibrationContext,
    out_dir: &Path,
    font: Option<&FontVec>,
) -> RunTally {
    let stems = unique_stems(&args.inputs);
    let mut tally = RunTally::default();
    let mut jobs = Vec::new();
    let mut pending: Vec<(&Path, &str, TensorFile)> = Vec::new();

    for (path, stem) in args.inputs.iter().zip(&stems) {
        let loaded = TensorFile::load(path).and_then(|file| Ok((file.tensor()?, file)));
        match loaded {
            Ok((tensor, file)) => {
                jobs.push(AnalysisJob {
                    name: path.display().to_string(),
                    tensor,
                    original: file.original_dims(),
                    input: file.input_dims(),
                    calibration: calibration.clone(),
                });
                pending.push((path.as_path(), stem.as_str(), file));
            }
            Err(e) => {
                error!("{}: {}", path.display(), e);
                tally.failures += 1;
            }
        }
    }

    let outcomes = analyze_batch(jobs, args.workers);
    for ((source, stem, file), outcome) in pending.into_iter().zip(outcomes) {
        let output = match outcome.result {
            Ok(output) => output,
            Err(e) => {
                error!("{}: {}", source.display(), e);
                tally.failures += 1;
                continue;
            }
        };

        let image = file.load_image().unwrap_or_else(|e| {
            warn!("{}: {}, skipping annotation", source.display(), e);
            None
        });

        let written = write_outputs(
            out_dir,
            stem,
            source,
            &output,
            outcome.elapsed,
            image.as_ref(),
            font,
        );
        match written {
            Ok(()) => tally
                .areas
                .push((source.display().to_string(), output.metrics)),
            Err(e) => {
                error!("{}: {:#}", source.display(), e);
                tally.failures += 1;
            }
        }
    }
    tally
}

#[cfg(feature = "onnx")]
fn run_model(
    args: &Args,
    model: &Path,
    calibration: &CalibrationContext,
    out_dir: &Path,
    font: Option<&FontVec>,
) -> Result<RunTally> {
    use follicle_rs::analyze_image;
    use follicle_rs::models::OnnxEngine;

    let mut engine = OnnxEngine::new(model)?;
    let stems = unique_stems(&args.inputs);
    let mut tally = RunTally::default();
    for (path, stem) in args.inputs.iter().zip(&stems) {
        let start = std::time::Instant::now();
        let result = image::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))
            .and_then(|img| {
                let output = analyze_image(&mut engine, &img, calibration)?;
                Ok((img, output))
            });
        let written = result.and_then(|(img, output)| {
            write_outputs(out_dir, stem, path, &output, start.elapsed(), Some(&img), font)?;
            Ok(output)
        });
        match written {
            Ok(output) => tally.areas.push((path.display().to_string(), output.metrics)),
            Err(e) => {
                error!("{}: {:#}", path.display(), e);
                tally.failures += 1;
            }
        }
    }
    Ok(tally)
}

#[cfg(not(feature = "onnx"))]
fn run_model(
    _args: &Args,
    model: &Path,
    _calibration: &CalibrationContext,
    _out_dir: &Path,
    _font: Option<&FontVec>,
) -> Result<RunTally> {
    bail!(
        "Cannot run {}: built without ONNX support (rebuild with `--features onnx`)",
        model.display()
    )
}

/// Writes `session.report.json` covering every area that succeeded.
fn write_session(out_dir: &Path, tally: &RunTally) -> Result<()> {
    let summary: SessionSummary = tally
        .areas
        .iter()
        .map(|(source, metrics)| (source.as_str(), metrics))
        .collect();
    let path = out_dir.join(format!("{}.report.json", SESSION_STEM));
    fs::write(&path, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(
        "Session: {} areas, {} hairs, {:.2} hairs/cm², {:.2} FU/cm² on average",
        summary.total_analyzed_areas,
        summary.total_hair_count,
        summary.average_hair_density,
        summary.average_fu_density
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args);

    let calibration = args.calibration()?;
    calibration.print_summary();

    let font = args.font.as_ref().map(load_font).transpose()?;

    let out_dir = args.output.join(gen_time_string());
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let tally = match &args.model {
        Some(model) => run_model(&args, model, &calibration, &out_dir, font.as_ref())?,
        None => run_tensors(&args, &calibration, &out_dir, font.as_ref()),
    };
    write_session(&out_dir, &tally)?;

    info!("Results saved to {}", out_dir.display());
    if tally.failures > 0 {
        bail!("{} of {} inputs failed", tally.failures, args.inputs.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem(Path::new("a/scalp.tensor.json")), "scalp");
        assert_eq!(output_stem(Path::new("scalp.json")), "scalp");
        assert_eq!(output_stem(Path::new("scalp.left.json")), "scalp.left");
        assert_eq!(output_stem(Path::new("crown.v2.png")), "crown.v2");
        assert_eq!(output_stem(Path::new("..")), "input");
    }

    #[test]
    fn test_colliding_inputs_get_distinct_stems() {
        let stems = unique_stems(&paths(&[
            "a/scalp.json",
            "b/scalp.json",
            "scalp.tensor.json",
            "scalp.left.json",
            "scalp.right.json",
        ]));
        assert_eq!(
            stems,
            vec!["scalp", "scalp_1", "scalp_2", "scalp.left", "scalp.right"]
        );
    }

    #[test]
    fn test_session_name_is_reserved() {
        let stems = unique_stems(&paths(&["session.json", "x/session.tensor.json"]));
        assert_eq!(stems, vec!["session_0", "session_1"]);
    }

    #[test]
    fn test_suffix_skips_names_already_used() {
        let stems = unique_stems(&paths(&["scalp_2.json", "scalp.json", "a/scalp.json"]));
        assert_eq!(stems, vec!["scalp_2", "scalp", "scalp_3"]);
    }
}
