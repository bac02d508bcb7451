// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 批量分析 (Batch Analysis)
//!
//! 多个工作线程从同一个任务队列取图片张量, 每个任务自带标定参数,
//! 线程之间不共享任何可变状态。结果按提交顺序返回。

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use ndarray::ArrayD;

use crate::analysis::{analyze, AnalysisOutput, ImageDims};
use crate::config::CalibrationContext;
use crate::error::Result;

/// 单张图片的分析任务
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub name: String,
    pub tensor: ArrayD<f32>,
    pub original: ImageDims,
    pub input: ImageDims,
    pub calibration: CalibrationContext,
}

/// 任务结果
#[derive(Debug)]
pub struct JobOutcome {
    pub name: String,
    pub result: Result<AnalysisOutput>,
    pub elapsed: Duration,
}

impl AnalysisJob {
    pub fn run(&self) -> JobOutcome {
        let start = Instant::now();
        let result = analyze(
            self.tensor.view(),
            self.original,
            self.input,
            &self.calibration,
        );
        JobOutcome {
            name: self.name.clone(),
            result,
            elapsed: start.elapsed(),
        }
    }
}

/// Runs `jobs` on up to `workers` threads.
pub fn analyze_batch(jobs: Vec<AnalysisJob>, workers: usize) -> Vec<JobOutcome> {
    let total = jobs.len();
    let workers = workers.clamp(1, total.max(1));
    if workers == 1 {
        return jobs.iter().map(AnalysisJob::run).collect();
    }

    let (job_tx, job_rx): (Sender<(usize, AnalysisJob)>, Receiver<(usize, AnalysisJob)>) =
        crossbeam_channel::bounded(workers * 2);
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, JobOutcome)>();

    thread::scope(|scope| {
        for worker_id in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for (index, job) in job_rx.iter() {
                    debug!("worker {} analyzing {}", worker_id, job.name);
                    if result_tx.send((index, job.run())).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for entry in jobs.into_iter().enumerate() {
            if job_tx.send(entry).is_err() {
                warn!("all analysis workers exited early");
                break;
            }
        }
        drop(job_tx);
    });

    let mut outcomes: Vec<(usize, JobOutcome)> = result_rx.iter().collect();
    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}
