// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 原始检测张量解码
// 输出格式: [1, 4+1+nc, num_boxes] 或已转置的 [num_boxes, 4+1+nc]
// 每个框: [x_center, y_center, width, height, objectness, class_0..class_{nc-1}]

use log::debug;
use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};

use super::types::{Candidate, CXYWHO_OFFSET, CXYWH_OFFSET};
use crate::error::{AnalysisError, Result};

/// Smallest valid row: geometry, objectness and one class score.
pub const MIN_ROW_LEN: usize = CXYWHO_OFFSET + 1;

/// Reads a raw detection tensor into one [`Candidate`] per box, in box order.
pub fn decode(raw: ArrayViewD<'_, f32>) -> Result<Vec<Candidate>> {
    let rows = box_major_view(raw)?;
    let (num_boxes, row_len) = rows.dim();
    debug!("Decoding {} boxes with {} channels", num_boxes, row_len);

    if num_boxes > 0 && row_len < MIN_ROW_LEN {
        return Err(AnalysisError::MalformedTensor(format!(
            "box rows have {} values, expected at least {}",
            row_len, MIN_ROW_LEN
        )));
    }

    Ok(rows
        .axis_iter(Axis(0))
        .map(|row| Candidate {
            cx: row[0],
            cy: row[1],
            width: row[2],
            height: row[3],
            objectness: row[CXYWH_OFFSET],
            class_scores: row.iter().skip(CXYWHO_OFFSET).copied().collect(),
        })
        .collect())
}

/// `[1, C, N]` is viewed as `[N, C]` without copying; `[N, C]` passes through.
fn box_major_view(raw: ArrayViewD<'_, f32>) -> Result<ArrayView2<'_, f32>> {
    match raw.ndim() {
        3 => {
            let batch = raw.shape()[0];
            if batch != 1 {
                return Err(AnalysisError::MalformedTensor(format!(
                    "expected a batch of 1, got {} (shape {:?})",
                    batch,
                    raw.shape()
                )));
            }
            let channels_major = raw.index_axis_move(Axis(0), 0);
            Ok(channels_major.into_dimensionality::<Ix2>()?.reversed_axes())
        }
        2 => Ok(raw.into_dimensionality::<Ix2>()?),
        n => Err(AnalysisError::MalformedTensor(format!(
            "expected 2 or 3 dimensions, got {} (shape {:?})",
            n,
            raw.shape()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_decode_batch_major_layout() {
        // 2 boxes, 4 + 1 + 2 channels
        let mut raw = Array3::<f32>::zeros((1, 7, 2));
        for (c, v) in [10., 20., 4., 6., 0.9, 0.1, 0.8].iter().enumerate() {
            raw[[0, c, 0]] = *v;
        }
        for (c, v) in [50., 60., 8., 2., 0.5, 0.6, 0.3].iter().enumerate() {
            raw[[0, c, 1]] = *v;
        }

        let candidates = decode(raw.view().into_dyn()).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].cx, 10.);
        assert_eq!(candidates[0].objectness, 0.9);
        assert_eq!(candidates[0].class_scores, vec![0.1, 0.8]);
        assert_eq!(candidates[1].cy, 60.);
        assert_eq!(candidates[1].class_scores, vec![0.6, 0.3]);
    }

    #[test]
    fn test_decode_pretransposed_layout() {
        let raw = Array2::from_shape_vec((1, 6), vec![1., 2., 3., 4., 0.5, 0.7]).unwrap();
        let candidates = decode(raw.view().into_dyn()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].height, 4.);
        assert_eq!(candidates[0].class_scores, vec![0.7]);
    }

    #[test]
    fn test_short_rows_are_malformed() {
        let raw = Array3::<f32>::zeros((1, 5, 3));
        assert!(matches!(
            decode(raw.view().into_dyn()),
            Err(AnalysisError::MalformedTensor(_))
        ));
    }

    #[test]
    fn test_bad_rank_and_batch_are_malformed() {
        let raw = Array3::<f32>::zeros((2, 10, 3));
        assert!(matches!(
            decode(raw.view().into_dyn()),
            Err(AnalysisError::MalformedTensor(_))
        ));

        let raw = ndarray::Array1::<f32>::zeros(10);
        assert!(matches!(
            decode(raw.view().into_dyn()),
            Err(AnalysisError::MalformedTensor(_))
        ));
    }

    #[test]
    fn test_empty_tensor_decodes_to_nothing() {
        let raw = Array3::<f32>::zeros((1, 10, 0));
        assert!(decode(raw.view().into_dyn()).unwrap().is_empty());
    }
}
