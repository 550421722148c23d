//! YuNet output decoding.
//!
//! The 2023mar model emits twelve tensors, four heads per stride (8, 16, 32),
//! ordered `cls_*`, `obj_*`, `bbox_*`, `kps_*`. Each is `[1, cells, width]`
//! where `cells = (input / stride)^2`. Decoding is anchor-free:
//!
//! cx = (col + dx) * stride, w = exp(dw) * stride, score = sqrt(cls * obj)

use anyhow::{bail, Result};

use crate::face::FaceRegion;

const STRIDES: [usize; 3] = [8, 16, 32];

/// Decode raw `(shape, data)` outputs into regions in input-canvas pixels.
pub fn decode(
    outputs: &[(&[i64], &[f32])],
    input_size: usize,
    score_threshold: f32,
) -> Result<Vec<FaceRegion>> {
    if outputs.len() < 4 * STRIDES.len() {
        bail!("YuNet produced {} outputs, expected 12", outputs.len());
    }

    let mut regions = Vec::new();
    for (s, &stride) in STRIDES.iter().enumerate() {
        let grid = input_size / stride;
        let cells = grid * grid;
        let cls = head(outputs, s, cells, 1)?;
        let obj = head(outputs, s + 3, cells, 1)?;
        let bbox = head(outputs, s + 6, cells, 4)?;
        let kps = head(outputs, s + 9, cells, 10)?;

        for idx in 0..cells {
            let score = (cls[idx].clamp(0.0, 1.0) * obj[idx].clamp(0.0, 1.0)).sqrt();
            if score < score_threshold {
                continue;
            }
            let row = (idx / grid) as f32;
            let col = (idx % grid) as f32;
            let stride = stride as f32;

            let b = &bbox[idx * 4..idx * 4 + 4];
            let cx = (col + b[0]) * stride;
            let cy = (row + b[1]) * stride;
            let w = b[2].exp() * stride;
            let h = b[3].exp() * stride;

            let k = &kps[idx * 10..idx * 10 + 10];
            let mut landmarks = [0.0f32; 10];
            for p in 0..5 {
                landmarks[p * 2] = (col + k[p * 2]) * stride;
                landmarks[p * 2 + 1] = (row + k[p * 2 + 1]) * stride;
            }

            regions.push(FaceRegion {
                bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
                score,
                landmarks,
            });
        }
    }

    Ok(regions)
}

fn head<'a>(
    outputs: &[(&[i64], &'a [f32])],
    index: usize,
    cells: usize,
    width: usize,
) -> Result<&'a [f32]> {
    let (shape, data) = outputs[index];
    let expected = [1, cells as i64, width as i64];
    if shape != expected.as_slice() || data.len() != cells * width {
        bail!(
            "YuNet output {} has shape {:?}, expected {:?}",
            index,
            shape,
            expected
        );
    }
    Ok(data)
}
