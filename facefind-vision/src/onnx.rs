use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use ndarray::Array4;
use ort::{session::Session, value::Value};
use std::path::Path;

use crate::extractor::EmbeddingExtractor;
use crate::face::{nms, Embedding, FaceRegion};
use crate::{model, yunet};

const DETECTOR_INPUT: u32 = 640;
const ENCODER_INPUT: u32 = 112;

/// SFace reference eye positions in the 112x112 crop.
const REF_RIGHT_EYE: (f32, f32) = (38.2946, 51.6963);
const REF_LEFT_EYE: (f32, f32) = (73.5318, 51.5014);

#[derive(Debug, Clone, Copy)]
pub struct DetectionParams {
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            score_threshold: 0.6,
            nms_threshold: 0.3,
        }
    }
}

/// YuNet detector + SFace encoder, both loaded from ONNX files.
pub struct OnnxExtractor {
    detector: Session,
    encoder: Session,
    params: DetectionParams,
}

impl OnnxExtractor {
    pub fn load(detector: &Path, encoder: &Path, params: DetectionParams) -> Result<Self> {
        Ok(Self {
            detector: model::load_session(detector).context("load detector model")?,
            encoder: model::load_session(encoder).context("load recognition model")?,
            params,
        })
    }

    fn encode(&mut self, img: &DynamicImage, face: &FaceRegion) -> Result<Embedding> {
        let crop = align(img, face);
        let input = Value::from_array(bgr_tensor(&crop))?;
        let outputs = self.encoder.run(ort::inputs![input])?;
        let (_shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        let norm = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            data.iter().map(|x| x / norm).collect()
        } else {
            data.to_vec()
        };
        Ok(Embedding::new(values))
    }
}

impl EmbeddingExtractor for OnnxExtractor {
    fn detect_faces(&mut self, img: &DynamicImage) -> Result<Vec<FaceRegion>> {
        // Letterbox into the top-left of a square canvas so mapping back is a single scale.
        let (w, h) = img.dimensions();
        let scale = DETECTOR_INPUT as f32 / w.max(h) as f32;
        let resized = img.resize_exact(
            ((w as f32 * scale) as u32).max(1),
            ((h as f32 * scale) as u32).max(1),
            FilterType::Triangle,
        );
        let mut canvas = RgbImage::new(DETECTOR_INPUT, DETECTOR_INPUT);
        image::imageops::overlay(&mut canvas, &resized.to_rgb8(), 0, 0);

        let input = Value::from_array(bgr_tensor(&canvas))?;
        let outputs = self.detector.run(ort::inputs![input])?;

        let mut raw: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
        for (_name, output) in outputs.iter() {
            let (shape, data) = output.try_extract_tensor::<f32>()?;
            raw.push((shape.iter().copied().collect(), data.to_vec()));
        }
        let views: Vec<(&[i64], &[f32])> = raw
            .iter()
            .map(|(s, d)| (s.as_slice(), d.as_slice()))
            .collect();

        let regions = yunet::decode(&views, DETECTOR_INPUT as usize, self.params.score_threshold)
            .context("decoding detector output")?
            .into_iter()
            .map(|mut r| {
                r.bbox.iter_mut().for_each(|v| *v /= scale);
                r.landmarks.iter_mut().for_each(|v| *v /= scale);
                r
            })
            .collect::<Vec<_>>();

        Ok(nms(&regions, self.params.nms_threshold))
    }

    fn encode_faces(&mut self, img: &DynamicImage) -> Result<Vec<Embedding>> {
        let faces = self.detect_faces(img)?;
        faces
            .iter()
            .map(|face| self.encode(img, face).context("encoding face"))
            .collect()
    }
}

/// NCHW float tensor in BGR plane order, values in [0, 255].
fn bgr_tensor(img: &RgbImage) -> Array4<f32> {
    let (w, h) = img.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
    for (x, y, px) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = px[2] as f32;
        tensor[[0, 1, y, x]] = px[1] as f32;
        tensor[[0, 2, y, x]] = px[0] as f32;
    }
    tensor
}

/// Similarity transform taking the detected eyes onto the reference eye positions,
/// sampled bilinearly into an `ENCODER_INPUT` square crop.
fn align(img: &DynamicImage, face: &FaceRegion) -> RgbImage {
    let right = (face.landmarks[0], face.landmarks[1]);
    let left = (face.landmarks[2], face.landmarks[3]);

    let src_dx = left.0 - right.0;
    let src_dy = left.1 - right.1;
    let ref_dx = REF_LEFT_EYE.0 - REF_RIGHT_EYE.0;
    let ref_dy = REF_LEFT_EYE.1 - REF_RIGHT_EYE.1;

    let src_len = (src_dx * src_dx + src_dy * src_dy).sqrt().max(1e-3);
    let ref_len = (ref_dx * ref_dx + ref_dy * ref_dy).sqrt();
    let angle = src_dy.atan2(src_dx) - ref_dy.atan2(ref_dx);

    // Output pixel -> source pixel: rotate by `angle`, scale by src/ref, anchored at eye centres.
    let s = src_len / ref_len;
    let (sin, cos) = angle.sin_cos();
    let src_mid = ((right.0 + left.0) / 2.0, (right.1 + left.1) / 2.0);
    let ref_mid = (
        (REF_RIGHT_EYE.0 + REF_LEFT_EYE.0) / 2.0,
        (REF_RIGHT_EYE.1 + REF_LEFT_EYE.1) / 2.0,
    );

    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    let mut out = RgbImage::new(ENCODER_INPUT, ENCODER_INPUT);

    for (ox, oy, px) in out.enumerate_pixels_mut() {
        let dx = ox as f32 - ref_mid.0;
        let dy = oy as f32 - ref_mid.1;
        let sx = src_mid.0 + s * (cos * dx - sin * dy);
        let sy = src_mid.1 + s * (sin * dx + cos * dy);
        if sx < 0.0 || sy < 0.0 || sx > (w - 1) as f32 || sy > (h - 1) as f32 {
            continue;
        }

        let (x0, y0) = (sx.floor() as u32, sy.floor() as u32);
        let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
        let (fx, fy) = (sx - x0 as f32, sy - y0 as f32);
        let (p00, p10) = (rgb.get_pixel(x0, y0), rgb.get_pixel(x1, y0));
        let (p01, p11) = (rgb.get_pixel(x0, y1), rgb.get_pixel(x1, y1));

        for c in 0..3 {
            let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
            let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
            px[c] = (top * (1.0 - fy) + bottom * fy).round() as u8;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_bgr_tensor_plane_order() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(1, 0, Rgb([10, 20, 30]));
        let t = bgr_tensor(&img);
        assert_eq!(t.shape(), &[1, 3, 1, 2]);
        assert_eq!(t[[0, 0, 0, 1]], 30.0);
        assert_eq!(t[[0, 1, 0, 1]], 20.0);
        assert_eq!(t[[0, 2, 0, 1]], 10.0);
    }

    #[test]
    fn test_align_identity_when_eyes_at_reference() {
        // Horizontal gradient; eyes already where SFace expects them.
        let mut src = RgbImage::new(ENCODER_INPUT, ENCODER_INPUT);
        for (x, _, px) in src.enumerate_pixels_mut() {
            *px = Rgb([(x * 2) as u8, 0, 0]);
        }
        let face = FaceRegion {
            bbox: [0.0, 0.0, 112.0, 112.0],
            score: 1.0,
            landmarks: [
                REF_RIGHT_EYE.0,
                REF_RIGHT_EYE.1,
                REF_LEFT_EYE.0,
                REF_LEFT_EYE.1,
                0.0,
                0.0,
                0.0,
                0.0,
                0.0,
                0.0,
            ],
        };

        let crop = align(&DynamicImage::ImageRgb8(src.clone()), &face);
        assert_eq!(crop.dimensions(), (ENCODER_INPUT, ENCODER_INPUT));
        for x in [10u32, 56, 100] {
            let got = crop.get_pixel(x, 56)[0] as i32;
            let want = src.get_pixel(x, 56)[0] as i32;
            assert!((got - want).abs() <= 1, "x={x}: {got} vs {want}");
        }
    }
}
