use anyhow::Result;
use facefind_vision::{load_image, DetectionParams, EmbeddingExtractor, Metric, OnnxExtractor};
use image::DynamicImage;
use std::path::{Path, PathBuf};

fn model_path(var: &str, default: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn extractor() -> Option<OnnxExtractor> {
    let detector = model_path(
        "FACEFIND_DETECTOR_MODEL",
        "models/face_detection_yunet_2023mar.onnx",
    );
    let encoder = model_path(
        "FACEFIND_ENCODER_MODEL",
        "models/face_recognition_sface_2021dec.onnx",
    );
    if !detector.exists() || !encoder.exists() {
        eprintln!("Skipping: ONNX models not found");
        return None;
    }
    match OnnxExtractor::load(&detector, &encoder, DetectionParams::default()) {
        Ok(e) => Some(e),
        Err(e) => {
            eprintln!("Skipping: {e:#}");
            None
        }
    }
}

#[test]
fn test_blank_image_has_no_faces() -> Result<()> {
    env_logger::try_init().ok();
    let Some(mut extractor) = extractor() else {
        return Ok(());
    };

    let img = DynamicImage::new_rgb8(320, 240);
    assert!(extractor.detect_faces(&img)?.is_empty());
    assert!(extractor.encode_faces(&img)?.is_empty());
    Ok(())
}

/// Same person in two photos should be closer than two different people.
#[test]
fn test_embeddings_separate_people() -> Result<()> {
    env_logger::try_init().ok();
    let Some(mut extractor) = extractor() else {
        return Ok(());
    };

    let files = [
        "test_faces/alice1.jpg",
        "test_faces/alice2.jpg",
        "test_faces/bob1.jpg",
    ];
    if files.iter().any(|f| !Path::new(f).exists()) {
        eprintln!("Skipping: test_faces fixtures not found");
        return Ok(());
    }

    let mut embeddings = Vec::new();
    for f in files {
        let img = load_image(Path::new(f))?;
        let mut found = extractor.encode_faces(&img)?;
        assert_eq!(found.len(), 1, "{f} should contain exactly one face");
        embeddings.push(found.remove(0));
    }

    for e in &embeddings {
        let norm = e.vector.dot(&e.vector).sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    let same = Metric::Euclidean.distance(&embeddings[0], &embeddings[1]);
    let different = Metric::Euclidean.distance(&embeddings[0], &embeddings[2]);
    println!("same={same:.3} different={different:.3}");
    assert!(same < different);
    Ok(())
}
