use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageReader};
use std::path::Path;

/// Decode an image file. The format is sniffed from content, not the extension.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("reading {}", path.display()))?
        .decode()
        .with_context(|| format!("decoding {}", path.display()))
}

/// Shrink `img` so neither side exceeds `max_dim`, keeping the aspect ratio.
/// Images already within bounds are returned unchanged.
pub fn downscale(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w.max(h) <= max_dim {
        return img;
    }
    log::debug!("downscaling {}x{} to fit {}px", w, h, max_dim);
    img.resize(max_dim, max_dim, FilterType::Lanczos3)
}
