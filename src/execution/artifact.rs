//! Decoding of captured plot artifacts into rasters.

use std::path::Path;

use image::{ImageFormat, RgbaImage};

use crate::error::DecodeError;
use crate::process::{ArtifactFormat, ImageArtifact};

/// A plot ready to paint. Keeps the encoded bytes for saving without re-encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    raster: RgbaImage,
    encoded: Vec<u8>,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.encoded)
    }
}

pub fn decode(artifact: &ImageArtifact) -> Result<DecodedImage, DecodeError> {
    if artifact.bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let format = match artifact.format {
        ArtifactFormat::Png => ImageFormat::Png,
    };
    let raster = image::load_from_memory_with_format(&artifact.bytes, format)?.to_rgba8();
    Ok(DecodedImage { raster, encoded: artifact.bytes.clone() })
}
