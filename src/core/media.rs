// src/core/media.rs
//! Raster images and media handed to plugins.
//!
//! The harness owns every pixel buffer. A plugin only ever sees `&Image` for
//! the duration of one call.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::utils::error::{HarnessError, Result};

/// Collection conditions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageDescription {
    #[default]
    Unknown,
    Iso,
    Mugshot,
    Photojournalism,
    Wild,
    VideoLongRange,
    VideoPhotojournalism,
    VideoPassiveObservation,
    VideoChokepoint,
    VideoElevatedPlatform,
    Iris,
}

impl FromStr for ImageDescription {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        let description = match s.to_ascii_lowercase().as_str() {
            "unknown" => ImageDescription::Unknown,
            "iso" => ImageDescription::Iso,
            "mugshot" => ImageDescription::Mugshot,
            "photojournalism" => ImageDescription::Photojournalism,
            "wild" => ImageDescription::Wild,
            "videolongrange" => ImageDescription::VideoLongRange,
            "videophotojournalism" => ImageDescription::VideoPhotojournalism,
            "videopassiveobservation" => ImageDescription::VideoPassiveObservation,
            "videochokepoint" => ImageDescription::VideoChokepoint,
            "videoelevatedplatform" => ImageDescription::VideoElevatedPlatform,
            "iris" => ImageDescription::Iris,
            other => {
                return Err(HarnessError::Config(format!(
                    "Unknown image description '{}'",
                    other
                )))
            }
        };
        Ok(description)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Illuminant {
    Unspecified,
    #[default]
    Visible,
    NearInfrared,
}

/// A single raster image.
///
/// `depth` is bits per pixel: 8 or 16 bits per channel, times one channel
/// (intensity) or three (RGB). Sixteen-bit samples are stored little-endian.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub depth: u8,
    pub data: Vec<u8>,
    pub description: ImageDescription,
    pub illuminant: Illuminant,
}

impl Image {
    pub const VALID_DEPTHS: [u8; 4] = [8, 16, 24, 48];

    pub fn new(width: u32, height: u32, depth: u8, data: Vec<u8>) -> Result<Self> {
        if !Self::VALID_DEPTHS.contains(&depth) {
            return Err(HarnessError::InvalidImage(format!(
                "unsupported image depth {}",
                depth
            )));
        }
        let expected = Self::buffer_len(width, height, depth);
        if data.len() as u64 != expected {
            return Err(HarnessError::InvalidImage(format!(
                "pixel buffer is {} bytes, expected {} for {}x{}x{}",
                data.len(),
                expected,
                width,
                height,
                depth
            )));
        }
        Ok(Self {
            width,
            height,
            depth,
            data,
            description: ImageDescription::Unknown,
            illuminant: Illuminant::Visible,
        })
    }

    pub fn with_description(mut self, description: ImageDescription) -> Self {
        self.description = description;
        self
    }

    pub fn with_illuminant(mut self, illuminant: Illuminant) -> Self {
        self.illuminant = illuminant;
        self
    }

    fn buffer_len(width: u32, height: u32, depth: u8) -> u64 {
        width as u64 * height as u64 * (depth as u64 / 8)
    }

    /// Size of the pixel buffer in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn channels(&self) -> u8 {
        match self.depth {
            24 | 48 => 3,
            _ => 1,
        }
    }

    pub fn bits_per_channel(&self) -> u8 {
        self.depth / self.channels()
    }

    /// Luminance of every pixel scaled to `[0, 1]`.
    pub fn luminance(&self) -> Vec<f32> {
        let channels = self.channels() as usize;
        let samples: Vec<f32> = if self.bits_per_channel() == 16 {
            self.data
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) as f32 / u16::MAX as f32)
                .collect()
        } else {
            self.data.iter().map(|&v| v as f32 / u8::MAX as f32).collect()
        };

        if channels == 1 {
            return samples;
        }
        samples
            .chunks_exact(3)
            .map(|rgb| 0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2])
            .collect()
    }

    /// Decodes an image file into an owned raster.
    pub fn load(path: &Path) -> Result<Self> {
        let decoded = image::open(path).map_err(|e| HarnessError::ResourceLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let (width, height) = (decoded.width(), decoded.height());

        let (depth, data) = match decoded {
            image::DynamicImage::ImageLuma8(buffer) => (8, buffer.into_raw()),
            image::DynamicImage::ImageRgb8(buffer) => (24, buffer.into_raw()),
            image::DynamicImage::ImageLuma16(buffer) => (16, words_to_le_bytes(buffer.into_raw())),
            image::DynamicImage::ImageRgb16(buffer) => (48, words_to_le_bytes(buffer.into_raw())),
            other => (24, other.to_rgb8().into_raw()),
        };

        Self::new(width, height, depth, data).map_err(|e| HarnessError::ResourceLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

fn words_to_le_bytes(words: Vec<u16>) -> Vec<u8> {
    words.into_iter().flat_map(u16::to_le_bytes).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Still,
    Video,
}

/// Still images or chronologically ordered video frames of one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Media {
    pub media_type: MediaType,
    pub frames: Vec<Image>,
    pub fps: Option<u8>,
}

impl Media {
    pub fn still(images: Vec<Image>) -> Self {
        Self {
            media_type: MediaType::Still,
            frames: images,
            fps: None,
        }
    }

    pub fn video(frames: Vec<Image>, fps: u8) -> Self {
        Self {
            media_type: MediaType::Video,
            frames,
            fps: Some(fps),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
