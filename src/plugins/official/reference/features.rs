// src/plugins/official/reference/features.rs
use crate::core::{Image, Modality};

/// Cells per side of the luminance grid.
pub const GRID: usize = 4;
pub const FEATURE_LEN: usize = GRID * GRID;
pub const TEMPLATE_LEN: usize = 1 + FEATURE_LEN * 4;

/// Mean luminance of each grid cell, each on `[0, 1]`. `None` for an image
/// with no pixels.
pub fn extract(image: &Image) -> Option<Vec<f32>> {
    if image.width == 0 || image.height == 0 {
        return None;
    }

    let luminance = image.luminance();
    let (width, height) = (image.width as usize, image.height as usize);
    let mut sums = [0f64; FEATURE_LEN];
    let mut counts = [0u64; FEATURE_LEN];

    for (index, value) in luminance.iter().enumerate() {
        let (x, y) = (index % width, index / width);
        let cell = (y * GRID / height) * GRID + (x * GRID / width);
        sums[cell] += *value as f64;
        counts[cell] += 1;
    }

    Some(
        sums.iter()
            .zip(counts.iter())
            .map(|(&sum, &count)| if count == 0 { 0.0 } else { (sum / count as f64) as f32 })
            .collect(),
    )
}

/// Element-wise mean of several feature vectors.
pub fn average(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    if vectors.is_empty() {
        return None;
    }
    let mut mean = vec![0f32; FEATURE_LEN];
    for vector in vectors {
        for (slot, value) in mean.iter_mut().zip(vector) {
            *slot += value;
        }
    }
    let n = vectors.len() as f32;
    mean.iter_mut().for_each(|v| *v /= n);
    Some(mean)
}

/// Mean absolute difference, on `[0, 1]`.
pub fn distance(a: &[f32], b: &[f32]) -> f64 {
    let total: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (*x as f64 - *y as f64).abs())
        .sum();
    total / FEATURE_LEN as f64
}

fn modality_tag(modality: Modality) -> u8 {
    match modality {
        Modality::Face => 0,
        Modality::Iris => 1,
        Modality::Multimodal => 2,
    }
}

fn tag_modality(tag: u8) -> Option<Modality> {
    match tag {
        0 => Some(Modality::Face),
        1 => Some(Modality::Iris),
        2 => Some(Modality::Multimodal),
        _ => None,
    }
}

/// Template layout: one modality byte followed by the features as
/// little-endian `f32`.
pub fn encode_template(modality: Modality, features: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(TEMPLATE_LEN);
    bytes.push(modality_tag(modality));
    for value in features {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn decode_template(bytes: &[u8]) -> Option<(Modality, Vec<f32>)> {
    if bytes.len() != TEMPLATE_LEN {
        return None;
    }
    let modality = tag_modality(bytes[0])?;
    let features = bytes[1..]
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Some((modality, features))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_image_has_uniform_features() {
        let image = Image::new(8, 8, 8, vec![255; 64]).unwrap();
        let features = extract(&image).unwrap();
        assert_eq!(features.len(), FEATURE_LEN);
        assert!(features.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_small_image_leaves_empty_cells_at_zero() {
        let image = Image::new(1, 1, 8, vec![255]).unwrap();
        let features = extract(&image).unwrap();
        assert_eq!(features[0], 1.0);
        assert!(features[1..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_template_codec_rejects_wrong_length() {
        let bytes = encode_template(Modality::Iris, &[0.5; FEATURE_LEN]);
        let (modality, features) = decode_template(&bytes).unwrap();
        assert_eq!(modality, Modality::Iris);
        assert_eq!(features, vec![0.5; FEATURE_LEN]);
        assert!(decode_template(&bytes[1..]).is_none());
        assert!(decode_template(&[]).is_none());
    }

    #[test]
    fn test_distance_bounds() {
        let zeros = vec![0.0; FEATURE_LEN];
        let ones = vec![1.0; FEATURE_LEN];
        assert_eq!(distance(&zeros, &zeros), 0.0);
        assert!((distance(&zeros, &ones) - 1.0).abs() < 1e-9);
    }
}
