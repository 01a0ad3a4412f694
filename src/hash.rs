use image::{DynamicImage, imageops::FilterType};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    ImageHashes,
    error::{InsightError, Result},
};

const HASH_SIDE: u32 = 8;
const HASH_BITS: u32 = HASH_SIDE * HASH_SIDE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashComparison {
    /// Byte-for-byte identical content.
    pub identical: bool,
    pub hamming_distance: Option<u32>,
    /// 1.0 for identical perceptual hashes, 0.0 when every bit differs.
    pub similarity: Option<f64>,
}

pub struct HashService;

impl HashService {
    pub fn md5(bytes: &[u8]) -> String {
        hex::encode(Md5::digest(bytes))
    }

    pub fn sha256(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// 8x8 average hash: downsample, average the channels, and set a bit for
    /// every cell brighter than the mean. Bits are emitted row-major, most
    /// significant first, as 16 hex digits.
    pub fn perceptual(image: &DynamicImage) -> String {
        let small = image
            .resize_exact(HASH_SIDE, HASH_SIDE, FilterType::Triangle)
            .to_rgb8();

        let grays: Vec<f64> = small
            .pixels()
            .map(|p| (p[0] as f64 + p[1] as f64 + p[2] as f64) / 3.0)
            .collect();
        let average = grays.iter().sum::<f64>() / grays.len() as f64;

        let bits = grays
            .iter()
            .fold(0u64, |acc, &g| (acc << 1) | u64::from(g > average));

        format!("{:016x}", bits)
    }

    /// Hashes the raw bytes, plus the perceptual hash when a decoded image is
    /// available.
    pub fn calculate_all(bytes: &[u8], image: Option<&DynamicImage>) -> ImageHashes {
        ImageHashes {
            md5: Self::md5(bytes),
            sha256: Self::sha256(bytes),
            perceptual: image.map(Self::perceptual),
        }
    }

    pub fn hamming_distance(a: &str, b: &str) -> Result<u32> {
        let parse = |h: &str| {
            u64::from_str_radix(h, 16).map_err(|_| {
                InsightError::InvalidParameter(format!("not a 64-bit perceptual hash: {}", h))
            })
        };
        if a.len() != 16 || b.len() != 16 {
            return Err(InsightError::InvalidParameter(
                "perceptual hashes must be 16 hex digits".into(),
            ));
        }

        Ok((parse(a)? ^ parse(b)?).count_ones())
    }

    pub fn compare(first: &ImageHashes, second: &ImageHashes) -> Result<HashComparison> {
        let hamming_distance = match (&first.perceptual, &second.perceptual) {
            (Some(a), Some(b)) => Some(Self::hamming_distance(a, b)?),
            _ => None,
        };

        Ok(HashComparison {
            identical: first.sha256 == second.sha256,
            hamming_distance,
            similarity: hamming_distance.map(|d| 1.0 - d as f64 / HASH_BITS as f64),
        })
    }
}
