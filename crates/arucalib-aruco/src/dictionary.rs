//! Dictionary metadata, packed marker codes and the exact-match lookup table.

use crate::matcher::rotate_code_u64;
use std::collections::HashMap;

/// Errors raised while building a [`Dictionary`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    #[error("dictionary has no codes")]
    Empty,
    #[error("marker_size {0} needs more than 64 bits")]
    TooManyBits(usize),
    #[error("code {code:#x} (id {id}) has bits outside the {bits}-bit payload")]
    CodeOutOfRange { id: u32, code: u64, bits: usize },
    #[error("ids {first} and {second} collide under rotation")]
    AmbiguousCodes { first: u32, second: u32 },
}

/// An immutable ArUco-style dictionary.
///
/// Codes are stored row-major with **black = 1**, one `u64` per marker id.
/// The minimum Hamming distance is measured over all pairs of codes and all
/// four rotations (including a code against its own rotations), and bounds
/// how many flipped bits can be corrected unambiguously.
#[derive(Clone, Debug)]
pub struct Dictionary {
    name: String,
    marker_size: usize,
    codes: Vec<u64>,
    min_distance: u32,
    max_correction_bits: u8,
    /// Every rotated code mapped to `(id, rotation)`.
    exact: HashMap<u64, (u32, u8)>,
}

impl Dictionary {
    /// Validate `codes` and precompute the lookup table.
    pub fn new(
        name: impl Into<String>,
        marker_size: usize,
        codes: Vec<u64>,
    ) -> Result<Self, DictionaryError> {
        let bits = marker_size * marker_size;
        if bits > 64 {
            return Err(DictionaryError::TooManyBits(marker_size));
        }
        if codes.is_empty() || marker_size == 0 {
            return Err(DictionaryError::Empty);
        }
        let mask = if bits == 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        };

        let mut exact = HashMap::with_capacity(codes.len() * 4);
        let mut min_distance = bits as u32;
        let rotated: Vec<[u64; 4]> = codes
            .iter()
            .map(|&c| std::array::from_fn(|r| rotate_code_u64(c, marker_size, r as u8)))
            .collect();

        for (id, &code) in codes.iter().enumerate() {
            let id = id as u32;
            if code & !mask != 0 {
                return Err(DictionaryError::CodeOutOfRange { id, code, bits });
            }
            for (rot, &rc) in rotated[id as usize].iter().enumerate() {
                if let Some(&(first, _)) = exact.get(&rc) {
                    return Err(DictionaryError::AmbiguousCodes { first, second: id });
                }
                exact.insert(rc, (id, rot as u8));
                if rot > 0 {
                    min_distance = min_distance.min((code ^ rc).count_ones());
                }
            }
            for other in &rotated[..id as usize] {
                for &oc in other {
                    min_distance = min_distance.min((code ^ oc).count_ones());
                }
            }
        }

        let max_correction_bits = (min_distance.saturating_sub(1) / 2) as u8;
        Ok(Self {
            name: name.into(),
            marker_size,
            codes,
            min_distance,
            max_correction_bits,
            exact,
        })
    }

    /// Human-readable name (for debugging/logging).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of inner bits per marker side.
    #[inline]
    pub fn marker_size(&self) -> usize {
        self.marker_size
    }

    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    #[inline]
    pub fn codes(&self) -> &[u64] {
        &self.codes
    }

    #[inline]
    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Minimum Hamming distance across all codes and rotations.
    #[inline]
    pub fn min_distance(&self) -> u32 {
        self.min_distance
    }

    /// Largest number of flipped bits that can be corrected unambiguously.
    #[inline]
    pub fn max_correction_bits(&self) -> u8 {
        self.max_correction_bits
    }

    /// `(id, rotation)` of an observed code that matches a dictionary code exactly.
    #[inline]
    pub fn lookup_exact(&self, observed: u64) -> Option<(u32, u8)> {
        self.exact.get(&observed).copied()
    }
}
