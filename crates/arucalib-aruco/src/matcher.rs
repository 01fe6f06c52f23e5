//! Dictionary matching and rotation helpers.

use crate::Dictionary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Marker id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` such that: `observed_code == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance between observed and dictionary code (after rotation).
    pub hamming: u8,
}

/// Matcher for a shared dictionary.
///
/// Exact observations resolve through the dictionary's hash table. Anything
/// else falls back to a brute-force scan over all ids and rotations, which is
/// cheap for dictionaries of a few hundred codes.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Arc<Dictionary>,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher accepting up to `max_hamming` flipped bits.
    ///
    /// `max_hamming` is clamped to the dictionary's correction bound so a
    /// corrupted code can never be attributed to the wrong id.
    pub fn new(dict: Arc<Dictionary>, max_hamming: u8) -> Self {
        let n = dict.marker_size();
        let rotated = dict
            .codes()
            .iter()
            .map(|&base| std::array::from_fn(|r| rotate_code_u64(base, n, r as u8)))
            .collect();
        let max_hamming = max_hamming.min(dict.max_correction_bits());

        Self {
            dict,
            max_hamming,
            rotated,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dict
    }

    /// Maximum Hamming distance allowed for matches.
    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Best match within `max_hamming`.
    ///
    /// Ties on distance go to the lowest id, then the lowest rotation.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        if let Some((id, rotation)) = self.dict.lookup_exact(observed) {
            return Some(Match {
                id,
                rotation,
                hamming: 0,
            });
        }
        if self.max_hamming == 0 {
            return None;
        }

        let mut best: Option<Match> = None;
        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming || best.is_some_and(|b| h >= b.hamming) {
                    continue;
                }
                best = Some(Match {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming: h,
                });
            }
        }
        best
    }
}

/// Rotate a code stored in row-major bits (`idx = y * n + x`) by
/// `rot * 90°` clockwise.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            out |= ((code >> (sy * n + sx)) & 1) << (y * n + x);
        }
    }
    out
}
