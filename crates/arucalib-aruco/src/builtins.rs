//! Built-in dictionaries.
//!
//! Each table holds 50 codes chosen so that every pair of codes, under every
//! rotation, differs in at least the listed number of bits (and no code
//! resembles its own rotations). Between a quarter and three quarters of the
//! bits of every code are black. The tables are compiled in; the
//! [`Dictionary`] with its lookup table is built on first use and shared.

#![allow(clippy::unreadable_literal)]

use crate::Dictionary;
use std::sync::{Arc, OnceLock};

/// 4x4 bits, minimum distance 4 (corrects 1 bit).
pub const ARUCALIB_4X4_50: &str = "ARUCALIB_4X4_50";
/// 5x5 bits, minimum distance 7 (corrects 3 bits).
pub const ARUCALIB_5X5_50: &str = "ARUCALIB_5X5_50";
/// 6x6 bits, minimum distance 10 (corrects 4 bits).
pub const ARUCALIB_6X6_50: &str = "ARUCALIB_6X6_50";

/// Names accepted by [`builtin_dictionary`].
pub const BUILTIN_DICTIONARY_NAMES: &[&str] = &[ARUCALIB_4X4_50, ARUCALIB_5X5_50, ARUCALIB_6X6_50];

const CODES_4X4_50: [u64; 50] = [
    0x078d, 0xb8ad, 0xbf8e, 0x69f2,
    0x7bba, 0x5cd0, 0x1b1c, 0xe00b,
    0x23ff, 0x0852, 0x856f, 0xff25,
    0x3ba3, 0xcee1, 0xcbb5, 0x7e26,
    0x28a0, 0x0036, 0x143d, 0x244b,
    0x1e01, 0xf3b0, 0xf102, 0x83a6,
    0xc0f1, 0xb2cf, 0x427c, 0x3aec,
    0x22a7, 0x75ab, 0xa739, 0xf07a,
    0x6383, 0x7276, 0xb3d6, 0xb48b,
    0x17a0, 0xaf15, 0x1f87, 0x46a6,
    0x4d2c, 0x6e55, 0x1bfe, 0xf1cb,
    0x37fa, 0xd821, 0xe0bd, 0xbe04,
    0x17df, 0xb832,
];

const CODES_5X5_50: [u64; 50] = [
    0x0bfbe1f, 0x0421957, 0x195269b, 0x0ca7e7e,
    0x1ca4e90, 0x09abbc8, 0x12955d6, 0x17000e9,
    0x044b0bb, 0x0819334, 0x1c1bcbc, 0x0db797d,
    0x038795c, 0x0b9e23f, 0x0259bd4, 0x1d0e236,
    0x1a92b96, 0x06f8ac7, 0x0b7473c, 0x1ece1f6,
    0x05342f4, 0x092e750, 0x0edf08c, 0x0e50258,
    0x003bf07, 0x0e315d1, 0x0300416, 0x0613005,
    0x1079729, 0x088a8f1, 0x0d1e193, 0x0b0610f,
    0x17e1633, 0x127fb11, 0x1a3ae4e, 0x071a35f,
    0x08da806, 0x164a5dc, 0x0a7507b, 0x0999c69,
    0x0b680b2, 0x18b9f95, 0x0b7bf28, 0x10b6856,
    0x0f6203f, 0x083496e, 0x1d51bce, 0x1bfd223,
    0x0b03737, 0x0cb603a,
];

const CODES_6X6_50: [u64; 50] = [
    0xb83103b1e, 0x896c445de, 0xd597b76bb, 0x608c7a2e7,
    0x4e9471f3e, 0x3deae6f85, 0x0e390ce29, 0x4b47a5679,
    0x13606374b, 0xe2d26bf3c, 0x5d93fbbc7, 0x0c887a61c,
    0x29e88fd1f, 0x547dc3eac, 0xb18fa7024, 0xa02c17f26,
    0xd1bcdb142, 0x6d87a3274, 0xa0a9ba36c, 0x2697b07c1,
    0xb87bd6216, 0xa907f0f7b, 0x10aab3b20, 0xfc36f841c,
    0x994bef871, 0xa4385ada0, 0x92b139661, 0x705329715,
    0x202178eec, 0xdf738899b, 0x438475469, 0x54b396574,
    0xf633b595a, 0x20e273e57, 0x4f02c3285, 0x05e6447e7,
    0x95fcbb6e1, 0x7d34ddc92, 0x3ff87ab98, 0x789604477,
    0x0551fb6f8, 0xb77a650a2, 0x9a27026e4, 0x155f6ed1d,
    0xecdf0a4ea, 0x1ed4e2d04, 0x8fa743477, 0xb6a304685,
    0x8cb6d5b34, 0x708081efd,
];

fn cached(
    cell: &'static OnceLock<Option<Arc<Dictionary>>>,
    name: &str,
    marker_size: usize,
    codes: &[u64],
) -> Option<Arc<Dictionary>> {
    cell.get_or_init(|| match Dictionary::new(name, marker_size, codes.to_vec()) {
        Ok(dict) => Some(Arc::new(dict)),
        Err(err) => {
            log::error!("built-in dictionary {name} is invalid: {err}");
            None
        }
    })
    .clone()
}

/// Look up a built-in dictionary by name.
pub fn builtin_dictionary(name: &str) -> Option<Arc<Dictionary>> {
    static D4: OnceLock<Option<Arc<Dictionary>>> = OnceLock::new();
    static D5: OnceLock<Option<Arc<Dictionary>>> = OnceLock::new();
    static D6: OnceLock<Option<Arc<Dictionary>>> = OnceLock::new();

    match name {
        ARUCALIB_4X4_50 => cached(&D4, name, 4, &CODES_4X4_50),
        ARUCALIB_5X5_50 => cached(&D5, name, 5, &CODES_5X5_50),
        ARUCALIB_6X6_50 => cached(&D6, name, 6, &CODES_6X6_50),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_meet_their_distance_guarantees() {
        for (name, size, distance, correction) in [
            (ARUCALIB_4X4_50, 4, 4, 1),
            (ARUCALIB_5X5_50, 5, 7, 3),
            (ARUCALIB_6X6_50, 6, 10, 4),
        ] {
            let dict = builtin_dictionary(name).expect("builtin");
            assert_eq!(dict.marker_size(), size, "{name}");
            assert_eq!(dict.len(), 50, "{name}");
            assert!(dict.min_distance() >= distance, "{name}");
            assert_eq!(dict.max_correction_bits(), correction, "{name}");
        }
    }

    #[test]
    fn builtins_are_shared() {
        let a = builtin_dictionary(ARUCALIB_5X5_50).expect("builtin");
        let b = builtin_dictionary(ARUCALIB_5X5_50).expect("builtin");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(builtin_dictionary("DICT_ARUCO_ORIGINAL").is_none());
    }
}
