//! Selective encryption of bypass coded suffixes.
//!
//! Only bins whose value does not influence parsing are scrambled: suffixes of
//! `coeff_abs_level_remaining`, exp-Golomb motion vector residuals and sign flags.
//! The bitstream stays decodable by any HEVC decoder, and a decoder holding the
//! same keystream can undo the transform.
//!
//! The transform threads a rolling position through every scrambled value:
//! `prev_pos = (suffix + (prev_pos ^ key)) & mask`, and `prev_pos` is what gets coded.
use std::str::FromStr;

use bitflags::bitflags;
use thiserror::Error;

/// Source of pseudo-random bits for the encryption hooks.
pub trait KeyStream {
    /// returns `num_bits` (at most 32) fresh bits in the low bits of the result
    fn get_key(&mut self, num_bits: u32) -> u32;
}

impl<K: KeyStream + ?Sized> KeyStream for &mut K {
    fn get_key(&mut self, num_bits: u32) -> u32 {
        (**self).get_key(num_bits)
    }
}

bitflags! {
    /// Syntax elements the slice layer routes through the encryption hooks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CryptoFeatures: u32 {
        /// exp-Golomb suffix of motion vector differences
        const MVS = 1 << 0;
        const MV_SIGNS = 1 << 1;
        /// coeff_abs_level_remaining suffixes
        const TRANSF_COEFFS = 1 << 2;
        const TRANSF_COEFF_SIGNS = 1 << 3;
        const INTRA_MODE = 1 << 4;
    }
}

impl CryptoFeatures {
    pub const OFF: Self = Self::empty();
    pub const ON: Self = Self::all();
}

/// Error parsing a [`CryptoFeatures`] description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoConfigError {
    #[error("Unknown crypto feature: {0:?}")]
    UnknownFeature(String),
}

impl FromStr for CryptoFeatures {
    type Err = CryptoConfigError;

    /// accepts `on`, `off` or a `+` separated list such as `mvs+trans_coeff_signs`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => return Ok(Self::ON),
            "off" => return Ok(Self::OFF),
            _ => {}
        }

        let mut features = Self::empty();
        for name in s.split('+') {
            features |= match name {
                "mvs" => Self::MVS,
                "mv_signs" => Self::MV_SIGNS,
                "trans_coeffs" => Self::TRANSF_COEFFS,
                "trans_coeff_signs" => Self::TRANSF_COEFF_SIGNS,
                "intra_pred_modes" => Self::INTRA_MODE,
                _ => return Err(CryptoConfigError::UnknownFeature(name.to_string())),
            };
        }

        Ok(features)
    }
}

fn low_mask(num_bits: u32) -> u32 {
    if num_bits >= 32 {
        u32::MAX
    } else {
        (1 << num_bits) - 1
    }
}

/// Scrambles the low `num_bits` of `suffix` into `prev_pos` and returns the new position.
pub fn scramble_bits<K: KeyStream + ?Sized>(
    keys: &mut K,
    prev_pos: &mut u32,
    suffix: u32,
    num_bits: u32,
) -> u32 {
    let key = keys.get_key(num_bits);
    *prev_pos = suffix.wrapping_add(*prev_pos ^ key) & low_mask(num_bits);
    *prev_pos
}

/// like [`scramble_bits`], but the coded value keeps `kept` above the scrambled low bits
fn scramble_low<K: KeyStream + ?Sized>(
    keys: &mut K,
    prev_pos: &mut u32,
    kept: u32,
    low: u32,
    num_bits: u32,
) -> u32 {
    let key = keys.get_key(num_bits);
    *prev_pos = kept + (low.wrapping_add(*prev_pos ^ key) & low_mask(num_bits));
    *prev_pos
}

/// Bypass writes `(bins, num_bins)` produced for one suffix, in coding order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BypassWrites {
    writes: [(u32, u32); 2],
    len: usize,
}

impl BypassWrites {
    fn push(&mut self, bins: u32, num_bins: u32) {
        self.writes[self.len] = (bins, num_bins);
        self.len += 1;
    }

    pub fn as_slice(&self) -> &[(u32, u32)] {
        &self.writes[..self.len]
    }
}

/// Encrypted Rice suffix of a `coeff_abs_level_remaining` value coded with the short
/// (non escape) prefix, i.e. `code_number < 3 << r_param`.
///
/// Which suffix bits are scrambled depends on the Rice parameter, the base level of the
/// coefficient and the band `code_number` falls in: values whose plain suffix would change
/// how the following Rice parameter is derived are only partially scrambled (or not at
/// all), so the decoder-visible parameter adaptation is unaffected. These bands must be
/// reproduced exactly for a matching decryptor. For `base_level == 3` and `r_param == 3`
/// the plain suffix is coded in addition to the scrambled one.
pub fn scramble_remain_suffix<K: KeyStream + ?Sized>(
    keys: &mut K,
    prev_pos: &mut u32,
    code_number: u32,
    r_param: u32,
    base_level: u32,
) -> BypassWrites {
    debug_assert!(r_param <= 4, "rice parameter {0}", r_param);
    debug_assert!(code_number < (3 << r_param));

    let mut out = BypassWrites::default();
    let cn = code_number;
    let s = cn & low_mask(r_param);

    match r_param {
        0 => {}
        1 => {
            if base_level == 2 && (cn == 4 || cn == 5) {
                out.push(s, 1);
            } else {
                out.push(scramble_bits(keys, prev_pos, s, 1), 1);
            }
        }
        2 => match base_level {
            1 => out.push(scramble_bits(keys, prev_pos, s, 2), 2),
            2 => {
                if cn <= 7 || cn >= 12 {
                    out.push(scramble_bits(keys, prev_pos, s, 2), 2);
                } else if cn < 10 {
                    out.push(scramble_low(keys, prev_pos, 0, s & 1, 1), 2);
                } else {
                    out.push(s, 2);
                }
            }
            _ => {
                if cn <= 7 || cn > 11 {
                    out.push(scramble_bits(keys, prev_pos, s, 2), 2);
                } else {
                    out.push(scramble_low(keys, prev_pos, s & 2, s & 1, 1), 2);
                }
            }
        },
        3 => match base_level {
            1 => out.push(scramble_bits(keys, prev_pos, s, 3), 3),
            2 => {
                if cn <= 15 || cn > 23 {
                    out.push(scramble_bits(keys, prev_pos, s, 3), 3);
                } else if cn <= 19 {
                    out.push(scramble_low(keys, prev_pos, s & 4, s & 3, 2), 3);
                } else if cn <= 21 {
                    out.push(scramble_low(keys, prev_pos, 4, s & 1, 1), 3);
                } else {
                    out.push(s, 3);
                }
            }
            _ => {
                out.push(s, 3);
                if cn <= 15 || cn > 23 {
                    out.push(scramble_bits(keys, prev_pos, s, 3), 3);
                } else if cn <= 19 {
                    out.push(scramble_low(keys, prev_pos, 0, s & 3, 2), 3);
                } else if cn <= 23 {
                    out.push(scramble_low(keys, prev_pos, s & 6, s & 1, 1), 3);
                }
            }
        },
        4 => match base_level {
            1 => out.push(scramble_bits(keys, prev_pos, s, 4), 4),
            2 => {
                if cn <= 31 || cn > 47 {
                    out.push(scramble_bits(keys, prev_pos, s, 4), 4);
                } else if cn <= 39 {
                    out.push(scramble_low(keys, prev_pos, 0, s & 7, 3), 4);
                } else if cn <= 43 {
                    out.push(scramble_low(keys, prev_pos, 8, s & 3, 2), 4);
                } else if cn <= 45 {
                    out.push(scramble_low(keys, prev_pos, 12, s & 1, 1), 4);
                } else {
                    out.push(s, 4);
                }
            }
            _ => {
                if cn <= 31 || cn > 47 {
                    out.push(scramble_bits(keys, prev_pos, s, 4), 4);
                } else if cn <= 39 {
                    out.push(scramble_low(keys, prev_pos, 0, s & 7, 3), 4);
                } else if cn <= 43 {
                    out.push(scramble_low(keys, prev_pos, 8, s & 3, 2), 4);
                } else if cn <= 47 {
                    out.push(scramble_low(keys, prev_pos, s & 14, s & 1, 1), 4);
                }
            }
        },
        // HEVC version 1 caps the Rice parameter at 4, nothing is coded beyond it
        _ => {}
    }

    out
}

/// AES-128 in counter mode, handing out bits most significant first.
#[cfg(feature = "aes")]
pub struct AesKeyStream {
    cipher: aes::Aes128,
    counter: u128,
    block: [u8; 16],
    block_pos: usize,
    pool: u64,
    pool_bits: u32,
}

#[cfg(feature = "aes")]
impl AesKeyStream {
    pub fn new(key: [u8; 16], nonce: u64) -> Self {
        use aes::cipher::{generic_array::GenericArray, KeyInit};

        AesKeyStream {
            cipher: aes::Aes128::new(&GenericArray::from(key)),
            counter: u128::from(nonce) << 64,
            block: [0; 16],
            block_pos: 16,
            pool: 0,
            pool_bits: 0,
        }
    }

    fn next_byte(&mut self) -> u8 {
        use aes::cipher::{generic_array::GenericArray, BlockEncrypt};

        if self.block_pos == self.block.len() {
            let mut block = GenericArray::from(self.counter.to_be_bytes());
            self.cipher.encrypt_block(&mut block);
            self.block.copy_from_slice(&block);
            self.counter = self.counter.wrapping_add(1);
            self.block_pos = 0;
        }

        let b = self.block[self.block_pos];
        self.block_pos += 1;
        b
    }
}

#[cfg(feature = "aes")]
impl KeyStream for AesKeyStream {
    fn get_key(&mut self, num_bits: u32) -> u32 {
        debug_assert!(num_bits <= 32);

        while self.pool_bits < num_bits {
            self.pool = (self.pool << 8) | u64::from(self.next_byte());
            self.pool_bits += 8;
        }

        self.pool_bits -= num_bits;
        let key = (self.pool >> self.pool_bits) & u64::from(low_mask(num_bits));
        self.pool &= (1u64 << self.pool_bits) - 1;
        key as u32
    }
}
