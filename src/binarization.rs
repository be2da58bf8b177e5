//! Binarizations coded directly on the arithmetic coder: Rice remainder of coefficient
//! levels and k-th order exp-Golomb, both entirely in bypass bins, plus their
//! selectively encrypted variants. Truncated unary lives on [`CabacWriter`].
use std::io::Result;

use tracing::trace;

use crate::crypto::{scramble_bits, scramble_remain_suffix, KeyStream};
use crate::h265::H265Writer;
use crate::sink::BitstreamSink;
use crate::traits::CabacWriter;

/// number of prefix bins after which `coeff_abs_level_remaining` switches to exp-Golomb
const COEF_REMAIN_BIN_REDUCTION: u32 = 3;

/// prefix of the escape form: `(bins, num_bins, suffix, suffix_len)`
fn coeff_remain_escape(symbol: u32, r_param: u32) -> (u32, u32, u32, u32) {
    let mut length = r_param;
    let mut code_number = symbol - (COEF_REMAIN_BIN_REDUCTION << r_param);
    while code_number >= (1 << length) {
        code_number -= 1 << length;
        length += 1;
    }

    let num_bins = COEF_REMAIN_BIN_REDUCTION + length + 1 - r_param;
    debug_assert!(num_bins < 32, "coefficient remainder {0} too large", symbol);

    ((1 << num_bins) - 2, num_bins, code_number, length)
}

/// k-th order exp-Golomb code of `symbol` as `(code, prefix_len, suffix_len)`: the low
/// `prefix_len + suffix_len` bits of `code`, a run of ones closed by a zero followed by the
/// suffix. Codes of large symbols are longer than 32 bins.
fn ex_golomb_bins(symbol: u32, count: u32) -> (u128, u32, u32) {
    let mut symbol = u64::from(symbol);
    let mut count = count;
    let mut ones = 0u32;

    debug_assert!(count <= 32, "exp-Golomb order {0}", count);

    while symbol >= (1 << count) {
        symbol -= 1 << count;
        ones += 1;
        count += 1;
    }

    let prefix = (1u128 << (ones + 1)) - 2;
    ((prefix << count) | u128::from(symbol), ones + 1, count)
}

/// Approximate number of bins of an order 1 exp-Golomb code, `2 * floor(log2(symbol + 2))`.
/// Used by motion search to cost motion vector differences without coding them.
pub fn ex_golomb_bitcost(symbol: u32) -> u32 {
    let mut bins = 0;
    let mut symbol = symbol + 2;
    if symbol >= 1 << 8 {
        bins += 16;
        symbol >>= 8;
    }
    if symbol >= 1 << 4 {
        bins += 8;
        symbol >>= 4;
    }
    if symbol >= 1 << 2 {
        bins += 4;
        symbol >>= 2;
    }
    if symbol >= 1 << 1 {
        bins += 2;
    }
    bins
}

impl<W: BitstreamSink> H265Writer<W> {
    /// coeff_abs_level_remaining: truncated Rice prefix of at most 3 ones with an
    /// `r_param` bit suffix, escaping to exp-Golomb for larger values
    pub fn put_coeff_remain(&mut self, symbol: u32, r_param: u32) -> Result<()> {
        trace!(symbol, r_param, "coeff_abs_level_remaining");

        if symbol < (COEF_REMAIN_BIN_REDUCTION << r_param) {
            let length = symbol >> r_param;
            self.put_bins_bypass((1 << (length + 1)) - 2, length + 1)?;
            self.put_bins_bypass(symbol % (1 << r_param), r_param)
        } else {
            let (prefix, prefix_len, suffix, length) = coeff_remain_escape(symbol, r_param);
            self.put_bins_bypass(prefix, prefix_len)?;
            self.put_bins_bypass(suffix, length)
        }
    }

    /// [`H265Writer::put_coeff_remain`] with the suffix scrambled by `keys`. `base_level`
    /// is the level the remainder is relative to (1, 2 or 3). In count-only mode the plain
    /// form is coded and no key material is consumed.
    pub fn put_coeff_remain_encrypted<K: KeyStream + ?Sized>(
        &mut self,
        symbol: u32,
        r_param: u32,
        base_level: u32,
        keys: &mut K,
    ) -> Result<()> {
        if self.is_only_count() {
            return self.put_coeff_remain(symbol, r_param);
        }

        trace!(symbol, r_param, base_level, "coeff_abs_level_remaining encrypted");

        if symbol < (COEF_REMAIN_BIN_REDUCTION << r_param) {
            let length = symbol >> r_param;
            self.put_bins_bypass((1 << (length + 1)) - 2, length + 1)?;

            let writes = scramble_remain_suffix(
                keys,
                &mut self.crypto_prev_pos,
                symbol,
                r_param,
                base_level,
            );
            for &(bins, num_bins) in writes.as_slice() {
                self.put_bins_bypass(bins, num_bins)?;
            }
            Ok(())
        } else {
            let (prefix, prefix_len, suffix, length) = coeff_remain_escape(symbol, r_param);
            self.put_bins_bypass(prefix, prefix_len)?;

            let scrambled = scramble_bits(keys, &mut self.crypto_prev_pos, suffix, length);
            self.put_bins_bypass(scrambled, length)
        }
    }

    /// k-th order exp-Golomb in bypass bins (`count` is k), used for the remainder of
    /// motion vector differences and cu_qp_delta_abs
    pub fn put_ex_golomb_ep(&mut self, symbol: u32, count: u32) -> Result<()> {
        trace!(symbol, count, "ex_golomb");

        let (code, prefix_len, suffix_len) = ex_golomb_bins(symbol, count);
        self.put_ex_golomb_code(code, prefix_len, suffix_len)
    }

    /// [`H265Writer::put_ex_golomb_ep`] with the low half of the bins scrambled. For the
    /// orders used by HEVC (0 and 1) that half is exactly the suffix, so the prefix stays
    /// parseable.
    pub fn put_ex_golomb_ep_encrypted<K: KeyStream + ?Sized>(
        &mut self,
        symbol: u32,
        count: u32,
        keys: &mut K,
    ) -> Result<()> {
        trace!(symbol, count, "ex_golomb encrypted");

        let (mut code, prefix_len, suffix_len) = ex_golomb_bins(symbol, count);
        if !self.is_only_count() {
            let half = (prefix_len + suffix_len) >> 1;
            debug_assert!(half <= 32, "exp-Golomb code of {0} too long to scramble", symbol);

            let low = scramble_bits(keys, &mut self.crypto_prev_pos, code as u32, half);
            code = ((code >> half) << half) | u128::from(low);
        }
        self.put_ex_golomb_code(code, prefix_len, suffix_len)
    }

    /// bypass bins XORed with as many key bits, for sign flags
    pub fn put_bins_ep_encrypted<K: KeyStream + ?Sized>(
        &mut self,
        bins: u32,
        num_bins: u32,
        keys: &mut K,
    ) -> Result<()> {
        let bins = if self.is_only_count() {
            bins
        } else {
            bins ^ keys.get_key(num_bins)
        };
        self.put_bins_bypass(bins, num_bins)
    }

    /// codes of up to 32 bins go out in one write, longer ones as prefix then suffix
    fn put_ex_golomb_code(&mut self, code: u128, prefix_len: u32, suffix_len: u32) -> Result<()> {
        let num_bins = prefix_len + suffix_len;
        if num_bins <= 32 {
            return self.put_bins_bypass(code as u32, num_bins);
        }

        self.put_wide_bins((code >> suffix_len) as u64, prefix_len)?;
        self.put_wide_bins(code as u64, suffix_len)
    }

    /// up to 64 bypass bins, most significant first
    fn put_wide_bins(&mut self, bins: u64, num_bins: u32) -> Result<()> {
        debug_assert!(num_bins <= 64);

        if num_bins > 32 {
            self.put_bins_bypass((bins >> 32) as u32, num_bins - 32)?;
            self.put_bins_bypass(bins as u32, 32)
        } else {
            self.put_bins_bypass(bins as u32, num_bins)
        }
    }
}
