//! H.265 CABAC encoder. Uses a 6 bit state per context to track probabilities and a
//! 9 bit range, with the outstanding 0xff byte scheme for carry propagation.
/*
 * H.265 video codec.
 * Copyright (c) 2013-2014 struktur AG, Dirk Farin <farin@struktur.de>
 *
 * This file is part of libde265.
 *
 * libde265 is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Lesser General Public License as
 * published by the Free Software Foundation, either version 3 of
 * the License, or (at your option) any later version.
 *
 * libde265 is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Lesser General Public License for more details.
 *
 * You should have received a copy of the GNU Lesser General Public License
 * along with libde265.  If not, see <http://www.gnu.org/licenses/>.
 */
use std::io::{sink, Result, Sink};

use tracing::{debug, trace};

use crate::context::H265Context;
use crate::sink::BitstreamSink;
use crate::tables::{LPST_TABLE, RENORM_TABLE};
use crate::traits::CabacWriter;

const INITIAL_RANGE: u32 = 510;
const INITIAL_BITS_LEFT: i32 = 23;
/// a byte is shifted out of `low` once fewer bits than this are left
const RENORM_THRESHOLD: i32 = 12;

/// CABAC encoder from H265. Owns the context table of the stream it codes.
///
/// Multiple streams (wavefront rows, tiles, slices) are coded by independent
/// writers, each with its own sink.
pub struct H265Writer<W> {
    sink: W,
    low: u32,
    range: u32,
    buffered_byte: u32,
    num_buffered_bytes: u32,
    bits_left: i32,
    only_count: bool,
    finished: bool,
    contexts: Vec<H265Context>,
    pub(crate) crypto_prev_pos: u32,
}

impl<W: BitstreamSink> CabacWriter<H265Context> for H265Writer<W> {
    fn put_bypass(&mut self, value: bool) -> Result<()> {
        debug_assert!(!self.finished, "bin coded after finish");

        self.low <<= 1;
        if value {
            self.low += self.range;
        }

        self.bits_left -= 1;

        if self.bits_left < RENORM_THRESHOLD {
            self.flush_completed()?;
        }

        Ok(())
    }

    fn put(&mut self, value: bool, cur_ctx: &mut H265Context) -> Result<()> {
        debug_assert!(!self.finished, "bin coded after finish");

        let lps = LPST_TABLE[usize::from(cur_ctx.get_state())][((self.range >> 6) & 3) as usize];

        self.range -= u32::from(lps);

        if value != cur_ctx.get_mps() {
            let num_bits = RENORM_TABLE[usize::from(lps >> 3)];
            self.low = (self.low + self.range) << num_bits;
            self.range = u32::from(lps) << num_bits;

            cur_ctx.update_lps();

            self.bits_left -= i32::from(num_bits);
        } else {
            cur_ctx.update_mps();

            // renorm

            if self.range >= 256 {
                return Ok(());
            }

            self.low <<= 1;
            self.range <<= 1;
            self.bits_left -= 1;
        }

        if self.bits_left < RENORM_THRESHOLD {
            self.flush_completed()?;
        }
        Ok(())
    }

    fn put_terminate(&mut self, value: bool) -> Result<()> {
        debug_assert!(!self.finished, "bin coded after finish");

        self.range -= 2;
        if value {
            self.low += self.range;
            self.low <<= 7;
            self.range = 2 << 7;
            self.bits_left -= 7;
        } else if self.range >= 256 {
            return Ok(());
        } else {
            self.low <<= 1;
            self.range <<= 1;
            self.bits_left -= 1;
        }

        if self.bits_left < RENORM_THRESHOLD {
            self.flush_completed()?;
        }
        Ok(())
    }

    /// equivalent to `num_bins` calls of `put_bypass`, but shifts up to 8 bins into `low` at once
    fn put_bins_bypass(&mut self, bins: u32, num_bins: u32) -> Result<()> {
        debug_assert!(!self.finished, "bin coded after finish");
        debug_assert!(num_bins <= 32);

        let mut num_bins = num_bins;
        let mut bins = if num_bins < 32 {
            bins & ((1 << num_bins) - 1)
        } else {
            bins
        };

        while num_bins > 8 {
            num_bins -= 8;
            let pattern = bins >> num_bins;
            self.low <<= 8;
            self.low += self.range * pattern;
            bins -= pattern << num_bins;
            self.bits_left -= 8;

            if self.bits_left < RENORM_THRESHOLD {
                self.flush_completed()?;
            }
        }

        self.low <<= num_bins;
        self.low += self.range * bins;
        self.bits_left -= num_bins as i32;

        if self.bits_left < RENORM_THRESHOLD {
            self.flush_completed()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        debug_assert!(!self.finished, "finish called twice");
        assert!(self.bits_left <= 32);

        self.finished = true;

        if self.only_count {
            return Ok(());
        }

        if (self.low >> (32 - self.bits_left)) != 0 {
            self.sink.put_byte((self.buffered_byte + 1) as u8)?;
            while self.num_buffered_bytes > 1 {
                self.sink.put_byte(0x00)?;
                self.num_buffered_bytes -= 1;
            }

            self.low -= 1 << (32 - self.bits_left);
        } else {
            if self.num_buffered_bytes > 0 {
                self.sink.put_byte(self.buffered_byte as u8)?;
            }

            while self.num_buffered_bytes > 1 {
                self.sink.put_byte(0xff)?;
                self.num_buffered_bytes -= 1;
            }
        }
        self.num_buffered_bytes = 0;

        let bits = (24 - self.bits_left) as u32;
        self.sink.put_bits(self.low >> 8, bits)?;

        debug!(tail_bits = bits, "cabac stream finished");
        Ok(())
    }
}

impl<W: BitstreamSink> H265Writer<W> {
    /// creates a started writer with `num_contexts` contexts in state 0, MPS 0.
    /// The slice layer seeds the real initial values through [`H265Writer::set_contexts`].
    pub fn new(sink: W, num_contexts: usize) -> Self {
        Self::with_contexts(sink, vec![H265Context::default(); num_contexts])
    }

    pub fn with_contexts(sink: W, contexts: Vec<H265Context>) -> Self {
        let mut writer = H265Writer {
            sink,
            low: 0,
            range: INITIAL_RANGE,
            bits_left: INITIAL_BITS_LEFT,
            num_buffered_bytes: 0,
            buffered_byte: 0xff,
            only_count: false,
            finished: false,
            contexts,
            crypto_prev_pos: 0,
        };
        writer.start();
        writer
    }

    /// resets the coder for a new slice segment or substream. Contexts and the
    /// encryption position are left alone, they belong to the slice layer.
    pub fn start(&mut self) {
        self.low = 0;
        self.range = INITIAL_RANGE;
        self.bits_left = INITIAL_BITS_LEFT;
        self.num_buffered_bytes = 0;
        // sentinel, suppresses emission of a byte that does not exist yet
        self.buffered_byte = 0xff;
        self.only_count = false;
        self.finished = false;

        debug!(contexts = self.contexts.len(), "cabac stream started");
    }

    /// codes one bin with the context at `ctx_index` and updates that context
    pub fn encode_bin(&mut self, ctx_index: usize, value: bool) -> Result<()> {
        let mut ctx = self.contexts[ctx_index];
        let result = self.put(value, &mut ctx);
        self.contexts[ctx_index] = ctx;
        result
    }

    /// truncated unary over the owned context table, see [`CabacWriter::put_unary_max_symbol`]
    pub fn encode_unary_max_symbol(
        &mut self,
        ctx_index: usize,
        symbol: u32,
        offset: usize,
        max_symbol: u32,
    ) -> Result<()> {
        trace!(symbol, max_symbol, "ums");

        let mut contexts = std::mem::take(&mut self.contexts);
        let result =
            self.put_unary_max_symbol(symbol, max_symbol, offset, &mut contexts[ctx_index..]);
        self.contexts = contexts;
        result
    }

    pub fn contexts(&self) -> &[H265Context] {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut [H265Context] {
        &mut self.contexts
    }

    /// replaces the context table, e.g. with the initial values for a new slice
    pub fn set_contexts(&mut self, contexts: &[H265Context]) {
        self.contexts.clear();
        self.contexts.extend_from_slice(contexts);
    }

    /// in count-only mode bytes are counted in `num_buffered_bytes` instead of being written
    pub fn set_only_count(&mut self, only_count: bool) {
        self.only_count = only_count;
    }

    pub fn is_only_count(&self) -> bool {
        self.only_count
    }

    /// number of bits produced since counting started, see [`H265Writer::counting_fork`]
    pub fn bits_counted(&self) -> u32 {
        (INITIAL_BITS_LEFT - self.bits_left) as u32 + (self.num_buffered_bytes << 3)
    }

    /// copy of this coder for rate estimation. It shares nothing with `self`: contexts and
    /// the encryption position evolve independently, and nothing reaches a sink.
    pub fn counting_fork(&self) -> H265Writer<Sink> {
        H265Writer {
            sink: sink(),
            // bits above the restarted window never influence the count
            low: self.low & (0xffffffff >> INITIAL_BITS_LEFT),
            range: self.range,
            buffered_byte: self.buffered_byte,
            num_buffered_bytes: 0,
            bits_left: INITIAL_BITS_LEFT,
            only_count: true,
            finished: false,
            contexts: self.contexts.clone(),
            crypto_prev_pos: self.crypto_prev_pos,
        }
    }

    pub fn range(&self) -> u32 {
        self.range
    }

    pub fn bits_left(&self) -> i32 {
        self.bits_left
    }

    pub fn num_buffered_bytes(&self) -> u32 {
        self.num_buffered_bytes
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// rolling position of the selective encryption, carried across bypass writes
    pub fn crypto_prev_pos(&self) -> u32 {
        self.crypto_prev_pos
    }

    pub fn set_crypto_prev_pos(&mut self, prev_pos: u32) {
        self.crypto_prev_pos = prev_pos;
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// shifts the top byte out of `low`, holding back 0xff bytes until it is known
    /// whether a carry will turn them into 0x00
    fn flush_completed(&mut self) -> Result<()> {
        let lead_byte = self.low >> (24 - self.bits_left);
        self.bits_left += 8;
        self.low &= 0xffffffff >> self.bits_left;

        if self.only_count {
            self.num_buffered_bytes += 1;
            return Ok(());
        }

        if lead_byte == 0xff {
            self.num_buffered_bytes += 1;
        } else if self.num_buffered_bytes > 0 {
            let carry = lead_byte >> 8;
            let mut byte = self.buffered_byte + carry;
            self.buffered_byte = lead_byte & 0xff;

            self.sink.put_byte(byte as u8)?;

            byte = (0xff + carry) & 0xff;
            while self.num_buffered_bytes > 1 {
                self.sink.put_byte(byte as u8)?;
                self.num_buffered_bytes -= 1;
            }
        } else {
            self.num_buffered_bytes = 1;
            self.buffered_byte = lead_byte;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::sink::BitWriter;

    fn check_invariants<W: BitstreamSink>(writer: &H265Writer<W>) {
        assert!((256..=510).contains(&writer.range()), "range {0}", writer.range());
        assert!(
            (RENORM_THRESHOLD..=INITIAL_BITS_LEFT).contains(&writer.bits_left()),
            "bits_left {0}",
            writer.bits_left()
        );
        assert!(writer.buffered_byte <= 0xff);
    }

    #[test]
    fn start_state() {
        let writer = H265Writer::new(BitWriter::new(Vec::new()), 4);
        assert_eq!(writer.range(), 510);
        assert_eq!(writer.bits_left(), 23);
        assert_eq!(writer.num_buffered_bytes(), 0);
        assert_eq!(writer.buffered_byte, 0xff);
        assert!(!writer.is_only_count());
        assert_eq!(writer.contexts().len(), 4);
    }

    #[test]
    fn invariants_hold_after_every_bin() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut writer = H265Writer::new(BitWriter::new(Vec::new()), 8);

        for _ in 0..20000 {
            match rng.gen_range(0..5) {
                0 | 1 => {
                    let ctx = rng.gen_range(0..8);
                    writer.encode_bin(ctx, rng.gen_bool(0.2)).unwrap();
                }
                2 => writer.put_bypass(rng.gen()).unwrap(),
                3 => {
                    let n = rng.gen_range(0..=32);
                    writer.put_bins_bypass(rng.gen(), n).unwrap();
                }
                _ => writer.put_terminate(false).unwrap(),
            }
            check_invariants(&writer);
        }

        writer.put_terminate(true).unwrap();
        writer.finish().unwrap();
        assert!(writer.is_finished());
    }

    #[test]
    fn multi_bin_bypass_matches_single_bins() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut single = H265Writer::new(BitWriter::new(Vec::new()), 1);
        let mut multi = H265Writer::new(BitWriter::new(Vec::new()), 1);

        for _ in 0..2000 {
            let n = rng.gen_range(0..=32u32);
            let bins: u32 = rng.gen();
            multi.put_bins_bypass(bins, n).unwrap();
            for i in (0..n).rev() {
                single.put_bypass((bins >> i) & 1 != 0).unwrap();
            }
            single.encode_bin(0, n % 3 == 0).unwrap();
            multi.encode_bin(0, n % 3 == 0).unwrap();
        }

        for writer in [&mut single, &mut multi] {
            writer.put_terminate(true).unwrap();
            writer.finish().unwrap();
            writer.get_mut().put_trailing_bits().unwrap();
        }

        assert_eq!(single.into_inner().into_inner(), multi.into_inner().into_inner());
    }

    #[test]
    fn counting_matches_emitted_bytes() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut writer = H265Writer::new(BitWriter::new(Vec::new()), 4);
        let mut counter = writer.counting_fork();

        for _ in 0..5000 {
            let ctx = rng.gen_range(0..4);
            let value = rng.gen_bool(0.3);
            writer.encode_bin(ctx, value).unwrap();
            counter.encode_bin(ctx, value).unwrap();

            let bypass: u32 = rng.gen();
            writer.put_bins_bypass(bypass, 5).unwrap();
            counter.put_bins_bypass(bypass, 5).unwrap();

            // every byte shifted out is either written or still held back
            let emitted = writer.get_ref().bytes_written() as u32 + writer.num_buffered_bytes();
            assert_eq!(emitted, counter.num_buffered_bytes());
            assert_eq!(writer.bits_left(), counter.bits_left());
        }

        assert_eq!(writer.contexts(), counter.contexts());
    }

    #[test]
    fn fork_leaves_original_untouched() {
        let mut writer = H265Writer::new(BitWriter::new(Vec::new()), 2);
        for i in 0..50 {
            writer.encode_bin(i % 2, i % 5 == 0).unwrap();
        }
        let before = writer.contexts().to_vec();
        let bits_left = writer.bits_left();

        let mut fork = writer.counting_fork();
        assert_eq!(fork.bits_counted(), 0);
        for _ in 0..100 {
            fork.encode_bin(0, true).unwrap();
        }
        fork.put_bins_bypass(0x3ff, 10).unwrap();

        assert!(fork.bits_counted() >= 10);
        assert_eq!(writer.contexts(), &before[..]);
        assert_eq!(writer.bits_left(), bits_left);
    }

    #[test]
    fn bypass_counts_one_bit_each() {
        let mut counter = H265Writer::new(BitWriter::new(Vec::new()), 0).counting_fork();
        counter.put_bins_bypass(0xabcdef, 24).unwrap();
        for _ in 0..40 {
            counter.put_bypass(true).unwrap();
        }
        assert_eq!(counter.bits_counted(), 64);

        // nothing reaches the sink in count mode, even on finish
        counter.put_terminate(true).unwrap();
        counter.finish().unwrap();
    }

    #[test]
    fn restart_after_finish() {
        let mut writer = H265Writer::new(BitWriter::new(Vec::new()), 1);
        writer.encode_bin(0, true).unwrap();
        writer.put_terminate(true).unwrap();
        writer.finish().unwrap();
        writer.get_mut().put_trailing_bits().unwrap();

        writer.start();
        assert!(!writer.is_finished());
        assert_eq!(writer.range(), 510);
        // contexts survive a restart
        assert_eq!(writer.contexts()[0], H265Context::new(0, true));
    }

    #[test]
    fn unary_over_owned_contexts() {
        let mut writer = H265Writer::new(BitWriter::new(Vec::new()), 6);
        writer.encode_unary_max_symbol(2, 3, 1, 5).unwrap();

        // first bin on ctx 2, the following ones on ctx 3
        assert_eq!(writer.contexts()[2], H265Context::new(0, true));
        assert_ne!(writer.contexts()[3], H265Context::default());
        assert_eq!(writer.contexts()[4], H265Context::default());
        assert_eq!(writer.contexts().len(), 6);
    }
}
