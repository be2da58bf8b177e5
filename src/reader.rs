//! Normative CABAC decoding engine. The encoder never needs it; it exists to check
//! that what [`crate::H265Writer`] produces parses back into the same bins.
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
use std::io::{ErrorKind, Read, Result};

use byteorder::ReadBytesExt;

use crate::context::H265Context;
use crate::tables::{LPST_TABLE, RENORM_TABLE};
use crate::traits::CabacReader;

/// CABAC decoder from H265
pub struct H265Reader<R> {
    reader: R,
    value: u32,
    range: u32,
    bits_needed: i32,
}

impl<R: Read> CabacReader<H265Context> for H265Reader<R> {
    fn get_bypass(&mut self) -> Result<bool> {
        self.value <<= 1;
        self.bits_needed += 1;

        if self.bits_needed >= 0 {
            self.bits_needed = -8;
            self.value |= self.next_byte()?;
        }

        let scaled_range = self.range << 7;

        let r = self.value.overflowing_sub(scaled_range);

        if r.1 {
            Ok(false)
        } else {
            self.value = r.0;
            Ok(true)
        }
    }

    fn get(&mut self, cur_ctx: &mut H265Context) -> Result<bool> {
        let mut range = self.range;
        let mut value = self.value;

        let lps = LPST_TABLE[usize::from(cur_ctx.get_state())][((range >> 6) & 3) as usize];

        range -= u32::from(lps);

        let scaled_range = range << 7;

        let bit;

        let r = value.overflowing_sub(scaled_range);

        if r.1 {
            // MPS path

            bit = cur_ctx.get_mps();

            cur_ctx.update_mps();

            if scaled_range < (256 << 7) {
                // scaled range, highest bit (15) not set

                range = scaled_range >> 6; // shift range by one bit
                value <<= 1; // shift value by one bit
                self.bits_needed += 1;

                if self.bits_needed == 0 {
                    self.bits_needed = -8;
                    value |= self.next_byte()?;
                }
            }
        } else {
            // LPS path

            value = r.0;

            let num_bits = RENORM_TABLE[usize::from(lps >> 3)];
            value <<= num_bits;
            range = u32::from(lps) << num_bits; /* this is always >= 0x100 except for state 63,
                                                but state 63 is never used */

            bit = !cur_ctx.get_mps();

            cur_ctx.update_lps();

            self.bits_needed += i32::from(num_bits);

            if self.bits_needed >= 0 {
                value |= self.next_byte()? << self.bits_needed;

                self.bits_needed -= 8;
            }
        }

        self.range = range;
        self.value = value;

        Ok(bit)
    }

    fn get_terminate(&mut self) -> Result<bool> {
        self.range -= 2;
        let scaled_range = self.range << 7;

        if self.value >= scaled_range {
            return Ok(true);
        }

        // the renormalization loop runs at most once here
        if scaled_range < (256 << 7) {
            self.range = scaled_range >> 6;
            self.value <<= 1;
            self.bits_needed += 1;

            if self.bits_needed == 0 {
                self.bits_needed = -8;
                self.value |= self.next_byte()?;
            }
        }

        Ok(false)
    }
}

impl<R: Read> H265Reader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut r = H265Reader {
            reader,
            value: 0,
            range: 510,
            bits_needed: 8,
        };

        r.value = (r.next_byte()? << 8) | r.next_byte()?;
        r.bits_needed -= 16;

        Ok(r)
    }

    /// reading past the end of the payload yields zero bits, like a decoder that
    /// has consumed the whole slice segment data
    fn next_byte(&mut self) -> Result<u32> {
        match self.reader.read_u8() {
            Ok(b) => Ok(u32::from(b)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(0),
            Err(e) => Err(e),
        }
    }
}
