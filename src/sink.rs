//! Byte oriented output for the arithmetic coder.
//!
//! The coder only ever appends: whole bytes while coding, and a final run of
//! bits when the stream is flushed. Start code emulation prevention belongs to
//! the NAL layer and is not done here.
use std::io::{Result, Sink, Write};

use byteorder::WriteBytesExt;

/// Append-only destination of the coded bitstream.
pub trait BitstreamSink {
    /// append one 8 bit value
    fn put_byte(&mut self, byte: u8) -> Result<()>;

    /// append the low `num_bits` bits of `value`, most significant bit first
    fn put_bits(&mut self, value: u32, num_bits: u32) -> Result<()>;
}

impl<S: BitstreamSink + ?Sized> BitstreamSink for &mut S {
    fn put_byte(&mut self, byte: u8) -> Result<()> {
        (**self).put_byte(byte)
    }

    fn put_bits(&mut self, value: u32, num_bits: u32) -> Result<()> {
        (**self).put_bits(value, num_bits)
    }
}

/// discards everything, used by rate estimation copies of the coder
impl BitstreamSink for Sink {
    fn put_byte(&mut self, _byte: u8) -> Result<()> {
        Ok(())
    }

    fn put_bits(&mut self, _value: u32, _num_bits: u32) -> Result<()> {
        Ok(())
    }
}

/// MSB-first bit packer on top of any [`Write`].
pub struct BitWriter<W> {
    writer: W,
    cur_byte: u32,
    num_bits: u32,
    bytes_written: u64,
}

impl<W: Write> BitWriter<W> {
    pub fn new(writer: W) -> Self {
        BitWriter {
            writer,
            cur_byte: 0,
            num_bits: 0,
            bytes_written: 0,
        }
    }

    /// number of complete bytes handed to the underlying writer
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// total number of bits appended so far, including a pending partial byte
    pub fn bits_written(&self) -> u64 {
        self.bytes_written * 8 + u64::from(self.num_bits)
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.num_bits == 0
    }

    /// pads the current byte with zero bits
    pub fn align_zero(&mut self) -> Result<()> {
        if self.num_bits > 0 {
            self.put_bits(0, 8 - self.num_bits)?;
        }
        Ok(())
    }

    /// rbsp_trailing_bits / byte_alignment: a single one bit followed by zero alignment.
    /// Written after the coder of a slice segment or substream has been finished.
    pub fn put_trailing_bits(&mut self) -> Result<()> {
        self.put_bits(1, 1)?;
        self.align_zero()
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// returns the underlying writer, the stream must be byte aligned
    pub fn into_inner(self) -> W {
        debug_assert!(self.is_byte_aligned(), "{0} bits pending", self.num_bits);
        self.writer
    }

    fn emit(&mut self, byte: u8) -> Result<()> {
        self.writer.write_u8(byte)?;
        self.bytes_written += 1;
        Ok(())
    }
}

impl<W: Write> BitstreamSink for BitWriter<W> {
    fn put_byte(&mut self, byte: u8) -> Result<()> {
        if self.num_bits == 0 {
            self.emit(byte)
        } else {
            self.put_bits(u32::from(byte), 8)
        }
    }

    fn put_bits(&mut self, value: u32, num_bits: u32) -> Result<()> {
        debug_assert!(num_bits <= 32);

        let mut remaining = num_bits;
        while remaining > 0 {
            let take = (8 - self.num_bits).min(remaining);
            let chunk = (value >> (remaining - take)) & ((1 << take) - 1);

            self.cur_byte = (self.cur_byte << take) | chunk;
            self.num_bits += take;
            remaining -= take;

            if self.num_bits == 8 {
                let byte = self.cur_byte as u8;
                self.cur_byte = 0;
                self.num_bits = 0;
                self.emit(byte)?;
            }
        }

        Ok(())
    }
}
