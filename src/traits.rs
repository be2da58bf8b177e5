use std::io::Result;

/// implementation of a context aware binary arithmetic encoder
pub trait CabacWriter<Context> {
    /// write using bypass bin for bits that aren't worth encoding
    fn put_bypass(&mut self, bin_value: bool) -> Result<()>;

    /// write bits using given context for probability
    fn put(&mut self, value: bool, cur_ctx: &mut Context) -> Result<()>;

    /// write a terminating bin. `true` marks the end of the slice segment or substream
    fn put_terminate(&mut self, value: bool) -> Result<()>;

    /// flush any remaining state
    fn finish(&mut self) -> Result<()>;

    /// default implementation to write the low num_bins bits of bins as bypass bins,
    /// most significant first
    fn put_bins_bypass(&mut self, bins: u32, num_bins: u32) -> Result<()> {
        debug_assert!(num_bins <= 32);
        for i in (0..num_bins).rev() {
            self.put_bypass((bins >> i) & 1 != 0)?;
        }
        Ok(())
    }

    /// default implementation to write truncated unary: `symbol` ones followed by a
    /// terminating zero unless `symbol == max_symbol`. The first bin uses `contexts[0]`,
    /// all following bins use `contexts[offset]`.
    fn put_unary_max_symbol(
        &mut self,
        symbol: u32,
        max_symbol: u32,
        offset: usize,
        contexts: &mut [Context],
    ) -> Result<()> {
        debug_assert!(symbol <= max_symbol, "{0} > {1}", symbol, max_symbol);

        if max_symbol == 0 {
            return Ok(());
        }

        self.put(symbol != 0, &mut contexts[0])?;
        if symbol == 0 {
            return Ok(());
        }

        for _ in 1..symbol {
            self.put(true, &mut contexts[offset])?;
        }
        if symbol < max_symbol {
            self.put(false, &mut contexts[offset])?;
        }

        Ok(())
    }

    /// bypass flavor of [`CabacWriter::put_unary_max_symbol`]
    fn put_unary_max_symbol_bypass(&mut self, symbol: u32, max_symbol: u32) -> Result<()> {
        debug_assert!(symbol <= max_symbol, "{0} > {1}", symbol, max_symbol);

        if max_symbol == 0 {
            return Ok(());
        }

        for _ in 0..symbol {
            self.put_bypass(true)?;
        }
        if symbol < max_symbol {
            self.put_bypass(false)?;
        }

        Ok(())
    }
}

/// implementation of a context aware binary arithmetic decoder
pub trait CabacReader<Context> {
    /// read from bypass bin
    fn get_bypass(&mut self) -> Result<bool>;

    /// read using given context for probability
    fn get(&mut self, cur_ctx: &mut Context) -> Result<bool>;

    /// read a terminating bin
    fn get_terminate(&mut self) -> Result<bool>;

    /// reads num_bins bypass bins, first one ends up in the most significant position
    fn get_bins_bypass(&mut self, num_bins: u32) -> Result<u32> {
        debug_assert!(num_bins <= 32);
        let mut value = 0u32;
        for _ in 0..num_bins {
            value = (value << 1) | u32::from(self.get_bypass()?);
        }
        Ok(value)
    }

    /// reads truncated unary written by [`CabacWriter::put_unary_max_symbol`]
    fn get_unary_max_symbol(
        &mut self,
        max_symbol: u32,
        offset: usize,
        contexts: &mut [Context],
    ) -> Result<u32> {
        if max_symbol == 0 || !self.get(&mut contexts[0])? {
            return Ok(0);
        }

        let mut value = 1;
        while value < max_symbol && self.get(&mut contexts[offset])? {
            value += 1;
        }

        Ok(value)
    }

    /// reads truncated unary written by [`CabacWriter::put_unary_max_symbol_bypass`]
    fn get_unary_max_symbol_bypass(&mut self, max_symbol: u32) -> Result<u32> {
        let mut value = 0;
        while value < max_symbol && self.get_bypass()? {
            value += 1;
        }

        Ok(value)
    }
}
