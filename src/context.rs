use bytemuck::{Pod, Zeroable};

use crate::tables::{ENTROPY_BITS, NEXT_STATE_LPS, NEXT_STATE_MPS};

/// context that tracks the probability of the next most probable symbol (either 1 or 0).
///
/// A single byte packing a 6 bit probability state with the MPS in the lowest bit. The
/// layout is transparent so a table of initial values produced by the slice layer can be
/// reinterpreted as contexts with [`H265Context::cast_slice`].
#[repr(transparent)]
#[derive(Default, Copy, Clone, Eq, PartialEq, Hash, Pod, Zeroable)]
pub struct H265Context {
    uc_state: u8,
}

impl H265Context {
    pub fn new(state: u8, mps: bool) -> Self {
        debug_assert!(state < 64, "probability state {0} out of range", state);
        H265Context {
            uc_state: (state << 1) | u8::from(mps),
        }
    }

    /// builds a context from its packed `(state << 1) | mps` representation
    pub fn from_packed(packed: u8) -> Self {
        debug_assert!(packed < 128);
        H265Context { uc_state: packed }
    }

    pub fn packed(&self) -> u8 {
        self.uc_state
    }

    pub fn get_state(&self) -> u8 {
        self.uc_state >> 1
    }

    pub fn get_mps(&self) -> bool {
        (self.uc_state & 1) == 1
    }

    #[inline(always)]
    pub(crate) fn update_lps(&mut self) {
        self.uc_state = NEXT_STATE_LPS[usize::from(self.uc_state)];
    }

    #[inline(always)]
    pub(crate) fn update_mps(&mut self) {
        self.uc_state = NEXT_STATE_MPS[usize::from(self.uc_state)];
    }

    /// estimated cost of coding `bin` with this context, see [`crate::tables::CTX_FRAC_BITS`]
    pub fn entropy_bits(&self, bin: bool) -> u32 {
        ENTROPY_BITS[usize::from(self.uc_state ^ u8::from(bin))]
    }

    /// views a byte table of packed initial values as contexts without copying
    pub fn cast_slice(packed: &[u8]) -> &[H265Context] {
        bytemuck::cast_slice(packed)
    }
}

impl std::fmt::Debug for H265Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("H265Context")
            .field("state", &self.get_state())
            .field("mps", &self.get_mps())
            .finish()
    }
}
