#![forbid(unsafe_code)]
#![forbid(trivial_numeric_casts)]
#![deny(unused_qualifications)]
#![forbid(unused_results)]
#![forbid(unreachable_pub)]
#![forbid(deprecated_in_future)]

//! Core of an HEVC (H.265) CABAC entropy encoder: the binary arithmetic
//! coder, context state machine, bypass/terminate coding, carry-propagating
//! byte emission and the binarizations built directly on top of them.

pub mod binarization;
pub mod context;
pub mod crypto;
pub mod h265;
pub mod reader;
pub mod sink;
pub mod tables;
pub mod traits;

pub use context::H265Context;
pub use crypto::{CryptoConfigError, CryptoFeatures, KeyStream};
pub use h265::H265Writer;
pub use reader::H265Reader;
pub use sink::{BitWriter, BitstreamSink};
pub use traits::{CabacReader, CabacWriter};
