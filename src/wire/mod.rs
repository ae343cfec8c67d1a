// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire codec: the 12-byte PDU header, frame body layout, and the optional
//! digest/compression layers negotiated per nexus (spec §6).
//!
//! Manual big-endian byte-offset encode/decode, grounded on
//! [`rpc::types`]'s `Cdr2Encode`/`Cdr2Decode` style (fixed `_SIZE` consts,
//! `BufferTooSmall`/`UnexpectedEof` error variants) rather than a derive
//! macro — the wire format here is small and fixed enough that a macro
//! would add indirection without saving meaningful code.

pub mod compress;
pub mod digest;
pub mod frame;
pub mod header;
pub mod options;

pub use compress::Compression;
pub use digest::Digest;
pub use frame::{Frame, FrameKind};
pub use header::{Header, PduType};

use std::fmt;

/// Errors from encoding or decoding a wire structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    BufferTooSmall,
    UnexpectedEof,
    BadMagic,
    UnknownFrameKind(u8),
    UnknownDigest(u8),
    UnknownCompression(u8),
    LengthOverflow,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => f.write_str("buffer too small to encode"),
            Self::UnexpectedEof => f.write_str("unexpected end of buffer while decoding"),
            Self::BadMagic => f.write_str("PDU does not start with the DSP magic bytes"),
            Self::UnknownFrameKind(b) => write!(f, "unknown frame kind tag {b}"),
            Self::UnknownDigest(b) => write!(f, "unknown digest option {b}"),
            Self::UnknownCompression(b) => write!(f, "unknown compression option {b}"),
            Self::LengthOverflow => f.write_str("PDU length exceeds the 24-bit wire field"),
        }
    }
}

impl std::error::Error for WireError {}
