// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload compression layer (spec §6): none, DEFLATE, GZIP, or LZ4.
//!
//! LZ4 frames wrap each chunk as `[u32 uncompressed_len][u32 compressed_len]
//! [bytes]`, since `lz4_flex`'s block API carries no self-describing length.

use std::io::{self, Read, Write};

use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression as Flate2Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    #[default]
    None,
    Deflate,
    Gzip,
    Lz4,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressError {
    Io(String),
    TruncatedLz4Frame,
}

impl std::fmt::Display for CompressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "compression I/O error: {msg}"),
            Self::TruncatedLz4Frame => f.write_str("truncated LZ4 chunk frame"),
        }
    }
}

impl std::error::Error for CompressError {}

impl From<io::Error> for CompressError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

const LZ4_FRAME_HEADER_LEN: usize = 8;

impl Compression {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Deflate => 1,
            Self::Gzip => 2,
            Self::Lz4 => 3,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::None),
            1 => Some(Self::Deflate),
            2 => Some(Self::Gzip),
            3 => Some(Self::Lz4),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "NONE" => Some(Self::None),
            "DEFLATE" => Some(Self::Deflate),
            "GZIP" => Some(Self::Gzip),
            "LZ4" => Some(Self::Lz4),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Deflate => "DEFLATE",
            Self::Gzip => "GZIP",
            Self::Lz4 => "LZ4",
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Deflate => {
                let mut enc = DeflateEncoder::new(Vec::new(), Flate2Level::default());
                enc.write_all(data)?;
                Ok(enc.finish()?)
            }
            Self::Gzip => {
                let mut enc = GzEncoder::new(Vec::new(), Flate2Level::default());
                enc.write_all(data)?;
                Ok(enc.finish()?)
            }
            Self::Lz4 => {
                let compressed = lz4_flex::compress(data);
                let mut out = Vec::with_capacity(LZ4_FRAME_HEADER_LEN + compressed.len());
                out.extend_from_slice(&(data.len() as u32).to_be_bytes());
                out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
                out.extend_from_slice(&compressed);
                Ok(out)
            }
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, CompressError> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Deflate => {
                let mut dec = DeflateDecoder::new(data);
                let mut out = Vec::new();
                dec.read_to_end(&mut out)?;
                Ok(out)
            }
            Self::Gzip => {
                let mut dec = GzDecoder::new(data);
                let mut out = Vec::new();
                dec.read_to_end(&mut out)?;
                Ok(out)
            }
            Self::Lz4 => {
                if data.len() < LZ4_FRAME_HEADER_LEN {
                    return Err(CompressError::TruncatedLz4Frame);
                }
                let uncompressed_len =
                    u32::from_be_bytes(data[0..4].try_into().unwrap()) as usize;
                let compressed_len = u32::from_be_bytes(data[4..8].try_into().unwrap()) as usize;
                let body = &data[LZ4_FRAME_HEADER_LEN..];
                if body.len() < compressed_len {
                    return Err(CompressError::TruncatedLz4Frame);
                }
                lz4_flex::decompress(&body[..compressed_len], uncompressed_len)
                    .map_err(|_| CompressError::TruncatedLz4Frame)
            }
        }
    }
}
