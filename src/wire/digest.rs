// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Header/frame/payload digest layer (spec §6): none, ADLER32, or CRC32.

use super::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Digest {
    #[default]
    None,
    Adler32,
    Crc32,
}

impl Digest {
    /// Width of the computed digest in bytes, 0 for `None`.
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            Self::None => 0,
            Self::Adler32 | Self::Crc32 => 4,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Adler32 => 1,
            Self::Crc32 => 2,
        }
    }

    pub fn from_byte(b: u8) -> Result<Self, WireError> {
        match b {
            0 => Ok(Self::None),
            1 => Ok(Self::Adler32),
            2 => Ok(Self::Crc32),
            other => Err(WireError::UnknownDigest(other)),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "NONE" => Some(Self::None),
            "ADLER32" => Some(Self::Adler32),
            "CRC32" => Some(Self::Crc32),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Adler32 => "ADLER32",
            Self::Crc32 => "CRC32",
        }
    }

    /// Compute the digest over `bytes`, big-endian encoded. Empty for `None`.
    #[must_use]
    pub fn compute(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::None => Vec::new(),
            Self::Adler32 => adler2::adler32_slice(bytes).to_be_bytes().to_vec(),
            Self::Crc32 => crc32fast::hash(bytes).to_be_bytes().to_vec(),
        }
    }

    /// Verify that `digest` (as transmitted on the wire) matches `bytes`.
    #[must_use]
    pub fn verify(self, bytes: &[u8], digest: &[u8]) -> bool {
        self.compute(bytes) == digest
    }
}
