// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame body: type tag, ExchangeID, CommandSN/ExpectedCommandSN, payload.

use super::WireError;
use crate::exchange::ExchangeId;
use crate::serial::SerialNumber;

/// Frame body fixed-field size: 1 (kind) + 8 (ExchangeID) + 4 (CommandSN) +
/// 4 (ExpectedCommandSN).
pub const FIXED_FIELDS_SIZE: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    CommandRequest,
    CommandResponse,
    TaskMgmtRequest,
    TaskMgmtResponse,
    PingRequest,
    PingResponse,
    LogoutRequest,
    LogoutResponse,
    LoginConnect,
    LoginConnectResponse,
    LoginAuthenticate,
    LoginAuthenticateResponse,
    LoginNegotiate,
    LoginNegotiateResponse,
}

impl FrameKind {
    const ALL: [FrameKind; 14] = [
        Self::CommandRequest,
        Self::CommandResponse,
        Self::TaskMgmtRequest,
        Self::TaskMgmtResponse,
        Self::PingRequest,
        Self::PingResponse,
        Self::LogoutRequest,
        Self::LogoutResponse,
        Self::LoginConnect,
        Self::LoginConnectResponse,
        Self::LoginAuthenticate,
        Self::LoginAuthenticateResponse,
        Self::LoginNegotiate,
        Self::LoginNegotiateResponse,
    ];

    fn to_byte(self) -> u8 {
        Self::ALL.iter().position(|k| *k == self).expect("exhaustive") as u8
    }

    fn from_byte(b: u8) -> Result<Self, WireError> {
        Self::ALL
            .get(b as usize)
            .copied()
            .ok_or(WireError::UnknownFrameKind(b))
    }
}

/// One decoded (or to-be-encoded) frame body, carried inside a PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub exchange_id: ExchangeId,
    pub command_sn: SerialNumber,
    pub expected_command_sn: SerialNumber,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn encoded_len(&self) -> usize {
        FIXED_FIELDS_SIZE + self.payload.len()
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.kind.to_byte());
        out.extend_from_slice(&self.exchange_id.0.to_be_bytes());
        out.extend_from_slice(&self.command_sn.get().to_be_bytes());
        out.extend_from_slice(&self.expected_command_sn.get().to_be_bytes());
        out.extend_from_slice(&self.payload);
    }

    pub fn decode(src: &[u8]) -> Result<Self, WireError> {
        if src.len() < FIXED_FIELDS_SIZE {
            return Err(WireError::UnexpectedEof);
        }
        let kind = FrameKind::from_byte(src[0])?;
        let exchange_id = ExchangeId(u64::from_be_bytes(src[1..9].try_into().unwrap()));
        let command_sn = SerialNumber::new(u32::from_be_bytes(src[9..13].try_into().unwrap()));
        let expected_command_sn =
            SerialNumber::new(u32::from_be_bytes(src[13..17].try_into().unwrap()));
        let payload = src[FIXED_FIELDS_SIZE..].to_vec();
        Ok(Self {
            kind,
            exchange_id,
            command_sn,
            expected_command_sn,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame {
            kind: FrameKind::CommandRequest,
            exchange_id: ExchangeId(42),
            command_sn: SerialNumber::new(7),
            expected_command_sn: SerialNumber::new(3),
            payload: b"hello world".to_vec(),
        }
    }

    #[test]
    fn encode_decode_round_trip_every_kind() {
        for kind in FrameKind::ALL {
            let mut frame = sample();
            frame.kind = kind;
            let mut buf = Vec::new();
            frame.encode(&mut buf);
            assert_eq!(buf.len(), frame.encoded_len());
            let decoded = Frame::decode(&buf).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let buf = [0u8; 5];
        assert!(matches!(Frame::decode(&buf), Err(WireError::UnexpectedEof)));
    }

    #[test]
    fn unknown_kind_byte_is_rejected() {
        let mut frame = sample();
        let mut buf = Vec::new();
        frame.kind = FrameKind::CommandRequest;
        frame.encode(&mut buf);
        buf[0] = 200;
        assert!(matches!(
            Frame::decode(&buf),
            Err(WireError::UnknownFrameKind(200))
        ));
    }
}
