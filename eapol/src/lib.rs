// Copyright 2020 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! EAPOL framing for EAP-WSC (Wi-Fi Simple Configuration) exchanges.
//!
//! A WSC message travels nested inside four headers:
//! Ethernet -> EAPOL -> EAP -> EAP-expanded (WFA vendor).
//! This crate parses captured frames into their WSC payload and builds
//! outbound frames from scratch. All multi-byte wire fields are big-endian
//! regardless of host endianness, and every offset is validated against the
//! captured length before it is read, so a malformed or truncated frame can
//! never cause an out-of-bounds access; it simply yields `None`.

use thiserror::Error;

pub type MacAddr = [u8; 6];

/// EtherType carried in the Ethernet header for all EAPOL traffic.
pub const ETH_P_EAPOL: u16 = 0x888E;

/// IEEE Std 802.1X-2010, 11.3.1
pub const EAPOL_VERSION: u8 = 1;

/// Identity presented by a WSC enrollee in its EAP Response/Identity.
pub const WSC_ENROLLEE_IDENTITY: &[u8] = b"WFA-SimpleConfig-Enrollee-1-0";

/// Wi-Fi Alliance vendor id of the EAP-expanded header (00:37:2A).
pub const WFA_VENDOR_ID: [u8; 3] = [0x00, 0x37, 0x2A];

/// Vendor type for SimpleConfig within the WFA vendor id.
pub const WFA_SIMPLE_CONFIG: u32 = 0x0000_0001;

/// Largest WSC payload accepted into a single EAP packet.
pub const EAP_MTU: usize = 1020;

const ETH_HDR_LEN: usize = 14;
const EAPOL_HDR_LEN: usize = 4;
const EAP_HDR_LEN: usize = 5;
const EXPANDED_HDR_LEN: usize = 9;

/// IEEE Std 802.1X-2010, 11.3.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    EapPacket = 0,
    Start = 1,
    Logoff = 2,
    Key = 3,
    AsfAlert = 4,
}

/// RFC 3748, 4.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EapCode {
    Request = 1,
    Response = 2,
    Success = 3,
    Failure = 4,
}

impl EapCode {
    fn from_u8(v: u8) -> Option<EapCode> {
        match v {
            1 => Some(EapCode::Request),
            2 => Some(EapCode::Response),
            3 => Some(EapCode::Success),
            4 => Some(EapCode::Failure),
            _ => None,
        }
    }
}

/// RFC 3748, 5.1 and 5.7
pub const EAP_TYPE_IDENTITY: u8 = 1;
pub const EAP_TYPE_EXPANDED: u8 = 254;

/// WSC opcodes, Wi-Fi Simple Configuration Technical Specification v2.0.7,
/// Table 37.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Start = 0x01,
    Ack = 0x02,
    Nack = 0x03,
    Msg = 0x04,
    Done = 0x05,
    FragAck = 0x06,
}

impl OpCode {
    fn from_u8(v: u8) -> Option<OpCode> {
        match v {
            0x01 => Some(OpCode::Start),
            0x02 => Some(OpCode::Ack),
            0x03 => Some(OpCode::Nack),
            0x04 => Some(OpCode::Msg),
            0x05 => Some(OpCode::Done),
            0x06 => Some(OpCode::FragAck),
            _ => None,
        }
    }
}

/// The WSC-relevant portion of a captured frame.
#[derive(Debug, PartialEq)]
pub struct WscFrame<'a> {
    pub eap_code: EapCode,
    pub eap_id: u8,
    pub op_code: OpCode,
    pub flags: u8,
    pub payload: &'a [u8],
}

/// Everything an enrollee cares to distinguish on its EAPOL port.
#[derive(Debug, PartialEq)]
pub enum Frame<'a> {
    IdentityRequest { eap_id: u8 },
    EapSuccess,
    EapFailure,
    Wsc(WscFrame<'a>),
}

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("WSC payload of {0} bytes exceeds the EAP MTU")]
    PayloadTooLarge(usize),
}

fn read_be16(buf: &[u8], at: usize) -> Option<u16> {
    let b = buf.get(at..at + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn read_be32(buf: &[u8], at: usize) -> Option<u32> {
    let b = buf.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Parses a captured link-layer frame. Any header field out of range yields
/// `None`; the caller treats that as "no EAPOL data".
pub fn parse(frame: &[u8]) -> Option<Frame<'_>> {
    if read_be16(frame, 12)? != ETH_P_EAPOL {
        return None;
    }
    // EAPOL header: version (accepted 1 or 2), type, body length.
    let eapol_type = *frame.get(ETH_HDR_LEN + 1)?;
    match *frame.get(ETH_HDR_LEN)? {
        1 | 2 => (),
        _ => return None,
    }
    if eapol_type != PacketType::EapPacket as u8 {
        return None;
    }
    let eapol_len = read_be16(frame, ETH_HDR_LEN + 2)? as usize;
    let eap = frame.get(ETH_HDR_LEN + EAPOL_HDR_LEN..)?;
    if eapol_len > eap.len() {
        return None;
    }
    let eap = &eap[..eapol_len];

    let code = EapCode::from_u8(*eap.get(0)?)?;
    let eap_id = *eap.get(1)?;
    let eap_len = read_be16(eap, 2)? as usize;
    if eap_len < 4 || eap_len > eap.len() {
        return None;
    }
    let eap = &eap[..eap_len];
    match code {
        EapCode::Success => return Some(Frame::EapSuccess),
        EapCode::Failure => return Some(Frame::EapFailure),
        EapCode::Request | EapCode::Response => (),
    }

    match *eap.get(4)? {
        EAP_TYPE_IDENTITY => Some(Frame::IdentityRequest { eap_id }),
        EAP_TYPE_EXPANDED => {
            if eap.get(5..8)? != WFA_VENDOR_ID {
                return None;
            }
            if read_be32(eap, 8)? != WFA_SIMPLE_CONFIG {
                return None;
            }
            let op_code = OpCode::from_u8(*eap.get(12)?)?;
            let flags = *eap.get(13)?;
            Some(Frame::Wsc(WscFrame {
                eap_code: code,
                eap_id,
                op_code,
                flags,
                payload: eap.get(EAP_HDR_LEN + EXPANDED_HDR_LEN..)?,
            }))
        }
        _ => None,
    }
}

/// Locates the WSC payload nested in a captured frame, or `None` if the frame
/// does not carry one.
pub fn wsc_payload(frame: &[u8]) -> Option<WscFrame<'_>> {
    match parse(frame)? {
        Frame::Wsc(wsc) => Some(wsc),
        _ => None,
    }
}

fn write_eth_eapol(buf: &mut Vec<u8>, dst: &MacAddr, src: &MacAddr, packet_type: PacketType, body_len: usize) {
    buf.extend_from_slice(dst);
    buf.extend_from_slice(src);
    buf.extend_from_slice(&ETH_P_EAPOL.to_be_bytes());
    buf.push(EAPOL_VERSION);
    buf.push(packet_type as u8);
    buf.extend_from_slice(&(body_len as u16).to_be_bytes());
}

/// Builds an EAPOL-Start frame, the enrollee's opening move.
pub fn write_eapol_start(dst: &MacAddr, src: &MacAddr) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ETH_HDR_LEN + EAPOL_HDR_LEN);
    write_eth_eapol(&mut buf, dst, src, PacketType::Start, 0);
    buf
}

/// Builds an EAP Response/Identity frame answering an Identity request.
pub fn write_identity_response(dst: &MacAddr, src: &MacAddr, eap_id: u8, identity: &[u8]) -> Vec<u8> {
    let eap_len = EAP_HDR_LEN + identity.len();
    let mut buf = Vec::with_capacity(ETH_HDR_LEN + EAPOL_HDR_LEN + eap_len);
    write_eth_eapol(&mut buf, dst, src, PacketType::EapPacket, eap_len);
    buf.push(EapCode::Response as u8);
    buf.push(eap_id);
    buf.extend_from_slice(&(eap_len as u16).to_be_bytes());
    buf.push(EAP_TYPE_IDENTITY);
    buf.extend_from_slice(identity);
    buf
}

/// Builds an EAP-WSC frame wrapping `payload` (a WSC attribute stream, empty
/// for ACK/NACK-style opcodes that carry their attributes in `payload` too).
pub fn write_wsc_frame(
    dst: &MacAddr,
    src: &MacAddr,
    eap_code: EapCode,
    eap_id: u8,
    op_code: OpCode,
    payload: &[u8],
) -> Result<Vec<u8>, Error> {
    if payload.len() > EAP_MTU {
        return Err(Error::PayloadTooLarge(payload.len()));
    }
    let eap_len = EAP_HDR_LEN + EXPANDED_HDR_LEN + payload.len();
    let mut buf = Vec::with_capacity(ETH_HDR_LEN + EAPOL_HDR_LEN + eap_len);
    write_eth_eapol(&mut buf, dst, src, PacketType::EapPacket, eap_len);
    buf.push(eap_code as u8);
    buf.push(eap_id);
    buf.extend_from_slice(&(eap_len as u16).to_be_bytes());
    buf.push(EAP_TYPE_EXPANDED);
    buf.extend_from_slice(&WFA_VENDOR_ID);
    buf.extend_from_slice(&WFA_SIMPLE_CONFIG.to_be_bytes());
    buf.push(op_code as u8);
    buf.push(0); // flags: no fragmentation
    buf.extend_from_slice(payload);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DST: MacAddr = [0x02, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E];
    const SRC: MacAddr = [0x02, 0x01, 0x02, 0x03, 0x04, 0x05];

    #[test]
    fn wsc_frame_round_trip() {
        let payload = [0x10, 0x4A, 0x00, 0x01, 0x10];
        let frame = write_wsc_frame(&DST, &SRC, EapCode::Response, 7, OpCode::Msg, &payload)
            .expect("payload fits the MTU");
        match parse(&frame) {
            Some(Frame::Wsc(wsc)) => {
                assert_eq!(wsc.eap_code, EapCode::Response);
                assert_eq!(wsc.eap_id, 7);
                assert_eq!(wsc.op_code, OpCode::Msg);
                assert_eq!(wsc.flags, 0);
                assert_eq!(wsc.payload, &payload[..]);
            }
            other => panic!("expected a WSC frame, got {:?}", other),
        }
    }

    #[test]
    fn eapol_start_has_empty_body() {
        let frame = write_eapol_start(&DST, &SRC);
        assert_eq!(frame.len(), ETH_HDR_LEN + EAPOL_HDR_LEN);
        assert_eq!(&frame[12..14], &ETH_P_EAPOL.to_be_bytes());
        assert_eq!(frame[15], PacketType::Start as u8);
        assert_eq!(&frame[16..18], &[0, 0]);
        // An EAPOL-Start is not an EAP packet, so the parser has nothing
        // to hand to the enrollee.
        assert_eq!(parse(&frame), None);
    }

    #[test]
    fn identity_response_round_trip() {
        let frame = write_identity_response(&DST, &SRC, 3, WSC_ENROLLEE_IDENTITY);
        let eap_len = EAP_HDR_LEN + WSC_ENROLLEE_IDENTITY.len();
        assert_eq!(&frame[16..18], &(eap_len as u16).to_be_bytes());
        assert_eq!(&frame[18..20], &[EapCode::Response as u8, 3]);
        assert_eq!(&frame[frame.len() - WSC_ENROLLEE_IDENTITY.len()..], WSC_ENROLLEE_IDENTITY);
    }

    #[test]
    fn identity_request_parses() {
        // A registrar-built Request/Identity with no identity data.
        let mut frame = vec![];
        frame.extend_from_slice(&DST);
        frame.extend_from_slice(&SRC);
        frame.extend_from_slice(&ETH_P_EAPOL.to_be_bytes());
        frame.extend_from_slice(&[EAPOL_VERSION, PacketType::EapPacket as u8, 0, 5]);
        frame.extend_from_slice(&[EapCode::Request as u8, 1, 0, 5, EAP_TYPE_IDENTITY]);
        assert_eq!(parse(&frame), Some(Frame::IdentityRequest { eap_id: 1 }));
    }

    #[test]
    fn eap_success_and_failure_parse() {
        for (code, expected) in
            [(EapCode::Success, Frame::EapSuccess), (EapCode::Failure, Frame::EapFailure)]
        {
            let mut frame = vec![];
            frame.extend_from_slice(&DST);
            frame.extend_from_slice(&SRC);
            frame.extend_from_slice(&ETH_P_EAPOL.to_be_bytes());
            frame.extend_from_slice(&[EAPOL_VERSION, PacketType::EapPacket as u8, 0, 4]);
            frame.extend_from_slice(&[code as u8, 9, 0, 4]);
            assert_eq!(parse(&frame), Some(expected));
        }
    }

    #[test]
    fn rejects_wrong_ether_type() {
        let mut frame =
            write_wsc_frame(&DST, &SRC, EapCode::Request, 1, OpCode::Start, &[]).unwrap();
        frame[12] = 0x08;
        frame[13] = 0x00;
        assert_eq!(parse(&frame), None);
    }

    #[test]
    fn rejects_wrong_vendor_id() {
        let mut frame =
            write_wsc_frame(&DST, &SRC, EapCode::Request, 1, OpCode::Start, &[]).unwrap();
        let oui_at = ETH_HDR_LEN + EAPOL_HDR_LEN + EAP_HDR_LEN;
        frame[oui_at] = 0x00;
        frame[oui_at + 1] = 0x50;
        frame[oui_at + 2] = 0xF2;
        assert_eq!(parse(&frame), None);
    }

    #[test]
    fn rejects_eapol_length_past_capture() {
        let mut frame =
            write_wsc_frame(&DST, &SRC, EapCode::Response, 1, OpCode::Msg, &[1, 2, 3]).unwrap();
        // Declare one more EAPOL body byte than was captured.
        let declared = read_be16(&frame, ETH_HDR_LEN + 2).unwrap() + 1;
        frame[ETH_HDR_LEN + 2..ETH_HDR_LEN + 4].copy_from_slice(&declared.to_be_bytes());
        assert_eq!(parse(&frame), None);
    }

    #[test]
    fn no_out_of_bounds_on_any_truncation() {
        let frame =
            write_wsc_frame(&DST, &SRC, EapCode::Response, 2, OpCode::Msg, &[0xAA; 40]).unwrap();
        for len in 0..frame.len() {
            // Shorter captures must either parse to nothing or to a WSC frame
            // whose payload lies within the capture; they must never panic.
            let _ = parse(&frame[..len]);
        }
    }

    #[test]
    fn payload_over_mtu_is_rejected() {
        let payload = vec![0u8; EAP_MTU + 1];
        assert_eq!(
            write_wsc_frame(&DST, &SRC, EapCode::Response, 1, OpCode::Msg, &payload),
            Err(Error::PayloadTooLarge(EAP_MTU + 1))
        );
    }
}
