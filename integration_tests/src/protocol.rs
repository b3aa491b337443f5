//! Face link and NDN-TLV definitions matching the firmware.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use crc::{Crc, CRC_16_XMODEM};

/// Link framing version (must match firmware)
pub const LINK_VERSION: u8 = 1;

/// TLV types used on the face
pub const TLV_INTEREST: u64 = 0x05;
pub const TLV_DATA: u64 = 0x06;
pub const TLV_NAME: u64 = 0x07;
pub const TLV_GENERIC_COMPONENT: u64 = 0x08;
pub const TLV_NONCE: u64 = 0x0A;
pub const TLV_INTEREST_LIFETIME: u64 = 0x0C;
pub const TLV_CONTENT: u64 = 0x15;

const CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Build a link frame around an NDN packet (without COBS encoding).
/// Format: [version: u8][length: u16 LE][packet][crc16: u16 LE]
pub fn build_link_frame(packet: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(5 + packet.len());

    data.push(LINK_VERSION);
    data.extend_from_slice(&(packet.len() as u16).to_le_bytes());
    data.extend_from_slice(packet);

    let checksum = CRC.checksum(&data);
    data.extend_from_slice(&checksum.to_le_bytes());

    data
}

/// COBS encode (corncobs includes zero delimiter).
pub fn cobs_encode(data: &[u8]) -> Vec<u8> {
    let mut encoded = vec![0u8; corncobs::max_encoded_len(data.len())];
    let len = corncobs::encode_buf(data, &mut encoded);
    encoded.truncate(len);
    encoded
}

/// COBS decode a frame (with the zero delimiter).
pub fn cobs_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = vec![0u8; data.len()];
    let len = corncobs::decode_buf(data, &mut decoded)
        .map_err(|e| anyhow!("COBS decode error: {:?}", e))?;
    decoded.truncate(len);
    Ok(decoded)
}

/// Build a complete COBS-encoded frame for an NDN packet.
pub fn encode_frame(packet: &[u8]) -> Vec<u8> {
    cobs_encode(&build_link_frame(packet))
}

/// Unwrap a COBS-decoded link frame into its NDN packet.
pub fn parse_link_frame(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 5 {
        bail!("Frame too short: {} bytes", data.len());
    }
    if data[0] != LINK_VERSION {
        bail!("Link version mismatch: expected {}, got {}", LINK_VERSION, data[0]);
    }

    let length = u16::from_le_bytes([data[1], data[2]]) as usize;
    if data.len() != 5 + length {
        bail!("Frame length mismatch: header says {}, frame has {}", length, data.len() - 5);
    }

    let received_crc = u16::from_le_bytes([data[3 + length], data[4 + length]]);
    let calculated_crc = CRC.checksum(&data[..3 + length]);
    if calculated_crc != received_crc {
        bail!("CRC mismatch: expected {:04x}, got {:04x}", calculated_crc, received_crc);
    }

    Ok(data[3..3 + length].to_vec())
}

fn write_var_number(out: &mut Vec<u8>, value: u64) {
    if value < 253 {
        out.push(value as u8);
    } else if value <= u16::MAX as u64 {
        out.push(0xFD);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else {
        out.push(0xFE);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    }
}

fn write_tlv(out: &mut Vec<u8>, typ: u64, value: &[u8]) {
    write_var_number(out, typ);
    write_var_number(out, value.len() as u64);
    out.extend_from_slice(value);
}

fn read_var_number(data: &[u8], pos: &mut usize) -> Result<u64> {
    let first = *data.get(*pos).ok_or_else(|| anyhow!("TLV truncated"))?;
    *pos += 1;
    let width = match first {
        0xFD => 2,
        0xFE => 4,
        0xFF => 8,
        value => return Ok(value as u64),
    };
    let bytes = data
        .get(*pos..*pos + width)
        .ok_or_else(|| anyhow!("TLV truncated"))?;
    *pos += width;
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Read one TLV element, returning its type and value.
fn read_tlv<'a>(data: &'a [u8], pos: &mut usize) -> Result<(u64, &'a [u8])> {
    let typ = read_var_number(data, pos)?;
    let len = read_var_number(data, pos)? as usize;
    let value = data
        .get(*pos..*pos + len)
        .ok_or_else(|| anyhow!("TLV value truncated"))?;
    *pos += len;
    Ok((typ, value))
}

/// Encode a URI like `/demo/hrs/1` as the value of a Name element.
fn encode_name(uri: &str) -> Vec<u8> {
    let mut name = Vec::new();
    for component in uri.split('/').filter(|c| !c.is_empty()) {
        write_tlv(&mut name, TLV_GENERIC_COMPONENT, component.as_bytes());
    }
    name
}

fn decode_name(value: &[u8]) -> Result<String> {
    let mut uri = String::new();
    let mut pos = 0;
    while pos < value.len() {
        let (_, component) = read_tlv(value, &mut pos)?;
        uri.push('/');
        uri.push_str(&String::from_utf8_lossy(component));
    }
    Ok(uri)
}

/// Build a Data packet with the given name and content.
pub fn build_data(uri: &str, content: &[u8]) -> Vec<u8> {
    let mut inner = Vec::new();
    write_tlv(&mut inner, TLV_NAME, &encode_name(uri));
    write_tlv(&mut inner, TLV_CONTENT, content);

    let mut packet = Vec::new();
    write_tlv(&mut packet, TLV_DATA, &inner);
    packet
}

/// Build an Interest packet, for checking that the firmware ignores it.
pub fn build_interest(uri: &str, nonce: u32) -> Vec<u8> {
    let mut inner = Vec::new();
    write_tlv(&mut inner, TLV_NAME, &encode_name(uri));
    write_tlv(&mut inner, TLV_NONCE, &nonce.to_be_bytes());

    let mut packet = Vec::new();
    write_tlv(&mut packet, TLV_INTEREST, &inner);
    packet
}

/// Interest received from the firmware.
#[derive(Debug, Clone)]
pub struct Interest {
    pub name: String,
    pub nonce: Option<u32>,
    pub lifetime_ms: Option<u64>,
}

/// Parse an Interest packet.
pub fn parse_interest(packet: &[u8]) -> Result<Interest> {
    let mut pos = 0;
    let (typ, value) = read_tlv(packet, &mut pos)?;
    if typ != TLV_INTEREST {
        bail!("Expected Interest, got TLV type {:#x}", typ);
    }

    let mut interest = Interest {
        name: String::new(),
        nonce: None,
        lifetime_ms: None,
    };

    let mut pos = 0;
    while pos < value.len() {
        let (typ, element) = read_tlv(value, &mut pos)?;
        match typ {
            TLV_NAME => interest.name = decode_name(element)?,
            TLV_NONCE if element.len() == 4 => {
                interest.nonce = Some(u32::from_be_bytes([element[0], element[1], element[2], element[3]]));
            }
            TLV_INTEREST_LIFETIME => {
                interest.lifetime_ms = Some(element.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64));
            }
            _ => {}
        }
    }

    Ok(interest)
}
