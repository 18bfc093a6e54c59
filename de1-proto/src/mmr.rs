//! Memory-mapped register space: addresses, request parsing and the
//! canned read responses

use std::io;

use crate::codec;

pub const CPU_BOARD_MODEL: u32 = 0x800008;
pub const MACHINE_MODEL: u32 = 0x80000C;
pub const FIRMWARE_VERSION: u32 = 0x800010;
pub const FAN_THRESHOLD: u32 = 0x803808;
pub const GHC_INFO: u32 = 0x80381C;
pub const GHC_MODE: u32 = 0x803820;
pub const STEAM_FLOW: u32 = 0x803828;
pub const SERIAL_NUMBER: u32 = 0x803830;
pub const HEATER_VOLTAGE: u32 = 0x803834;
pub const USB_CHARGER: u32 = 0x803854;
pub const REFILL_KIT: u32 = 0x80385C;

pub fn address_name(address: u32) -> String {
    match address {
        CPU_BOARD_MODEL => "CPU_BOARD_MODEL".into(),
        MACHINE_MODEL => "MACHINE_MODEL".into(),
        FIRMWARE_VERSION => "FIRMWARE_VERSION".into(),
        FAN_THRESHOLD => "FAN_THRESHOLD".into(),
        GHC_INFO => "GHC_INFO".into(),
        GHC_MODE => "GHC_MODE".into(),
        STEAM_FLOW => "STEAM_FLOW".into(),
        SERIAL_NUMBER => "SERIAL_NUMBER".into(),
        HEATER_VOLTAGE => "HEATER_VOLTAGE".into(),
        USB_CHARGER => "USB_CHARGER".into(),
        REFILL_KIT => "REFILL_KIT".into(),
        other => format!("0x{other:06x}"),
    }
}

/// A read-from-MMR request: a write of at least 4 bytes whose bytes
/// `[1..4)` carry the 24-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub address: u32,
}

impl ReadRequest {
    pub fn parse(data: &[u8]) -> io::Result<Self> {
        if data.len() < 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("MMR read request too short: {} bytes", data.len()),
            ));
        }
        Ok(Self {
            address: codec::decode_address(&data[1..4]),
        })
    }
}

/// A write-to-MMR request: at least 8 bytes, address in `[1..4)` and a
/// little-endian 32-bit value in `[4..8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest {
    pub address: u32,
    pub value: u32,
}

impl WriteRequest {
    pub fn parse(data: &[u8]) -> io::Result<Self> {
        if data.len() < 8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("MMR write request too short: {} bytes", data.len()),
            ));
        }
        Ok(Self {
            address: codec::decode_address(&data[1..4]),
            value: codec::decode_u32_le(&data[4..8]),
        })
    }
}

/// The canned value served for a register. The GHC mode answers at both
/// GHC_INFO and GHC_MODE; every unlisted register reads as zero.
pub fn canned_value(address: u32, ghc_mode: u8) -> u32 {
    match address {
        GHC_INFO | GHC_MODE => ghc_mode as u32,
        USB_CHARGER => 1,
        MACHINE_MODEL => 2,
        FIRMWARE_VERSION => 0x0000_0001,
        _ => 0,
    }
}

/// Build the 8-byte response notified on READ_FROM_MMR: the 24-bit address
/// big-endian in `[0..3)`, a zero pad byte, then the value little-endian.
pub fn read_response(address: u32, value: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..3].copy_from_slice(&codec::encode_address(address));
    out[4..8].copy_from_slice(&codec::encode_u32_le(value));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_request_extracts_address() {
        let req = ReadRequest::parse(&[0x04, 0x80, 0x38, 0x1C]).unwrap();
        assert_eq!(req.address, GHC_INFO);
        assert!(ReadRequest::parse(&[0x04, 0x80]).is_err());
    }

    #[test]
    fn ghc_info_response_bytes() {
        let req = ReadRequest::parse(&[0x04, 0x80, 0x38, 0x1C]).unwrap();
        let response = read_response(req.address, canned_value(req.address, 0));
        assert_eq!(response, [0x80, 0x38, 0x1C, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn ghc_mode_served_at_both_addresses() {
        assert_eq!(canned_value(GHC_INFO, 3), 3);
        assert_eq!(canned_value(GHC_MODE, 3), 3);
    }

    #[test]
    fn canned_table() {
        assert_eq!(canned_value(USB_CHARGER, 0), 1);
        assert_eq!(canned_value(MACHINE_MODEL, 0), 2);
        assert_eq!(canned_value(FIRMWARE_VERSION, 0), 1);
        assert_eq!(canned_value(0x123456, 0), 0);
    }

    #[test]
    fn firmware_version_value_is_little_endian() {
        let response = read_response(FIRMWARE_VERSION, canned_value(FIRMWARE_VERSION, 0));
        assert_eq!(response, [0x80, 0x00, 0x10, 0x00, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn write_request_decodes_value() {
        let req =
            WriteRequest::parse(&[0x04, 0x80, 0x38, 0x08, 0x2C, 0x01, 0x00, 0x00]).unwrap();
        assert_eq!(req.address, FAN_THRESHOLD);
        assert_eq!(req.value, 300);
        assert!(WriteRequest::parse(&[0x04, 0x80, 0x38, 0x08]).is_err());
    }

    #[test]
    fn address_names() {
        assert_eq!(address_name(GHC_INFO), "GHC_INFO");
        assert_eq!(address_name(0xABCDEF), "0xabcdef");
    }
}
