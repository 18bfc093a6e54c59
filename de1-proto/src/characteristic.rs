//! The ten DE1 characteristics: short ids, properties, default payloads

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Primary service UUID `0000A000-0000-1000-8000-00805F9B34FB`.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000A000_0000_1000_8000_00805F9B34FB);

const BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;

/// Expand a four-hex-digit short id to its 128-bit UUID.
pub fn uuid_from_short(short: u16) -> Uuid {
    Uuid::from_u128(BASE_UUID | ((short as u128) << 96))
}

/// One of the ten known DE1 characteristics, or an unrecognised short id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharId {
    Version,
    RequestedState,
    ReadFromMmr,
    WriteToMmr,
    ShotSettings,
    ShotSample,
    StateInfo,
    HeaderWrite,
    FrameWrite,
    WaterLevels,
    Unknown(u16),
}

impl CharId {
    pub fn from_short(short: u16) -> Self {
        match short {
            0xA001 => CharId::Version,
            0xA002 => CharId::RequestedState,
            0xA005 => CharId::ReadFromMmr,
            0xA006 => CharId::WriteToMmr,
            0xA00B => CharId::ShotSettings,
            0xA00D => CharId::ShotSample,
            0xA00E => CharId::StateInfo,
            0xA00F => CharId::HeaderWrite,
            0xA010 => CharId::FrameWrite,
            0xA011 => CharId::WaterLevels,
            other => CharId::Unknown(other),
        }
    }

    pub fn short(&self) -> u16 {
        match self {
            CharId::Version => 0xA001,
            CharId::RequestedState => 0xA002,
            CharId::ReadFromMmr => 0xA005,
            CharId::WriteToMmr => 0xA006,
            CharId::ShotSettings => 0xA00B,
            CharId::ShotSample => 0xA00D,
            CharId::StateInfo => 0xA00E,
            CharId::HeaderWrite => 0xA00F,
            CharId::FrameWrite => 0xA010,
            CharId::WaterLevels => 0xA011,
            CharId::Unknown(short) => *short,
        }
    }

    pub fn uuid(&self) -> Uuid {
        uuid_from_short(self.short())
    }
}

impl fmt::Display for CharId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CharId::Version => "VERSION",
            CharId::RequestedState => "REQUESTED_STATE",
            CharId::ReadFromMmr => "READ_FROM_MMR",
            CharId::WriteToMmr => "WRITE_TO_MMR",
            CharId::ShotSettings => "SHOT_SETTINGS",
            CharId::ShotSample => "SHOT_SAMPLE",
            CharId::StateInfo => "STATE_INFO",
            CharId::HeaderWrite => "HEADER_WRITE",
            CharId::FrameWrite => "FRAME_WRITE",
            CharId::WaterLevels => "WATER_LEVELS",
            CharId::Unknown(short) => return write!(f, "{short:04X}"),
        };
        f.write_str(name)
    }
}

// On the wire a characteristic is its four-hex-digit short id. The agent
// emits uppercase; parsing accepts either case.
impl Serialize for CharId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:04X}", self.short()))
    }
}

impl<'de> Deserialize<'de> for CharId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let short = u16::from_str_radix(&s, 16)
            .map_err(|_| D::Error::custom(format!("invalid characteristic id: {s:?}")))?;
        Ok(CharId::from_short(short))
    }
}

/// GATT property set of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Properties {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

impl Properties {
    pub const fn new(read: bool, write: bool, notify: bool) -> Self {
        Self {
            read,
            write,
            notify,
        }
    }
}

/// One registry entry: identity, properties and the payload shipped at
/// service creation.
#[derive(Debug, Clone, Copy)]
pub struct CharacteristicSpec {
    pub id: CharId,
    pub properties: Properties,
    pub initial_value: &'static [u8],
}

/// The fixed DE1 service table. The 20-byte READ_FROM_MMR default is wider
/// than the 8-byte responses later notified on it; real firmware ships the
/// same oversized default.
pub const REGISTRY: [CharacteristicSpec; 10] = [
    CharacteristicSpec {
        id: CharId::Version,
        properties: Properties::new(true, false, false),
        initial_value: &[0x02, 0x01, 0x00, 0x00],
    },
    CharacteristicSpec {
        id: CharId::RequestedState,
        properties: Properties::new(false, true, false),
        initial_value: &[0x00],
    },
    CharacteristicSpec {
        id: CharId::ReadFromMmr,
        properties: Properties::new(true, true, true),
        initial_value: &[0; 20],
    },
    CharacteristicSpec {
        id: CharId::WriteToMmr,
        properties: Properties::new(false, true, false),
        initial_value: &[0; 20],
    },
    CharacteristicSpec {
        id: CharId::ShotSettings,
        properties: Properties::new(true, true, false),
        initial_value: &[0; 9],
    },
    CharacteristicSpec {
        id: CharId::ShotSample,
        properties: Properties::new(false, false, true),
        initial_value: &[0; 19],
    },
    CharacteristicSpec {
        id: CharId::StateInfo,
        properties: Properties::new(true, false, true),
        initial_value: &[0x02, 0x00],
    },
    CharacteristicSpec {
        id: CharId::HeaderWrite,
        properties: Properties::new(false, true, false),
        initial_value: &[0; 5],
    },
    CharacteristicSpec {
        id: CharId::FrameWrite,
        properties: Properties::new(false, true, false),
        initial_value: &[0; 8],
    },
    CharacteristicSpec {
        id: CharId::WaterLevels,
        properties: Properties::new(true, false, true),
        initial_value: &[0x4B, 0x00],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_expansion() {
        assert_eq!(
            uuid_from_short(0xA001).to_string(),
            "0000a001-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            SERVICE_UUID.to_string(),
            "0000a000-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn round_trips_through_short_id() {
        for spec in REGISTRY {
            assert_eq!(CharId::from_short(spec.id.short()), spec.id);
        }
        assert_eq!(CharId::from_short(0xA003), CharId::Unknown(0xA003));
    }

    #[test]
    fn registry_matches_service_table() {
        assert_eq!(REGISTRY.len(), 10);
        let version = &REGISTRY[0];
        assert_eq!(version.initial_value, &[0x02, 0x01, 0x00, 0x00]);
        assert!(version.properties.read && !version.properties.write);

        let mmr_read = REGISTRY.iter().find(|s| s.id == CharId::ReadFromMmr).unwrap();
        assert_eq!(mmr_read.initial_value.len(), 20);
        assert!(mmr_read.properties.read && mmr_read.properties.write && mmr_read.properties.notify);

        let water = REGISTRY.iter().find(|s| s.id == CharId::WaterLevels).unwrap();
        assert_eq!(water.initial_value, &[0x4B, 0x00]);
    }

    #[test]
    fn serde_is_hex_and_case_insensitive() {
        let json = serde_json::to_string(&CharId::StateInfo).unwrap();
        assert_eq!(json, "\"A00E\"");
        let parsed: CharId = serde_json::from_str("\"a00e\"").unwrap();
        assert_eq!(parsed, CharId::StateInfo);
        let unknown: CharId = serde_json::from_str("\"beef\"").unwrap();
        assert_eq!(unknown, CharId::Unknown(0xBEEF));
    }
}
