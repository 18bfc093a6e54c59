//! Machine states and substates with their fixed numeric mapping

use std::fmt;

/// Primary machine state. The numeric values are part of the wire contract
/// and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    Sleep = 0x00,
    GoingToSleep = 0x01,
    Idle = 0x02,
    Busy = 0x03,
    Espresso = 0x04,
    Steam = 0x05,
    HotWater = 0x06,
    ShortCal = 0x07,
    SelfTest = 0x08,
    LongCal = 0x09,
    Descale = 0x0A,
    FatalError = 0x0B,
    Init = 0x0C,
    NoRequest = 0x0D,
    SkipToNext = 0x0E,
    HotWaterRinse = 0x0F,
    SteamRinse = 0x10,
    Refill = 0x11,
    Clean = 0x12,
    InBootLoader = 0x13,
    AirPurge = 0x14,
    SchedIdle = 0x15,
}

impl State {
    pub fn from_u8(value: u8) -> Option<Self> {
        let state = match value {
            0x00 => State::Sleep,
            0x01 => State::GoingToSleep,
            0x02 => State::Idle,
            0x03 => State::Busy,
            0x04 => State::Espresso,
            0x05 => State::Steam,
            0x06 => State::HotWater,
            0x07 => State::ShortCal,
            0x08 => State::SelfTest,
            0x09 => State::LongCal,
            0x0A => State::Descale,
            0x0B => State::FatalError,
            0x0C => State::Init,
            0x0D => State::NoRequest,
            0x0E => State::SkipToNext,
            0x0F => State::HotWaterRinse,
            0x10 => State::SteamRinse,
            0x11 => State::Refill,
            0x12 => State::Clean,
            0x13 => State::InBootLoader,
            0x14 => State::AirPurge,
            0x15 => State::SchedIdle,
            _ => return None,
        };
        Some(state)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // HotWaterRinse is what the GHC calls "Flush".
        let name = match self {
            State::Sleep => "Sleep",
            State::GoingToSleep => "GoingToSleep",
            State::Idle => "Idle",
            State::Busy => "Busy",
            State::Espresso => "Espresso",
            State::Steam => "Steam",
            State::HotWater => "HotWater",
            State::ShortCal => "ShortCal",
            State::SelfTest => "SelfTest",
            State::LongCal => "LongCal",
            State::Descale => "Descale",
            State::FatalError => "FatalError",
            State::Init => "Init",
            State::NoRequest => "NoRequest",
            State::SkipToNext => "SkipToNext",
            State::HotWaterRinse => "Flush",
            State::SteamRinse => "SteamRinse",
            State::Refill => "Refill",
            State::Clean => "Clean",
            State::InBootLoader => "InBootLoader",
            State::AirPurge => "AirPurge",
            State::SchedIdle => "SchedIdle",
        };
        f.write_str(name)
    }
}

/// Substate within the primary state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SubState {
    Ready = 0,
    Heating = 1,
    FinalHeating = 2,
    Stabilising = 3,
    Preinfusion = 4,
    Pouring = 5,
    Ending = 6,
    Steaming = 7,
    DescaleInit = 8,
    DescaleFillGroup = 9,
    DescaleReturn = 10,
    DescaleGroup = 11,
    DescaleSteam = 12,
    CleanInit = 13,
    CleanFillGroup = 14,
    CleanSoak = 15,
    CleanGroup = 16,
    Refill = 17,
    PausedSteam = 18,
    UserNotPresent = 19,
    Puffing = 20,
}

impl SubState {
    pub fn from_u8(value: u8) -> Option<Self> {
        let substate = match value {
            0 => SubState::Ready,
            1 => SubState::Heating,
            2 => SubState::FinalHeating,
            3 => SubState::Stabilising,
            4 => SubState::Preinfusion,
            5 => SubState::Pouring,
            6 => SubState::Ending,
            7 => SubState::Steaming,
            8 => SubState::DescaleInit,
            9 => SubState::DescaleFillGroup,
            10 => SubState::DescaleReturn,
            11 => SubState::DescaleGroup,
            12 => SubState::DescaleSteam,
            13 => SubState::CleanInit,
            14 => SubState::CleanFillGroup,
            15 => SubState::CleanSoak,
            16 => SubState::CleanGroup,
            17 => SubState::Refill,
            18 => SubState::PausedSteam,
            19 => SubState::UserNotPresent,
            20 => SubState::Puffing,
            _ => return None,
        };
        Some(substate)
    }
}

impl fmt::Display for SubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_mapping_is_fixed() {
        assert_eq!(State::Sleep as u8, 0x00);
        assert_eq!(State::Idle as u8, 0x02);
        assert_eq!(State::Espresso as u8, 0x04);
        assert_eq!(State::HotWaterRinse as u8, 0x0F);
        assert_eq!(State::SchedIdle as u8, 0x15);
        assert_eq!(SubState::Ready as u8, 0);
        assert_eq!(SubState::Heating as u8, 1);
        assert_eq!(SubState::Pouring as u8, 5);
        assert_eq!(SubState::Puffing as u8, 20);
    }

    #[test]
    fn from_u8_round_trips_all_values() {
        for v in 0x00..=0x15 {
            assert_eq!(State::from_u8(v).map(|s| s as u8), Some(v));
        }
        assert_eq!(State::from_u8(0x16), None);
        for v in 0..=20 {
            assert_eq!(SubState::from_u8(v).map(|s| s as u8), Some(v));
        }
        assert_eq!(SubState::from_u8(21), None);
    }

    #[test]
    fn flush_display_name() {
        assert_eq!(State::HotWaterRinse.to_string(), "Flush");
        assert_eq!(State::Espresso.to_string(), "Espresso");
    }
}
