//! Simulated live values: cosmetic shot curves and payload encoders

use de1_proto::codec;
use de1_proto::{State, SubState};

/// Interval between shot samples (5 Hz).
pub const SAMPLE_PERIOD_MS: u64 = 200;

/// Interval between water-level notifications.
pub const WATER_PERIOD_SECS: u64 = 5;

/// The simulated machine values behind SHOT_SAMPLE and WATER_LEVELS.
#[derive(Debug, Clone, PartialEq)]
pub struct SimValues {
    pub pressure: f64,
    pub flow: f64,
    pub temperature: f64,
    pub set_temp: f64,
    pub set_pressure: f64,
    pub set_flow: f64,
    pub shot_timer: f64,
    pub water_level: f64,
    pub steam_temp: f64,
    pub frame_number: u8,
}

impl Default for SimValues {
    fn default() -> Self {
        Self {
            pressure: 0.0,
            flow: 0.0,
            temperature: 93.0,
            set_temp: 93.0,
            set_pressure: 9.0,
            set_flow: 2.0,
            shot_timer: 0.0,
            water_level: 75.0,
            steam_temp: 0.0,
            frame_number: 0,
        }
    }
}

impl SimValues {
    /// Reset the per-shot values at the start of an operation.
    pub fn start_shot(&mut self) {
        self.shot_timer = 0.0;
        self.pressure = 0.0;
        self.flow = 0.0;
        self.frame_number = 0;
    }

    /// Zero the live values when an operation stops.
    pub fn stop_shot(&mut self) {
        self.pressure = 0.0;
        self.flow = 0.0;
        self.steam_temp = 0.0;
        self.frame_number = 0;
    }
}

/// Advance the cosmetic curves for one 200 ms tick. The numbers only have
/// to look plausible on a shot graph.
pub fn update_curves(sim: &mut SimValues, state: State, substate: SubState) {
    match state {
        State::Espresso => match substate {
            SubState::Preinfusion => {
                sim.pressure = (sim.shot_timer * 0.8).min(4.0);
                sim.flow = 2.0;
                sim.set_pressure = 4.0;
                sim.set_flow = 2.0;
            }
            SubState::Pouring => {
                let pouring_time = sim.shot_timer - 7.0;
                sim.pressure = 8.0 + (pouring_time * 0.5).sin();
                sim.flow = 2.0 + (pouring_time * 0.3).sin() * 0.5;
                sim.set_pressure = 9.0;
                sim.set_flow = 2.0;
                sim.frame_number = (((pouring_time / 5.0) as i64 + 1).min(5)).max(0) as u8;
            }
            SubState::Ending => {
                sim.pressure = (sim.pressure - 0.5).max(0.0);
                sim.flow = (sim.flow - 0.3).max(0.0);
            }
            _ => {}
        },
        State::Steam => {
            sim.pressure = 1.5;
            sim.flow = 0.0;
            sim.steam_temp = (100.0 + sim.shot_timer * 2.0).min(150.0);
        }
        State::HotWater => {
            sim.pressure = 0.5;
            sim.flow = 6.0;
        }
        State::HotWaterRinse => {
            sim.pressure = 1.0;
            sim.flow = 8.0;
        }
        _ => {}
    }
}

/// Encode the 19-byte SHOT_SAMPLE payload. The head temperature slot
/// repeats the set temperature; clients expect the duplication.
pub fn shot_sample(sim: &SimValues) -> [u8; 19] {
    let mut out = [0u8; 19];
    out[0..2].copy_from_slice(&codec::encode_u16_be((sim.shot_timer * 100.0) as u16));
    out[2..4].copy_from_slice(&codec::encode_u16_be(codec::encode_u16p12(sim.pressure)));
    out[4..6].copy_from_slice(&codec::encode_u16_be(codec::encode_u16p12(sim.flow)));
    out[6..8].copy_from_slice(&codec::encode_u16_be(codec::encode_u16p8(sim.temperature)));
    out[8..11].copy_from_slice(&codec::encode_u24p16(sim.temperature));
    out[11..13].copy_from_slice(&codec::encode_u16_be(codec::encode_u16p8(sim.set_temp)));
    out[13..15].copy_from_slice(&codec::encode_u16_be(codec::encode_u16p8(sim.set_temp)));
    out[15] = codec::encode_u8p4(sim.set_pressure);
    out[16] = codec::encode_u8p4(sim.set_flow);
    out[17] = sim.frame_number;
    out[18] = sim.steam_temp as u8;
    out
}

/// Encode the WATER_LEVELS payload: the percentage mapped to millimetres.
pub fn water_level(pct: f64) -> [u8; 2] {
    let mm = (pct / 100.0) * 40.0 - 5.0;
    codec::encode_u16_be(codec::encode_u16p8(mm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preinfusion_ramps_pressure_to_four_bar() {
        let mut sim = SimValues::default();
        sim.shot_timer = 2.0;
        update_curves(&mut sim, State::Espresso, SubState::Preinfusion);
        assert!((sim.pressure - 1.6).abs() < 1e-9);
        assert_eq!(sim.flow, 2.0);
        assert_eq!(sim.set_pressure, 4.0);

        sim.shot_timer = 20.0;
        update_curves(&mut sim, State::Espresso, SubState::Preinfusion);
        assert_eq!(sim.pressure, 4.0);
    }

    #[test]
    fn pouring_oscillates_around_setpoint_and_advances_frames() {
        let mut sim = SimValues::default();
        sim.shot_timer = 7.0; // pouring just began
        update_curves(&mut sim, State::Espresso, SubState::Pouring);
        assert_eq!(sim.pressure, 8.0);
        assert_eq!(sim.set_pressure, 9.0);
        assert_eq!(sim.frame_number, 1);

        sim.shot_timer = 7.0 + 12.0;
        update_curves(&mut sim, State::Espresso, SubState::Pouring);
        assert!((7.0..=9.0).contains(&sim.pressure));
        assert!((1.5..=2.5).contains(&sim.flow));
        assert_eq!(sim.frame_number, 3);

        sim.shot_timer = 7.0 + 60.0;
        update_curves(&mut sim, State::Espresso, SubState::Pouring);
        assert_eq!(sim.frame_number, 5);
    }

    #[test]
    fn ending_ramps_down_and_clamps_at_zero() {
        let mut sim = SimValues::default();
        sim.pressure = 0.7;
        sim.flow = 0.2;
        update_curves(&mut sim, State::Espresso, SubState::Ending);
        assert!((sim.pressure - 0.2).abs() < 1e-9);
        assert_eq!(sim.flow, 0.0);
        update_curves(&mut sim, State::Espresso, SubState::Ending);
        assert_eq!(sim.pressure, 0.0);
    }

    #[test]
    fn steam_heats_toward_150() {
        let mut sim = SimValues::default();
        sim.shot_timer = 10.0;
        update_curves(&mut sim, State::Steam, SubState::Steaming);
        assert_eq!(sim.pressure, 1.5);
        assert_eq!(sim.flow, 0.0);
        assert_eq!(sim.steam_temp, 120.0);

        sim.shot_timer = 40.0;
        update_curves(&mut sim, State::Steam, SubState::Steaming);
        assert_eq!(sim.steam_temp, 150.0);
    }

    #[test]
    fn water_modes_use_fixed_levels() {
        let mut sim = SimValues::default();
        update_curves(&mut sim, State::HotWater, SubState::Pouring);
        assert_eq!((sim.pressure, sim.flow), (0.5, 6.0));
        update_curves(&mut sim, State::HotWaterRinse, SubState::Pouring);
        assert_eq!((sim.pressure, sim.flow), (1.0, 8.0));
    }

    #[test]
    fn shot_sample_layout() {
        let sim = SimValues {
            pressure: 1.0,
            flow: 2.0,
            temperature: 93.0,
            set_temp: 93.0,
            set_pressure: 9.0,
            set_flow: 2.0,
            shot_timer: 2.0,
            water_level: 75.0,
            steam_temp: 120.0,
            frame_number: 3,
        };
        let sample = shot_sample(&sim);
        assert_eq!(&sample[0..2], &[0x00, 0xC8]); // 200 centiseconds
        assert_eq!(&sample[2..4], &[0x10, 0x00]); // 1.0 bar, U16P12
        assert_eq!(&sample[4..6], &[0x20, 0x00]); // 2.0 mL/s
        assert_eq!(&sample[6..8], &[0x5D, 0x00]); // 93.0 C, U16P8
        assert_eq!(&sample[8..11], &[0x5D, 0x00, 0x00]); // 93.0 C, U24P16
        assert_eq!(&sample[11..13], &sample[13..15]); // setTemp duplicated
        assert_eq!(sample[15], 0x90); // 9.0, U8P4
        assert_eq!(sample[16], 0x20); // 2.0, U8P4
        assert_eq!(sample[17], 3);
        assert_eq!(sample[18], 120);
    }

    #[test]
    fn water_level_maps_percent_to_millimetres() {
        // 75 % -> 25.0 mm -> 0x1900 in U16P8
        assert_eq!(water_level(75.0), [0x19, 0x00]);
        // 12.5 % -> 0.0 mm
        assert_eq!(water_level(12.5), [0x00, 0x00]);
        // below the offset the encoder clamps at zero
        assert_eq!(water_level(0.0), [0x00, 0x00]);
    }
}
