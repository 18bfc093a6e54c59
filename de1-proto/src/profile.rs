//! Espresso profile: header, frames, and the multi-frame upload assembler

use std::fmt;
use std::io;

use crate::codec;

/// Wire index at which frame-extension records start; extension `i`
/// attaches to frame `i - 32`.
pub const EXTENSION_BASE: u8 = 32;

/// Profile header, written as 5 bytes on HEADER_WRITE.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfileHeader {
    pub version: u8,
    pub num_frames: u8,
    pub num_preinfuse_frames: u8,
    pub min_pressure: f64,
    pub max_flow: f64,
}

impl ProfileHeader {
    pub fn parse(data: &[u8]) -> io::Result<Self> {
        if data.len() < 5 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("header write too short: {} bytes", data.len()),
            ));
        }
        Ok(Self {
            version: data[0],
            num_frames: data[1],
            num_preinfuse_frames: data[2],
            min_pressure: codec::decode_u8p4(data[3]),
            max_flow: codec::decode_u8p4(data[4]),
        })
    }
}

impl fmt::Display for ProfileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header: v{}, {} frames ({} preinfuse), minP={:.1} bar, maxF={:.1} mL/s",
            self.version,
            self.num_frames,
            self.num_preinfuse_frames,
            self.min_pressure,
            self.max_flow
        )
    }
}

/// One profile frame. Primary fields arrive on FRAME_WRITE at the frame's
/// own index; the limiter fields arrive separately at `EXTENSION_BASE + i`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfileFrame {
    pub frame_index: u8,
    pub flags: u8,
    pub set_value: f64,
    pub temperature: f64,
    pub duration: f64,
    pub trigger_value: f64,
    pub max_volume: u16,
    pub has_extension: bool,
    pub limiter_value: f64,
    pub limiter_range: f64,
}

impl ProfileFrame {
    /// Bit 0: pump drives flow instead of pressure.
    pub fn is_flow_mode(&self) -> bool {
        self.flags & 0x01 != 0
    }

    /// Bit 1: the frame can exit early on a trigger condition.
    pub fn has_exit_condition(&self) -> bool {
        self.flags & 0x02 != 0
    }

    /// Bit 2: exit comparator is `>` instead of `<`.
    pub fn exit_compares_greater(&self) -> bool {
        self.flags & 0x04 != 0
    }

    /// Bit 3: exit condition compares flow instead of pressure.
    pub fn exit_compares_flow(&self) -> bool {
        self.flags & 0x08 != 0
    }

    /// Bit 4: temperature sensor is the water sensor instead of coffee.
    pub fn uses_water_sensor(&self) -> bool {
        self.flags & 0x10 != 0
    }

    /// Bit 5: smooth transition into the frame instead of fast.
    pub fn smooth_transition(&self) -> bool {
        self.flags & 0x20 != 0
    }

    pub fn pump_mode(&self) -> &'static str {
        if self.is_flow_mode() {
            "Flow"
        } else {
            "Pressure"
        }
    }

    pub fn sensor(&self) -> &'static str {
        if self.uses_water_sensor() {
            "Water"
        } else {
            "Coffee"
        }
    }

    pub fn transition(&self) -> &'static str {
        if self.smooth_transition() {
            "Smooth"
        } else {
            "Fast"
        }
    }
}

impl fmt::Display for ProfileFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame {}: {} {:.1}, {:.1}C, {:.1}s",
            self.frame_index,
            self.pump_mode(),
            self.set_value,
            self.temperature,
            self.duration
        )?;
        if self.max_volume > 0 {
            write!(f, ", max {}mL", self.max_volume)?;
        }
        if self.has_exit_condition() {
            let what = if self.exit_compares_flow() {
                "Flow"
            } else {
                "Pressure"
            };
            let how = if self.exit_compares_greater() { ">" } else { "<" };
            write!(f, ", exit: {} {} {:.1}", what, how, self.trigger_value)?;
        }
        if self.has_extension {
            write!(
                f,
                " [Limiter: {:.1}/{:.1}]",
                self.limiter_value, self.limiter_range
            )?;
        }
        Ok(())
    }
}

/// Result of one FRAME_WRITE, for the caller's log line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Primary frame stored at its index.
    Frame(ProfileFrame),
    /// Extension applied to the frame at this index.
    Extension {
        index: u8,
        limiter_value: f64,
        limiter_range: f64,
    },
    /// Tail marker: the profile is fully written.
    Tail,
    /// Wire index outside every valid range; nothing changed.
    OutOfRange(u8),
}

/// Reassembles a profile from a header write followed by frame writes in
/// any order. A new header replaces the previous profile.
#[derive(Debug, Default)]
pub struct ProfileAssembler {
    header: Option<ProfileHeader>,
    frames: Vec<ProfileFrame>,
    complete: bool,
}

impl ProfileAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a HEADER_WRITE payload: remembers the header and zeroes
    /// `num_frames` slots.
    pub fn apply_header(&mut self, data: &[u8]) -> io::Result<ProfileHeader> {
        let header = ProfileHeader::parse(data)?;
        self.frames = (0..header.num_frames)
            .map(|i| ProfileFrame {
                frame_index: i,
                ..ProfileFrame::default()
            })
            .collect();
        self.header = Some(header);
        self.complete = false;
        Ok(header)
    }

    /// Apply a FRAME_WRITE payload (8 bytes, wire index first).
    pub fn apply_frame(&mut self, data: &[u8]) -> io::Result<FrameOutcome> {
        if data.len() < 8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame write too short: {} bytes", data.len()),
            ));
        }

        let wire_index = data[0];
        let num_frames = self.header.map(|h| h.num_frames).unwrap_or(0);

        if wire_index >= EXTENSION_BASE {
            let index = wire_index - EXTENSION_BASE;
            match self.frames.get_mut(index as usize) {
                Some(frame) => {
                    frame.has_extension = true;
                    frame.limiter_value = codec::decode_u8p4(data[1]);
                    frame.limiter_range = codec::decode_u8p4(data[2]);
                    Ok(FrameOutcome::Extension {
                        index,
                        limiter_value: frame.limiter_value,
                        limiter_range: frame.limiter_range,
                    })
                }
                None => Ok(FrameOutcome::OutOfRange(wire_index)),
            }
        } else if wire_index == num_frames && self.header.is_some() {
            self.complete = true;
            Ok(FrameOutcome::Tail)
        } else if (wire_index as usize) < self.frames.len() {
            let frame = &mut self.frames[wire_index as usize];
            frame.frame_index = wire_index;
            frame.flags = data[1];
            frame.set_value = codec::decode_u8p4(data[2]);
            frame.temperature = codec::decode_u8p1(data[3]);
            frame.duration = codec::decode_f8_1_7(data[4]);
            frame.trigger_value = codec::decode_u8p4(data[5]);
            frame.max_volume = codec::decode_u10p0(&data[6..8]);
            Ok(FrameOutcome::Frame(*frame))
        } else {
            Ok(FrameOutcome::OutOfRange(wire_index))
        }
    }

    pub fn header(&self) -> Option<&ProfileHeader> {
        self.header.as_ref()
    }

    pub fn frames(&self) -> &[ProfileFrame] {
        &self.frames
    }

    /// True once the tail marker arrived for the current header.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// True for the first `num_preinfuse_frames` entries.
    pub fn is_preinfuse(&self, index: usize) -> bool {
        self.header
            .map(|h| index < h.num_preinfuse_frames as usize)
            .unwrap_or(false)
    }
}
