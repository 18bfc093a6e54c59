//! The simulation engine: machine state, phase scheduling and dispatch of
//! everything the central writes
//!
//! All state lives in one `Engine` value and every mutation goes through
//! its methods, so STATE_INFO notifications come out in the same order as
//! the transitions they describe. Methods return the commands to put on
//! the control link plus an instruction for the caller's phase timer; the
//! engine never touches the network itself.

use std::time::Duration;

use de1_proto::{codec, mmr, CharId, Command, Event, FrameOutcome, ProfileAssembler, State, SubState};

use crate::eventlog::{Category, EventLog};
use crate::telemetry::{self, SimValues};

/// Instruction for the single-shot phase timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAction {
    Arm(Duration),
    Cancel,
}

/// What one engine step wants done: link commands, in order, and an
/// optional phase-timer change.
#[derive(Debug, Default, PartialEq)]
pub struct Effects {
    pub commands: Vec<Command>,
    pub phase: Option<PhaseAction>,
}

/// A normalised operator intent, one per physical panel action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Power,
    Espresso,
    Steam,
    HotWater,
    Flush,
    Stop,
    SetGhcMode(u8),
}

impl OperatorCommand {
    /// Parse a console line. Returns `None` for anything unrecognised.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let cmd = match words.next()? {
            "power" => OperatorCommand::Power,
            "espresso" => OperatorCommand::Espresso,
            "steam" => OperatorCommand::Steam,
            "water" => OperatorCommand::HotWater,
            "flush" => OperatorCommand::Flush,
            "stop" => OperatorCommand::Stop,
            "ghc" => {
                let mode: u8 = words.next()?.parse().ok()?;
                if mode > 4 {
                    return None;
                }
                OperatorCommand::SetGhcMode(mode)
            }
            _ => return None,
        };
        Some(cmd)
    }
}

pub struct Engine {
    state: State,
    substate: SubState,
    ghc_mode: u8,
    shot_active: bool,
    sim: SimValues,
    profile: ProfileAssembler,
    log: EventLog,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            substate: SubState::Ready,
            ghc_mode: 0,
            shot_active: false,
            sim: SimValues::default(),
            profile: ProfileAssembler::new(),
            log: EventLog::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn substate(&self) -> SubState {
        self.substate
    }

    pub fn ghc_mode(&self) -> u8 {
        self.ghc_mode
    }

    /// Gates the 5 Hz sample timer.
    pub fn shot_active(&self) -> bool {
        self.shot_active
    }

    pub fn sim(&self) -> &SimValues {
        &self.sim
    }

    pub fn profile(&self) -> &ProfileAssembler {
        &self.profile
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    // === Inbound from the radio agent ===

    pub fn on_link_event(&mut self, event: Event) -> Effects {
        match event {
            Event::Ready { version } => {
                self.log
                    .push(Category::Pi, format!("radio agent ready (v{version})"));
                // Push the current state and water level so a freshly
                // attached agent serves real values.
                Effects {
                    commands: vec![self.state_info_command(), self.water_level_command()],
                    phase: None,
                }
            }
            Event::Advertising => {
                self.log.push(Category::Pi, "BLE advertising started");
                Effects::default()
            }
            Event::Connected { client } => {
                self.log
                    .push(Category::Pi, format!("BLE client connected: {client}"));
                Effects::default()
            }
            Event::Disconnected => {
                self.log.push(Category::Pi, "BLE client disconnected");
                Effects::default()
            }
            Event::Write {
                characteristic,
                data,
            } => self.on_characteristic_write(characteristic, &data),
            Event::Read { characteristic } => {
                self.log
                    .push(Category::Rx, format!("CHAR_READ: {characteristic}"));
                Effects::default()
            }
            Event::Error { code } => {
                self.log
                    .push(Category::Error, format!("radio BLE error: {code}"));
                Effects::default()
            }
        }
    }

    fn on_characteristic_write(&mut self, id: CharId, data: &[u8]) -> Effects {
        match id {
            CharId::RequestedState => self.on_requested_state(data),
            CharId::ReadFromMmr => self.on_mmr_read_request(data),
            CharId::WriteToMmr => {
                match mmr::WriteRequest::parse(data) {
                    Ok(req) => self.log.push(
                        Category::Rx,
                        format!(
                            "MMR_WRITE: {} = {} (0x{:08x})",
                            mmr::address_name(req.address),
                            req.value,
                            req.value
                        ),
                    ),
                    Err(e) => self.log.push(Category::Warn, format!("MMR_WRITE: {e}")),
                }
                Effects::default()
            }
            CharId::HeaderWrite => {
                match self.profile.apply_header(data) {
                    Ok(header) => self
                        .log
                        .push(Category::Rx, format!("HEADER_WRITE: {header}")),
                    Err(_) => self.log.push(
                        Category::Rx,
                        format!("HEADER_WRITE: invalid size {}", data.len()),
                    ),
                }
                Effects::default()
            }
            CharId::FrameWrite => {
                match self.profile.apply_frame(data) {
                    Ok(FrameOutcome::Frame(frame)) => self.log.push(
                        Category::Rx,
                        format!("FRAME_WRITE[{}]: {frame}", frame.frame_index),
                    ),
                    Ok(FrameOutcome::Extension {
                        index,
                        limiter_value,
                        limiter_range,
                    }) => self.log.push(
                        Category::Rx,
                        format!("FRAME_EXT[{index}]: limiter={limiter_value:.1}, range={limiter_range:.1}"),
                    ),
                    Ok(FrameOutcome::Tail) => self.log.push(
                        Category::Rx,
                        "FRAME_WRITE: tail frame received (profile complete)",
                    ),
                    Ok(FrameOutcome::OutOfRange(index)) => self.log.push(
                        Category::Rx,
                        format!("FRAME_WRITE: index {index} out of range"),
                    ),
                    Err(_) => self.log.push(
                        Category::Rx,
                        format!("FRAME_WRITE: invalid size {}", data.len()),
                    ),
                }
                Effects::default()
            }
            CharId::ShotSettings => {
                self.on_shot_settings(data);
                Effects::default()
            }
            other => {
                self.log
                    .push(Category::Rx, format!("{other}: {}", hex(data)));
                Effects::default()
            }
        }
    }

    fn on_requested_state(&mut self, data: &[u8]) -> Effects {
        let Some(&byte) = data.first() else {
            self.log
                .push(Category::Warn, "REQUESTED_STATE: empty write");
            return Effects::default();
        };
        let Some(requested) = State::from_u8(byte) else {
            self.log.push(
                Category::Warn,
                format!("REQUESTED_STATE: unknown state 0x{byte:02x}"),
            );
            return Effects::default();
        };
        self.log.push(
            Category::Rx,
            format!("REQUESTED_STATE: {requested} (0x{byte:02x})"),
        );

        // Mode 3 means the group-head panel has sole authority: the app may
        // only park the machine.
        if self.ghc_mode == 3 && requested != State::Sleep && requested != State::Idle {
            self.log.push(
                Category::Warn,
                format!("GHC active - blocked app request: {requested}"),
            );
            return Effects::default();
        }

        match requested {
            State::Espresso | State::Steam | State::HotWater | State::HotWaterRinse => {
                self.start_operation(requested)
            }
            // Parking the machine ends whatever is running.
            State::Sleep | State::Idle => self.halt_to(requested),
            // Anything else is a plain state change; running timers are
            // left alone.
            other => self.transition_effects(other, SubState::Ready),
        }
    }

    fn on_mmr_read_request(&mut self, data: &[u8]) -> Effects {
        let request = match mmr::ReadRequest::parse(data) {
            Ok(request) => request,
            Err(e) => {
                self.log.push(Category::Warn, format!("MMR_READ: {e}"));
                return Effects::default();
            }
        };
        let name = mmr::address_name(request.address);
        self.log.push(Category::Rx, format!("MMR_READ: {name}"));

        let value = mmr::canned_value(request.address, self.ghc_mode);
        self.log
            .push(Category::Tx, format!("MMR_RESPONSE: {name} = {value}"));
        Effects {
            commands: vec![Command::Notify {
                characteristic: CharId::ReadFromMmr,
                data: mmr::read_response(request.address, value).to_vec(),
            }],
            phase: None,
        }
    }

    fn on_shot_settings(&mut self, data: &[u8]) {
        if data.len() < 9 {
            self.log.push(
                Category::Rx,
                format!("SHOT_SETTINGS: invalid size {}", data.len()),
            );
            return;
        }
        let group_temp = codec::decode_u16p8(codec::decode_u16_be(&data[7..9]));
        self.log.push(
            Category::Rx,
            format!(
                "SHOT_SETTINGS: steam={}C/{}s, hotWater={}C/{}mL, espresso={}mL, groupTemp={group_temp:.1}C",
                data[1], data[2], data[3], data[4], data[6]
            ),
        );
    }

    // === Operator surface ===

    pub fn on_operator(&mut self, cmd: OperatorCommand) -> Effects {
        match cmd {
            OperatorCommand::Power => {
                if self.state == State::Sleep {
                    self.transition_effects(State::Idle, SubState::Ready)
                } else {
                    self.halt_to(State::Sleep)
                }
            }
            OperatorCommand::Espresso => self.toggle(State::Espresso),
            OperatorCommand::Steam => self.toggle(State::Steam),
            OperatorCommand::HotWater => self.toggle(State::HotWater),
            OperatorCommand::Flush => self.toggle(State::HotWaterRinse),
            OperatorCommand::Stop => self.stop_operation(),
            OperatorCommand::SetGhcMode(mode) => {
                self.ghc_mode = mode;
                self.log
                    .push(Category::Info, format!("GHC mode set to {mode}"));
                Effects::default()
            }
        }
    }

    /// Pressing a function button while its operation runs stops it;
    /// otherwise it starts.
    fn toggle(&mut self, target: State) -> Effects {
        if self.state == target {
            self.stop_operation()
        } else {
            self.start_operation(target)
        }
    }

    // === Timers ===

    /// One 200 ms sample tick. Only called while a shot is in progress.
    pub fn on_sample_tick(&mut self) -> Effects {
        self.sim.shot_timer += 0.2;
        telemetry::update_curves(&mut self.sim, self.state, self.substate);
        Effects {
            commands: vec![Command::Notify {
                characteristic: CharId::ShotSample,
                data: telemetry::shot_sample(&self.sim).to_vec(),
            }],
            phase: None,
        }
    }

    /// Periodic water-level refresh.
    pub fn on_water_tick(&mut self) -> Effects {
        Effects {
            commands: vec![self.water_level_command()],
            phase: None,
        }
    }

    /// The single-shot phase timer fired: advance the espresso ladder or
    /// end the running operation.
    pub fn on_phase_timeout(&mut self) -> Effects {
        match (self.state, self.substate) {
            (State::Espresso, SubState::Heating) => {
                self.arm(State::Espresso, SubState::Preinfusion, 5000)
            }
            (State::Espresso, SubState::Preinfusion) => {
                self.arm(State::Espresso, SubState::Pouring, 25000)
            }
            (State::Espresso, SubState::Pouring) => {
                self.arm(State::Espresso, SubState::Ending, 2000)
            }
            (State::Espresso, SubState::Ending) => self.stop_operation(),
            (State::Steam | State::HotWater | State::HotWaterRinse, _) => self.stop_operation(),
            _ => Effects::default(),
        }
    }

    // === State machine core ===

    fn start_operation(&mut self, target: State) -> Effects {
        if self.state != State::Idle && self.state != State::Sleep {
            self.log.push(
                Category::Warn,
                format!("cannot start {target} while in {}", self.state),
            );
            return Effects::default();
        }

        let (substate, timeout_ms) = match target {
            State::Espresso => (SubState::Heating, 2000),
            State::Steam => (SubState::Steaming, 45000),
            State::HotWater => (SubState::Pouring, 30000),
            State::HotWaterRinse => (SubState::Pouring, 10000),
            other => {
                self.log
                    .push(Category::Warn, format!("{other} is not a startable operation"));
                return Effects::default();
            }
        };

        self.sim.start_shot();
        self.shot_active = true;
        self.arm(target, substate, timeout_ms)
    }

    fn stop_operation(&mut self) -> Effects {
        self.halt_to(State::Idle)
    }

    /// Cancel timers, zero the live values and settle in `(target, Ready)`.
    fn halt_to(&mut self, target: State) -> Effects {
        self.shot_active = false;
        self.sim.stop_shot();
        let mut effects = self.transition_effects(target, SubState::Ready);
        effects.phase = Some(PhaseAction::Cancel);
        effects
    }

    fn arm(&mut self, state: State, substate: SubState, timeout_ms: u64) -> Effects {
        let mut effects = self.transition_effects(state, substate);
        effects.phase = Some(PhaseAction::Arm(Duration::from_millis(timeout_ms)));
        effects
    }

    /// The one place (state, substate) is assigned; emits exactly one
    /// STATE_INFO per call.
    fn transition_effects(&mut self, state: State, substate: SubState) -> Effects {
        self.state = state;
        self.substate = substate;
        let command = self.state_info_command();
        self.log
            .push(Category::Tx, format!("STATE_INFO: {state}/{substate}"));
        Effects {
            commands: vec![command],
            phase: None,
        }
    }

    fn state_info_command(&self) -> Command {
        Command::Notify {
            characteristic: CharId::StateInfo,
            data: vec![self.state as u8, self.substate as u8],
        }
    }

    fn water_level_command(&self) -> Command {
        Command::Notify {
            characteristic: CharId::WaterLevels,
            data: telemetry::water_level(self.sim.water_level).to_vec(),
        }
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
