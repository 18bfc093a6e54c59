//! DE1 wire protocol - characteristic payloads and the control link

pub mod characteristic;
pub mod codec;
pub mod link;
pub mod mmr;
pub mod profile;
pub mod state;

pub use characteristic::{CharId, CharacteristicSpec, Properties, REGISTRY, SERVICE_UUID};
pub use link::{Command, Event, LineBuffer};
pub use profile::{FrameOutcome, ProfileAssembler, ProfileFrame, ProfileHeader};
pub use state::{State, SubState};

/// Default TCP port of the control link.
pub const DEFAULT_PORT: u16 = 12345;

/// Local name advertised by the radio agent.
pub const LOCAL_NAME: &str = "DE1-SIM";

#[cfg(feature = "async")]
pub use link::async_io;
