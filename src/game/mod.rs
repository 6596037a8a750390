//! Match state, rules and resolution

pub mod actions;
pub mod checksum;
pub mod combat;
pub mod config;
pub mod controller;
pub mod engine;
pub mod events;
pub mod interpreter;
pub mod logger;
pub mod phase;
pub mod registry;
pub mod replay;
pub mod rng;
pub mod state;
pub mod targeting;
pub mod turn;

pub use actions::{legal_actions, validate_action, PlayerAction};
pub use checksum::{state_checksum, MatchSnapshot};
pub use config::MatchConfig;
pub use controller::{play_out, MatchResult, PlayerController, RandomController};
pub use engine::Match;
pub use events::{Clock, EventLog, EventRecord, GameEvent, GameOverReason, ManualClock, SystemClock};
pub use interpreter::{EffectSource, Resolver, TriggerContext};
pub use logger::{GameLogger, LogEntry, OutputMode, VerbosityLevel};
pub use phase::Phase;
pub use registry::ListenerRegistry;
pub use replay::{replay_actions, Replica};
pub use rng::{MatchRng, RngPosition};
pub use state::{InstanceLocation, MatchOutcome, MatchState, MulliganState};
