//! Wire types shared by the pw-agent crates.
//!
//! - [`Command`]: the closed action vocabulary and its strict decoder
//! - [`ElementDescriptor`] / [`TabSnapshot`]: grounding output
//! - [`GoalOutcome`] and friends: what a goal invocation reports
//! - [`SessionStatus`] / [`SessionMode`]: lifecycle surface types

pub mod command;
pub mod outcome;
pub mod page;
pub mod session;

pub use command::{Command, CommandError, DEFAULT_WAIT_FOR_ELEMENT_MS, SelectorKind};
pub use outcome::{ActionRecord, FailedAttempt, FailureKind, GoalOutcome, GoalStatus, StepEvent, StepKind};
pub use page::{ElementDescriptor, TabSnapshot};
pub use session::{SessionMode, SessionStatus};
