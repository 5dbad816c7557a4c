//! Multi-page find: request types, per-page matching, the controller and
//! the events it reports.

pub mod controller;
pub mod event;
pub mod matching;
pub mod state;

pub use controller::{FindController, IndexGeometry};
pub use event::{FindEvent, FindEventReceiver, FindEventSender, MatchesCount};
pub use matching::PageMatches;
pub use state::{FindOptions, FindState, FindStatus, RequestKind, SearchCursor, Selected};
