// dc-events: event model and pure pipeline logic for drivecast.
//
// Everything in this crate is I/O-free: the enriched activity event, the
// watched-target identifier, the parent-keyed folder buffer, path mappings,
// pattern filters and the timestamp-ordered dispatch queue.  The poller
// service composes these with the network clients.

pub mod buffer;
pub mod event;
pub mod mapping;
pub mod paths;
pub mod pattern;
pub mod queue;
pub mod target;

pub use buffer::FolderBuffer;
pub use event::{Action, ActionDetail, ActivityEvent, ParentRef, TargetInfo};
pub use mapping::Mappings;
pub use pattern::PatternSet;
pub use queue::EventQueue;
pub use target::WatchTarget;
