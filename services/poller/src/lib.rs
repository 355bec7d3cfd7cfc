// poller: watches Google Drive activity and fans changes out to receivers.
//
// Pipeline: per-target poll loops normalise provider activity records and
// push them into a timestamp-ordered queue; one dispatch loop per poller
// enriches each event (path resolution, links, move sources, pattern
// filtering) and delivers it to every configured dispatcher in order.

pub mod activity;
pub mod clients;
pub mod config;
pub mod dispatch;
pub mod drive;
pub mod logging;
pub mod poller;
pub mod resolver;
pub mod session;
pub mod supervisor;
