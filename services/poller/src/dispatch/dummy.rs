//! Default no-op dispatcher: logs the event, touches nothing.

use crate::dispatch::{DispatchError, Dispatcher};
use async_trait::async_trait;
use dc_events::event::ActivityEvent;

#[derive(Debug, Default)]
pub struct DummyDispatcher;

#[async_trait]
impl Dispatcher for DummyDispatcher {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn dispatch(&self, event: &ActivityEvent) -> Result<(), DispatchError> {
        tracing::info!(
            action = %event.action,
            path = %event.path,
            removed_path = %event.removed_path,
            is_folder = event.is_folder,
            link = %event.link,
            size = event.size,
            poller = %event.poller,
            "dummy dispatch"
        );
        Ok(())
    }
}
