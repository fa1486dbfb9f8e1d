//! Fileserver events fired at the end of every update cycle when enabled,
//! carrying whether that cycle changed anything as a payload field. A Salt
//! master normally drops these on a ZeroMQ event bus; this crate exposes
//! the same `EventBus` seam but ships only a logging implementation, since
//! there is no external event bus to publish to here (see DESIGN.md).

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct UpdateEvent {
    pub changed: bool,
    pub backend: &'static str,
}

pub trait EventBus {
    fn fire_update_event(&self, event: &UpdateEvent);
}

#[derive(Debug, Default)]
pub struct LoggingEventBus;

impl EventBus for LoggingEventBus {
    fn fire_update_event(&self, event: &UpdateEvent) {
        info!(changed = event.changed, backend = event.backend, tag = "fileserver/gitfs/update", "fired update event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_bus_does_not_panic() {
        let bus = LoggingEventBus;
        bus.fire_update_event(&UpdateEvent { changed: true, backend: "gitfs" });
    }
}
