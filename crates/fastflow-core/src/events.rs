use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timer::TimerSnapshot;

/// Every observable state change of the fasting service produces an Event.
/// The UI and widget layers subscribe to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    FastStateChanged {
        is_fasting: bool,
    },
    /// Display refresh, once per tick while a fast is active.
    TimerUpdate {
        snapshot: TimerSnapshot,
    },
    /// First tick at or past the planned end. Fires once per fast.
    FastPlannedEndReached {
        planned_hours: f64,
    },
    FastingHistoryUpdated,
}

type Listener = Box<dyn Fn(&Event) + Send>;

/// Typed subscriber list owned by the service.
#[derive(Default)]
pub struct EventEmitter {
    listeners: Vec<Listener>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl Fn(&Event) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&self, event: &Event) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn every_listener_sees_every_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut emitter = EventEmitter::new();
        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            emitter.subscribe(move |e| seen.lock().unwrap().push((tag, e.clone())));
        }
        emitter.emit(&Event::FastingHistoryUpdated);
        assert_eq!(emitter.listener_count(), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("a", Event::FastingHistoryUpdated), ("b", Event::FastingHistoryUpdated)]
        );
    }

    #[test]
    fn events_are_tagged_by_type() {
        let json = serde_json::to_value(Event::FastStateChanged { is_fasting: true }).unwrap();
        assert_eq!(json["type"], "FastStateChanged");
        assert_eq!(json["is_fasting"], true);
    }
}
