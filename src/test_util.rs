// Test utilities that are shared between unit tests and the "tests" folder.

use std::mem;

use crate::event::ServerEvent;
use crate::messenger::Messenger;
use crate::registry::ConnectionId;


#[derive(Clone, PartialEq, Debug)]
pub enum Delivery {
    To(ConnectionId, ServerEvent),
    All(ServerEvent),
}

// Remembers what was sent instead of sending it.
#[derive(Default, Debug)]
pub struct RecordingMessenger {
    deliveries: Vec<Delivery>,
}

impl RecordingMessenger {
    pub fn new() -> Self { Self::default() }

    // Returns everything recorded since the previous call.
    pub fn take(&mut self) -> Vec<Delivery> { mem::take(&mut self.deliveries) }
}

impl Messenger for RecordingMessenger {
    fn send(&mut self, to: ConnectionId, event: ServerEvent) {
        self.deliveries.push(Delivery::To(to, event));
    }
    fn broadcast(&mut self, event: ServerEvent) { self.deliveries.push(Delivery::All(event)); }
}
