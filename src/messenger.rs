use crate::event::ServerEvent;
use crate::registry::ConnectionId;


// Delivery of server events to connected clients.
//
// Delivery is fire-and-forget: a connection that went away in the meantime will be reported
// to the session separately, so implementations drop undeliverable events.
pub trait Messenger {
    fn send(&mut self, to: ConnectionId, event: ServerEvent);
    fn broadcast(&mut self, event: ServerEvent);
}
