use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// One live channel per actor. The WebSocket layer drains the receiving half
/// into the socket; tests hand in a bare channel instead.
pub type Channel = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Courier,
    Customer,
    Restaurant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Courier => "courier",
            Role::Customer => "customer",
            Role::Restaurant => "restaurant",
        }
    }
}

/// Result of a push attempt. Delivery failure is a value, never an error:
/// recovery (next candidate, catch-up replay) happens one layer up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    NotDelivered,
}

impl SendOutcome {
    pub fn is_delivered(self) -> bool {
        self == SendOutcome::Delivered
    }
}

/// In-process presence directory: actor id → live channel, one id-space per
/// role. No queueing or replay here; a reconnecting courier is caught up by
/// the dispatcher.
#[derive(Default)]
pub struct ConnectionRegistry {
    couriers: DashMap<Uuid, Channel>,
    customers: DashMap<Uuid, Channel>,
    restaurants: DashMap<Uuid, Channel>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self, role: Role) -> &DashMap<Uuid, Channel> {
        match role {
            Role::Courier => &self.couriers,
            Role::Customer => &self.customers,
            Role::Restaurant => &self.restaurants,
        }
    }

    /// Registers a channel, replacing any prior one for the same id.
    pub fn connect(&self, role: Role, id: Uuid, channel: Channel) {
        self.channels(role).insert(id, channel);
        debug!(role = role.as_str(), actor_id = %id, "actor connected");
    }

    /// Idempotent removal.
    pub fn disconnect(&self, role: Role, id: Uuid) {
        if self.channels(role).remove(&id).is_some() {
            debug!(role = role.as_str(), actor_id = %id, "actor disconnected");
        }
    }

    pub fn connected(&self, role: Role) -> usize {
        self.channels(role).len()
    }

    /// Serializes and transmits. Unregistered ids and dead channels both come
    /// back as NotDelivered; a dead channel is dropped from the registry.
    pub fn send<T: Serialize>(&self, role: Role, id: Uuid, message: &T) -> SendOutcome {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(err) => {
                warn!(role = role.as_str(), actor_id = %id, error = %err, "failed to serialize push message");
                return SendOutcome::NotDelivered;
            }
        };

        let delivered = match self.channels(role).get(&id) {
            Some(channel) => channel.send(json).is_ok(),
            None => return SendOutcome::NotDelivered,
        };

        if !delivered {
            self.channels(role).remove(&id);
            debug!(role = role.as_str(), actor_id = %id, "dropped dead channel");
            return SendOutcome::NotDelivered;
        }

        SendOutcome::Delivered
    }

    /// Best-effort fan-out to every registered id of a role. Returns how many
    /// channels took the message; dead ones are dropped along the way.
    pub fn broadcast<T: Serialize>(&self, role: Role, message: &T) -> usize {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(err) => {
                warn!(role = role.as_str(), error = %err, "failed to serialize broadcast");
                return 0;
            }
        };

        let mut dead = Vec::new();
        let mut delivered = 0;
        for entry in self.channels(role).iter() {
            if entry.value().send(json.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.channels(role).remove(&id);
        }
        delivered
    }
}
