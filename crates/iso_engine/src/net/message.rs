//! Wire messages and the transport seam

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scene::EntityId;

/// Identifier of a connected network client
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Create a client id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Messages exchanged between the authoritative side and its clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamMessage {
    /// Instantiate an entity on the client
    Create {
        /// Registered type name used to construct the entity remotely
        type_name: String,
        /// Entity id
        id: EntityId,
        /// Id of the parent to mount under
        parent_id: EntityId,
        /// Encoded transform section payload
        transform: String,
        /// Opaque game data for the constructor
        create_data: Option<String>,
    },
    /// Destroy an entity on the client
    Destroy {
        /// Entity id
        id: EntityId,
        /// Stream time the destroy was issued at
        time: f64,
    },
    /// Delta update for an entity
    Update {
        /// Entity id
        id: EntityId,
        /// Full update string, id first
        data: String,
        /// Stream time the update was produced at
        time: f64,
    },
}

impl StreamMessage {
    /// Entity the message concerns
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Self::Create { id, .. } | Self::Destroy { id, .. } | Self::Update { id, .. } => id,
        }
    }
}

/// Who a queued message goes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Every connected client
    All,
    /// A single client
    Client(ClientId),
    /// An explicit list of clients
    Clients(Vec<ClientId>),
}

impl Recipients {
    /// Whether `client` is covered
    pub fn includes(&self, client: &ClientId) -> bool {
        match self {
            Self::All => true,
            Self::Client(c) => c == client,
            Self::Clients(list) => list.contains(client),
        }
    }
}

/// Network transport collaborator
pub trait Transport {
    /// Deliver a message
    fn send(&mut self, message: &StreamMessage, recipients: &Recipients);

    /// Currently connected clients
    fn client_ids(&self) -> Vec<ClientId>;

    /// Estimated one-way latency in milliseconds
    fn latency(&self) -> f64 {
        0.0
    }
}
