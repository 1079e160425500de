use std::collections::HashMap;

use tokio::sync::{mpsc::UnboundedSender, RwLock};
use warp::ws::Message;

/// Opaque identity for one live client connection.
///
/// Minted by the transport glue when the websocket upgrade completes and
/// never reused: a reconnecting client gets a brand-new id.
pub type ConnId = usize;

/// One connected member.
///
/// - `name` is the display name claimed at connect time
/// - `tx` is the sender side of the connection's outbound queue
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub tx: UnboundedSender<Message>,
}

/// The live-connection membership store.
///
/// Name and sender live in a single map entry, so the live set and the
/// name table cannot diverge. All access goes through `add`/`remove`/
/// `snapshot`; the map itself is never handed out.
#[derive(Debug, Default)]
pub struct Registry {
    members: RwLock<HashMap<ConnId, Member>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Insert a new member and make it visible to subsequent snapshots.
    ///
    /// The caller guarantees `id` is not already registered; connection
    /// ids are unique per physical connection.
    pub async fn add(&self, id: ConnId, name: String, tx: UnboundedSender<Message>) {
        self.members.write().await.insert(id, Member { name, tx });
    }

    /// Remove a member, returning its name if this call performed the
    /// removal.
    ///
    /// Idempotent: of N racing callers (disconnect handler, failed-send
    /// cleanup) exactly one observes `Some`, the rest get `None`.
    pub async fn remove(&self, id: ConnId) -> Option<String> {
        self.members.write().await.remove(&id).map(|m| m.name)
    }

    /// Display name of a live member, if still registered.
    pub async fn name_of(&self, id: ConnId) -> Option<String> {
        self.members.read().await.get(&id).map(|m| m.name.clone())
    }

    /// Point-in-time copy of the live set, safe to iterate without
    /// holding the registry lock. Order carries no meaning.
    pub async fn snapshot(&self) -> Vec<(ConnId, UnboundedSender<Message>)> {
        self.members
            .read()
            .await
            .iter()
            .map(|(&id, member)| (id, member.tx.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }
}
