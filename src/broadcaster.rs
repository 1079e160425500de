use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use warp::ws::Message;

use crate::registry::{ConnId, Registry};

/// Fans membership and message events out to every live connection and
/// owns the system-notice policy.
///
/// Delivery goes to each member's outbound queue, never to the socket
/// directly, so no registry lock is ever held across a network send.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

fn join_notice(name: &str) -> String {
    format!("[system] {} joined the chat room", name)
}

fn leave_notice(name: &str) -> String {
    format!("[system] {} left the chat room", name)
}

fn chat_line(name: &str, text: &str) -> String {
    format!("{}: {}", name, text)
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>) -> Broadcaster {
        Broadcaster { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a new connection and announce it to the full membership,
    /// the joiner included. The add completes before the notice's
    /// snapshot is taken, so the joiner cannot miss messages broadcast
    /// after its own registration.
    pub async fn on_connect(&self, id: ConnId, name: String, tx: UnboundedSender<Message>) {
        let notice = join_notice(&name);
        self.registry.add(id, name, tx).await;
        self.broadcast(notice).await;
    }

    /// Rebroadcast one inbound line, prefixed with the sender's name.
    /// A message from a handle that already lost its registration (a
    /// race with disconnect) is dropped silently.
    pub async fn on_message(&self, id: ConnId, text: &str) {
        match self.registry.name_of(id).await {
            Some(name) => self.broadcast(chat_line(&name, text)).await,
            None => debug!("dropping message from unregistered conn {}", id),
        }
    }

    /// Deregister a connection and announce the departure to whoever is
    /// left. A no-op if the handle is already gone, so the disconnect
    /// handler and the failed-send cleanup can both call it without
    /// producing a duplicate notice.
    pub async fn on_disconnect(&self, id: ConnId) {
        if let Some(name) = self.registry.remove(id).await {
            self.broadcast(leave_notice(&name)).await;
        }
    }

    /// Deliver `text` to every member of a point-in-time snapshot.
    ///
    /// A dead recipient (its queue receiver dropped) never aborts the
    /// rest of the fan-out; it is removed through the same idempotent
    /// path as a normal disconnect and its leave notice is queued behind
    /// the message being delivered.
    pub async fn broadcast(&self, text: String) {
        let mut pending = VecDeque::new();
        pending.push_back(text);

        while let Some(line) = pending.pop_front() {
            info!("{}", line);
            for (id, tx) in self.registry.snapshot().await {
                if tx.send(Message::text(line.clone())).is_err() {
                    // Receiver gone. The owning task's own cleanup may
                    // race us here; the idempotent remove decides which
                    // path announces the departure.
                    if let Some(name) = self.registry.remove(id).await {
                        warn!("send to conn {} ({}) failed, dropping it", id, name);
                        pending.push_back(leave_notice(&name));
                    }
                }
            }
        }
    }
}
