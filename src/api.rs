use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::{SinkExt, StreamExt, TryFutureExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use warp::ws::WebSocket;
use warp::Filter;

use crate::broadcaster::Broadcaster;
use crate::registry::ConnId;

/// Global connection id counter. Ids are never reused, so a reconnect
/// always shows up as a brand-new handle.
static NEXT_CONN_ID: AtomicUsize = AtomicUsize::new(1);

static INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
    <head>
        <title>Chat Relay</title>
    </head>
    <body>
        <h1>Chat Relay</h1>
        <div id="chat">
            <p><em>Connecting...</em></p>
        </div>
        <input type="text" id="text" />
        <button type="button" id="send">Send</button>
        <script type="text/javascript">
        const chat = document.getElementById('chat');
        const text = document.getElementById('text');
        const username = prompt('Pick a username') || 'anonymous';
        const uri = 'ws://' + location.host + '/ws/' + encodeURIComponent(username);
        const ws = new WebSocket(uri);
        function message(data) {
            const line = document.createElement('p');
            line.innerText = data;
            chat.appendChild(line);
        }
        ws.onopen = function() {
            chat.innerHTML = '<p><em>Connected!</em></p>';
        };
        ws.onmessage = function(msg) {
            message(msg.data);
        };
        ws.onclose = function() {
            chat.getElementsByTagName('em')[0].innerText = 'Disconnected!';
        };
        send.onclick = function() {
            ws.send(text.value);
            text.value = '';
        };
        </script>
    </body>
</html>
"#;

// GET / -> minimal browser client
fn index() -> impl warp::Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path::end().map(|| warp::reply::html(INDEX_HTML))
}

fn with_broadcaster(
    broadcaster: Broadcaster,
) -> impl warp::Filter<Extract = (Broadcaster,), Error = Infallible> + Clone {
    warp::any().map(move || broadcaster.clone())
}

async fn upgrade_connection(
    username: String,
    ws: warp::ws::Ws,
    broadcaster: Broadcaster,
) -> Result<impl warp::Reply, Infallible> {
    // This will call our function if the handshake succeeds.
    Ok(ws.on_upgrade(move |socket| client_connected(socket, username, broadcaster)))
}

// GET /ws/{username} -> websocket upgrade
fn ws_upgrade(
    broadcaster: Broadcaster,
) -> impl warp::Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("ws" / String)
        // The `ws()` filter will prepare Websocket handshake...
        .and(warp::ws())
        .and(with_broadcaster(broadcaster))
        .and_then(upgrade_connection)
}

pub fn build_filters(
    broadcaster: Broadcaster,
) -> impl warp::Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    index().or(ws_upgrade(broadcaster))
}

/// Runs for the lifetime of one websocket connection: registers it,
/// pumps inbound frames into the broadcaster, and deregisters it when
/// the stream ends, whether by clean close or error.
async fn client_connected(ws: WebSocket, username: String, broadcaster: Broadcaster) {
    let conn_id: ConnId = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);

    info!("new chat connection: conn={} username={}", conn_id, username);

    let (mut ws_tx, mut ws_rx) = ws.split();

    // Unbounded queue between the broadcaster and this connection's
    // socket. A dedicated writer task drains it, so fan-out never waits
    // on this peer's wire.
    let (tx, rx) = mpsc::unbounded_channel();
    let mut rx = UnboundedReceiverStream::new(rx);

    tokio::task::spawn(async move {
        while let Some(message) = rx.next().await {
            ws_tx
                .send(message)
                .unwrap_or_else(|e| {
                    debug!("websocket send error: {}", e);
                })
                .await;
        }
    });

    // The queue exists before the read loop starts, so the join notice
    // below reaches this connection too.
    broadcaster.on_connect(conn_id, username, tx).await;

    while let Some(result) = ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("websocket error (conn={}): {}", conn_id, e);
                break;
            }
        };
        // Skip any non-Text messages...
        if let Ok(text) = msg.to_str() {
            broadcaster.on_message(conn_id, text).await;
        }
    }

    // ws_rx keeps yielding as long as the peer stays connected. Once it
    // ends, for whatever reason, this is the one guaranteed cleanup.
    broadcaster.on_disconnect(conn_id).await;
}
