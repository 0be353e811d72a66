//! Per-connection handler: translate client frames into engine calls and
//! pump bus deliveries for this participant back out the socket.

use std::net::SocketAddr;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use hallo_common::{ClientMessage, ParticipantInfo, Result, ServerMessage};
use hallo_engine::{Engine, Envelope, Subscription};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// The authenticated identity behind this connection plus its bus
/// subscription. Disposed together on teardown.
struct Link {
    user_id: String,
    sub: Subscription,
}

/// Handle a single WebSocket connection until it closes.
pub async fn handle_connection(ws: WebSocketStream<TcpStream>, addr: SocketAddr, engine: Engine) {
    let (mut sink, mut stream) = ws.split();
    let mut link: Option<Link> = None;

    loop {
        tokio::select! {
            // Engine-addressed deliveries for this participant → socket.
            envelope = recv_delivery(&mut link) => {
                match envelope {
                    Some(Envelope::Deliver(msg)) => {
                        if send_message(&mut sink, &msg).await.is_err() {
                            break;
                        }
                    }
                    Some(_) => {}
                    None => break,
                }
            }

            // Frames from the socket → engine.
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                if dispatch(msg, &mut link, &engine, &mut sink, addr).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                // Protocol misuse: drop the frame, keep the
                                // connection.
                                tracing::debug!(peer = %addr, error = %e, "unparseable frame dropped");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Teardown disposers: engine record first, then the bus subscription.
    if let Some(link) = link.take() {
        tracing::info!(peer = %addr, user_id = %link.user_id, "client disconnected");
        engine.disconnect(&link.user_id).await;
        engine.release(link.sub).await;
    } else {
        tracing::debug!(peer = %addr, "unauthenticated client disconnected");
    }
}

/// Wait for a bus delivery; an unauthenticated connection has no topic
/// yet, so this arm just never fires.
async fn recv_delivery(link: &mut Option<Link>) -> Option<Envelope> {
    match link {
        Some(link) => link.sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn dispatch(
    msg: ClientMessage,
    link: &mut Option<Link>,
    engine: &Engine,
    sink: &mut WsSink,
    addr: SocketAddr,
) -> Result<()> {
    match msg {
        ClientMessage::Authenticate { user_id } => {
            if link.is_some() {
                send_message(
                    sink,
                    &ServerMessage::Error {
                        message: "already authenticated".into(),
                    },
                )
                .await?;
            } else if let Some(sub) = engine.authenticate(&user_id).await {
                tracing::info!(peer = %addr, user_id, "client authenticated");
                *link = Some(Link {
                    user_id: user_id.clone(),
                    sub,
                });
                send_message(sink, &ServerMessage::Authenticate { user_id }).await?;
            } else {
                send_message(
                    sink,
                    &ServerMessage::Error {
                        message: "identity already connected".into(),
                    },
                )
                .await?;
            }
        }

        ClientMessage::JoinQueue {} => {
            let did_join_queue = match link {
                Some(link) => engine.join_queue(&link.user_id).await,
                None => false,
            };
            send_message(sink, &ServerMessage::JoinQueue { did_join_queue }).await?;
        }

        ClientMessage::LeaveQueue {} => {
            if let Some(link) = link {
                engine.leave_queue(&link.user_id).await;
            }
            send_message(sink, &ServerMessage::LeaveQueue {}).await?;
        }

        ClientMessage::AcceptCandidate { candidate_id } => {
            if let Some(link) = link {
                engine.accept_candidate(&link.user_id, &candidate_id).await;
            }
        }

        ClientMessage::LeaveSession {} => {
            if let Some(link) = link {
                engine.leave_session(&link.user_id).await;
            }
            send_message(sink, &ServerMessage::LeaveSession {}).await?;
        }

        ClientMessage::QueueSize {} => {
            let queue_size = engine.queue_size().await;
            send_message(sink, &ServerMessage::QueueSize { queue_size }).await?;
        }

        ClientMessage::ServerStats {} => {
            let stats = engine.stats().await;
            send_message(sink, &stats).await?;
        }

        ClientMessage::UserInfo {} => {
            let info = match link {
                Some(link) => engine.participant_info(&link.user_id).await,
                None => ParticipantInfo::unauthenticated(),
            };
            send_message(sink, &ServerMessage::UserInfo(info)).await?;
        }

        ClientMessage::Echo(payload) => {
            send_message(sink, &ServerMessage::Echo(payload)).await?;
        }

        ClientMessage::Signal(payload) => {
            if let Some(link) = link {
                engine.relay_signal(&link.user_id, payload).await;
            }
        }
    }

    Ok(())
}

/// Serialize and send one server message as a text frame.
async fn send_message(sink: &mut WsSink, msg: &ServerMessage) -> Result<()> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}
