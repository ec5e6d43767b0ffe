use std::ops::ControlFlow;

use application::{ConnectionSession, SessionContext, Subscription};
use axum::{
    body::Bytes,
    extract::ws::{Message as WsMessage, WebSocket},
};
use domain::ConnectionId;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;

/// WebSocket 连接
///
/// 读循环在当前任务中按接收顺序把帧交给 `ConnectionSession`，
/// 写任务负责把订阅中的事件和心跳回应写回客户端。
/// 任意一侧结束都会触发会话断开。
pub struct WebSocketConnection {
    socket: WebSocket,
    ctx: SessionContext,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, ctx: SessionContext) -> Self {
        Self { socket, ctx }
    }

    pub async fn run(self) {
        let (mut session, subscription) = ConnectionSession::open(self.ctx).await;
        let connection_id = session.id();
        let (sender, mut incoming) = self.socket.split();

        // 写操作统一经过写任务，读循环只投递命令
        let (cmd_tx, cmd_rx) = mpsc::channel::<WsCommand>(32);
        let mut send_task = tokio::spawn(write_loop(sender, subscription, cmd_rx, connection_id));

        let mut writer_finished = false;
        loop {
            tokio::select! {
                frame = incoming.next() => {
                    let Some(Ok(frame)) = frame else {
                        break;
                    };
                    if handle_incoming(&mut session, frame, &cmd_tx).await.is_break() {
                        break;
                    }
                }
                _ = &mut send_task => {
                    writer_finished = true;
                    break;
                }
            }
        }

        session.disconnect().await;
        drop(cmd_tx);
        if !writer_finished {
            if let Err(err) = send_task.await {
                tracing::warn!(connection_id = %connection_id, error = %err, "websocket writer task failed");
            }
        }
        tracing::debug!(connection_id = %connection_id, "websocket connection finished");
    }
}

/// 写任务，订阅结束（会话断开或被判定为慢消费者）时关闭连接
async fn write_loop(
    mut sender: SplitSink<WebSocket, WsMessage>,
    mut subscription: Subscription,
    mut commands: mpsc::Receiver<WsCommand>,
    connection_id: ConnectionId,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(WsCommand::SendPong(data)) => {
                    if sender.send(WsMessage::Pong(data)).await.is_err() {
                        tracing::debug!(connection_id = %connection_id, "failed to send pong");
                        break;
                    }
                }
                None => break,
            },
            event = subscription.recv() => match event {
                Some(event) => {
                    let payload = match serde_json::to_string(event.as_ref()) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::warn!(connection_id = %connection_id, error = %err, "failed to serialize websocket payload");
                            continue;
                        }
                    };
                    if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                        tracing::debug!(connection_id = %connection_id, "failed to send websocket frame");
                        break;
                    }
                }
                None => {
                    let _ = sender.send(WsMessage::Close(None)).await;
                    break;
                }
            },
        }
    }
}

async fn handle_incoming(
    session: &mut ConnectionSession,
    message: WsMessage,
    cmd_tx: &mpsc::Sender<WsCommand>,
) -> ControlFlow<()> {
    match message {
        WsMessage::Text(text) => session.handle_frame(text.as_str()).await,
        WsMessage::Binary(data) => {
            // 非 UTF-8 内容在解析时按协议错误回报
            let text = String::from_utf8_lossy(&data);
            session.handle_frame(&text).await;
        }
        WsMessage::Ping(data) => {
            if cmd_tx.send(WsCommand::SendPong(data)).await.is_err() {
                return ControlFlow::Break(());
            }
        }
        WsMessage::Pong(_) => {
            tracing::debug!(connection_id = %session.id(), "pong received");
        }
        WsMessage::Close(_) => {
            tracing::debug!(connection_id = %session.id(), "close frame received");
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

#[derive(Debug)]
enum WsCommand {
    SendPong(Bytes),
}
