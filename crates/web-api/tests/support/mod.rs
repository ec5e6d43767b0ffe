#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{InMemoryMessageRepository, SessionContext};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub fn build_router() -> (Router, SessionContext) {
    build_router_with_capacity(64)
}

pub fn build_router_with_capacity(outbound_capacity: usize) -> (Router, SessionContext) {
    let repository = Arc::new(InMemoryMessageRepository::default());
    let session = SessionContext::build(repository, outbound_capacity);
    (router(AppState::new(session.clone(), 100)), session)
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub session: SessionContext,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with_capacity(64).await
    }

    /// 指定每个连接的出站队列容量
    pub async fn spawn_with_capacity(outbound_capacity: usize) -> Self {
        let (router, session) = build_router_with_capacity(outbound_capacity);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            addr,
            session,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// 建立 WebSocket 连接，并等待服务端会话就绪
    pub async fn connect(&self) -> WsClient {
        let (stream, _) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .expect("websocket connect");
        let mut client = WsClient { stream };
        client.wait_ready().await;
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl WsClient {
    /// 服务端先订阅再开始读帧，收到 pong 即说明订阅已建立
    async fn wait_ready(&mut self) {
        self.stream
            .send(TungsteniteMessage::Ping(b"ready".to_vec().into()))
            .await
            .expect("send ping");
        loop {
            let frame = timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("pong timeout")
                .expect("stream ended")
                .expect("websocket error");
            if matches!(frame, TungsteniteMessage::Pong(_)) {
                return;
            }
        }
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.stream
            .send(TungsteniteMessage::Text(text.to_string().into()))
            .await
            .expect("send frame");
    }

    pub async fn emit(&mut self, event: &str, data: Value) {
        let frame = json!({ "event": event, "data": data });
        self.send_raw(&frame.to_string()).await;
    }

    pub async fn join(&mut self, username: &str) {
        self.emit("join", json!({ "username": username })).await;
    }

    /// 下一个事件帧，跳过控制帧
    pub async fn next_event(&mut self) -> Value {
        loop {
            let frame = timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("event timeout")
                .expect("stream ended")
                .expect("websocket error");
            match frame {
                TungsteniteMessage::Text(text) => {
                    return serde_json::from_str(&text).expect("event json");
                }
                TungsteniteMessage::Close(_) => panic!("connection closed by server"),
                _ => continue,
            }
        }
    }

    pub async fn expect_event(&mut self, event: &str) -> Value {
        let frame = self.next_event().await;
        assert_eq!(frame["event"], event, "unexpected frame {frame}");
        frame["data"].clone()
    }

    /// 在给定时间内没有任何事件帧
    pub async fn expect_silence(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => return,
                Ok(Some(Ok(TungsteniteMessage::Text(text)))) => {
                    panic!("unexpected event {text}")
                }
                Ok(Some(Ok(_))) => continue,
                Ok(_) => return,
            }
        }
    }

    /// 读完积压的帧直到服务端关闭连接，返回跳过的事件帧数量
    pub async fn expect_server_close(&mut self) -> usize {
        let mut skipped = 0;
        loop {
            let frame = timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("close timeout");
            match frame {
                Some(Ok(TungsteniteMessage::Text(_))) => skipped += 1,
                Some(Ok(TungsteniteMessage::Close(_))) => return skipped,
                Some(Ok(_)) => continue,
                Some(Err(err)) => panic!("connection failed before close frame: {err}"),
                None => panic!("stream ended without close frame"),
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
