mod support;

use std::time::Duration;

use application::Scope;
use chrono::Utc;
use domain::{ConnectionId, Message, MessageContent, MessageId, ServerEvent, Username};
use tokio::time::timeout;

use support::TestServer;

fn name(value: &str) -> Username {
    Username::parse(value).unwrap()
}

async fn next_event(subscription: &mut application::Subscription) -> ServerEvent {
    let event = timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("observer timeout")
        .expect("observer stream ended");
    (*event).clone()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_reader_is_closed_and_leaves_presence() {
    let server = TestServer::spawn_with_capacity(8).await;
    let hub = server.session.hub.clone();

    // 进程内观察者不参与洪泛，只接收在线状态事件
    let observer_id = ConnectionId::new();
    let mut observer = hub.subscribe(observer_id).await;

    let mut bob = server.connect().await;
    bob.join("bob").await;
    assert_eq!(
        next_event(&mut observer).await,
        ServerEvent::UsersUpdate(vec![name("bob")])
    );
    assert_eq!(
        next_event(&mut observer).await,
        ServerEvent::UserJoined {
            username: name("bob")
        }
    );

    // bob 不再读取，持续发布直到它的队列溢出被移除
    let flood = ServerEvent::NewMessage(Message::new(
        MessageId(1),
        name("alice"),
        MessageContent::new("x".repeat(500)).unwrap(),
        Utc::now(),
    ));
    let mut published = 0;
    while hub.subscriber_count().await > 1 {
        assert!(published < 200_000, "slow reader was never dropped");
        hub.publish(flood.clone(), Scope::AllExcept(observer_id))
            .await;
        published += 1;
        if published % 64 == 0 {
            tokio::task::yield_now().await;
        }
    }

    // 积压的帧读完后应收到关闭帧
    let skipped = bob.expect_server_close().await;
    assert!(skipped > 0);

    assert_eq!(
        next_event(&mut observer).await,
        ServerEvent::UsersUpdate(vec![])
    );
    assert_eq!(
        next_event(&mut observer).await,
        ServerEvent::UserLeft {
            username: name("bob")
        }
    );
    assert!(server.session.registry.online_usernames().await.is_empty());
    assert_eq!(server.session.registry.connection_count().await, 0);
}
