//! End-to-end session flow against in-memory transports.
//!
//! Mirrors what the storefront does on sign-in: build the category index,
//! resolve form input, connect the notification and news hubs, receive
//! events, and tear everything down on sign-out.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use boxoffice_core::category::Category;
use boxoffice_core::channel::Channel;
use boxoffice_core::hub::{ChannelState, ConnectOutcome, Registration};
use boxoffice_runtime::{CategoryMappingCache, HubConnectionRegistry};
use boxoffice_testing::{MockCategoryApi, MockHubTransport, fixtures};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const HUB_BASE: &str = "http://localhost:5000/hubs";

struct Session {
    api: Arc<MockCategoryApi>,
    transport: Arc<MockHubTransport>,
    categories: CategoryMappingCache,
    hubs: HubConnectionRegistry,
}

fn session(categories: Vec<Category>) -> Session {
    let api = Arc::new(MockCategoryApi::with_categories(categories));
    let transport = Arc::new(MockHubTransport::new());
    Session {
        categories: CategoryMappingCache::new(api.clone()),
        hubs: HubConnectionRegistry::new(transport.clone()),
        api,
        transport,
    }
}

#[tokio::test]
async fn storefront_session_flow() {
    let s = session(fixtures::categories());

    // Nothing resolves before the index is built
    assert!(s.categories.resolve_ids(&["Music"]).is_empty());

    s.categories.initialize().await.unwrap();
    s.categories.initialize().await.unwrap();
    assert_eq!(s.api.call_count(), 1);
    assert_eq!(s.categories.list_names(), vec!["music", "tech"]);
    assert_eq!(s.categories.resolve_ids(&["Tech", "Unknown"]), vec!["c2"]);

    // Realtime hubs
    let outcome = s
        .hubs
        .connect(
            Channel::Notification,
            Channel::Notification.hub_url(HUB_BASE),
            Some("jwt-a".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(outcome, ConnectOutcome::Connected);

    let received: Arc<Mutex<Vec<Value>>> = Arc::default();
    let sink = Arc::clone(&received);
    let registration = s.hubs.on(Channel::Notification, "ReceiveNotification", move |args| {
        sink.lock().unwrap().extend(args.iter().cloned());
    });
    assert_eq!(registration, Registration::Registered);

    let notifications = s.transport.connection(0).unwrap();
    notifications.emit("ReceiveNotification", &[json!({"message": "Your order shipped"})]);
    assert_eq!(
        received.lock().unwrap().as_slice(),
        &[json!({"message": "Your order shipped"})]
    );

    // Sign-out
    s.hubs.disconnect_all().await;
    assert_eq!(s.hubs.state(Channel::Notification), ChannelState::Disconnected);
    assert_eq!(notifications.stop_count(), 1);
}

#[tokio::test]
async fn listener_registered_while_connecting_is_kept() {
    let s = session(Vec::new());
    s.transport.set_start_delay(Duration::from_millis(50));
    let hubs = Arc::new(s.hubs);

    let pending = {
        let hubs = Arc::clone(&hubs);
        tokio::spawn(async move {
            hubs.connect(Channel::Event, Channel::Event.hub_url(HUB_BASE), None).await
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(hubs.state(Channel::Event), ChannelState::Connecting);
    assert_eq!(
        hubs.on(Channel::Event, "EventPublished", |_| {}),
        Registration::Registered
    );

    pending.await.expect("task panicked").unwrap();
    assert_eq!(s.transport.connection(0).unwrap().handler_count("EventPublished"), 1);
}

#[tokio::test]
async fn reconnect_through_registry_drops_listeners() {
    let s = session(Vec::new());
    let url = Channel::News.hub_url(HUB_BASE);
    s.hubs.connect(Channel::News, &url, None).await.unwrap();

    let hits: Arc<Mutex<u32>> = Arc::default();
    let counter = Arc::clone(&hits);
    s.hubs.on(Channel::News, "Published", move |_| {
        *counter.lock().unwrap() += 1;
    });

    s.hubs.disconnect(Channel::News).await;
    assert_eq!(s.hubs.on(Channel::News, "Published", |_| {}), Registration::Ignored);

    s.hubs.connect(Channel::News, &url, None).await.unwrap();
    s.transport.connection(1).unwrap().emit("Published", &[json!({"id": 7})]);

    assert_eq!(*hits.lock().unwrap(), 0);
}
