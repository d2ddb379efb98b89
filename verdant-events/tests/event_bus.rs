use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use verdant_events::{EventBus, Notification, NotificationLevel, NotificationLog};

struct Ping(usize);

struct Pong;

fn counting(total: &Arc<AtomicUsize>) -> impl Fn(Arc<Ping>) -> std::future::Ready<()> + Send + Sync + 'static {
    let total = total.clone();
    move |ping: Arc<Ping>| {
        total.fetch_add(ping.0, Ordering::SeqCst);
        std::future::ready(())
    }
}

#[tokio::test]
async fn test_every_listener_of_the_type_runs() {
    let bus = EventBus::new();
    let total = Arc::new(AtomicUsize::new(0));
    bus.subscribe(counting(&total)).await;
    bus.subscribe(counting(&total)).await;

    bus.emit_and_wait(Ping(5)).await;

    assert_eq!(total.load(Ordering::SeqCst), 10);
    assert_eq!(bus.listener_count::<Ping>().await, 2);
}

#[tokio::test]
async fn test_other_types_are_not_delivered() {
    let bus = EventBus::new();
    let total = Arc::new(AtomicUsize::new(0));
    bus.subscribe(counting(&total)).await;

    bus.emit_and_wait(Pong).await;

    assert_eq!(total.load(Ordering::SeqCst), 0);
    assert_eq!(bus.listener_count::<Pong>().await, 0);
}

#[tokio::test]
async fn test_clones_share_listeners() {
    let bus = EventBus::unbounded();
    let publisher = bus.clone();
    let total = Arc::new(AtomicUsize::new(0));
    bus.subscribe(counting(&total)).await;

    publisher.emit_and_wait(Ping(1)).await;

    assert_eq!(total.load(Ordering::SeqCst), 1);
    assert!(bus.idle_slots().is_none());
}

#[tokio::test]
async fn test_bounded_bus_caps_running_listeners() {
    let bus = EventBus::bounded(2);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicUsize::new(0));

    let (r, p, d) = (running.clone(), peak.clone(), done.clone());
    bus.subscribe(move |_: Arc<Pong>| {
        let (running, peak, done) = (r.clone(), p.clone(), d.clone());
        async move {
            peak.fetch_max(running.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            running.fetch_sub(1, Ordering::SeqCst);
            done.fetch_add(1, Ordering::SeqCst);
        }
    })
    .await;

    for _ in 0..8 {
        bus.emit(Pong).await;
    }
    tokio::time::timeout(Duration::from_secs(2), async {
        while done.load(Ordering::SeqCst) < 8 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_panicking_listener_does_not_stop_the_rest() {
    let bus = EventBus::new();
    bus.subscribe(|_: Arc<Ping>| async move { panic!("listener bug") }).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    bus.subscribe(move |ping: Arc<Ping>| {
        s.lock().unwrap().push(ping.0);
        std::future::ready(())
    })
    .await;

    bus.emit_and_wait(Ping(7)).await;

    assert_eq!(*seen.lock().unwrap(), vec![7]);
}

#[tokio::test]
async fn test_notification_log_keeps_arrival_order() {
    let bus = EventBus::new();
    let log = NotificationLog::attach(&bus).await;

    bus.emit_and_wait(Notification::success("Plant added successfully")).await;
    bus.emit_and_wait(Notification::error("Failed to add plant")).await;

    let levels: Vec<_> = log.entries().into_iter().map(|n| n.level).collect();
    assert_eq!(levels, [NotificationLevel::Success, NotificationLevel::Error]);
    assert_eq!(log.last().unwrap().message, "Failed to add plant");

    log.clear();
    assert!(log.entries().is_empty());
}
