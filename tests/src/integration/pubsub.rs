//! Seeds, latest value, fan-out and unsubscribe across both transports.

#[cfg(test)]
mod tests {
    use crate::fixtures::{counter, event, key, numbered, services};
    use ebus_telemetry::log_key_event;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_new_subscriber_sees_invalid_then_live_event() {
        for service in services() {
            let k = key("CSW.pubsub.seed");
            let mut stream = service.default_subscriber().subscribe([k.clone()]).unwrap();
            stream.ready().await.unwrap();

            let seed = timeout(WAIT, stream.next()).await.unwrap().unwrap();
            assert!(seed.is_invalid(), "{}", service.transport().name());
            assert_eq!(seed.event_key(), k);

            let published = event(&k);
            service.default_publisher().publish(published.clone()).await.unwrap();
            let live = timeout(WAIT, stream.next()).await.unwrap().unwrap();
            assert_eq!(live, published);
        }
    }

    #[tokio::test]
    async fn test_seed_is_latest_published_value() {
        for service in services() {
            let k = key("CSW.pubsub.latest");
            let publisher = service.default_publisher();
            publisher.publish(numbered(&k, 1)).await.unwrap();
            let latest = numbered(&k, 2);
            publisher.publish(latest.clone()).await.unwrap();

            let mut stream = service.default_subscriber().subscribe([k.clone()]).unwrap();
            let seed = timeout(WAIT, stream.next()).await.unwrap().unwrap();
            assert_eq!(seed, latest);
            log_key_event!(info, "pubsub", "seed received", &seed);
        }
    }

    #[tokio::test]
    async fn test_one_seed_per_key_before_live_events() {
        for service in services() {
            let known = key("CSW.pubsub.known");
            let unknown = key("CSW.pubsub.unknown");
            let stored = event(&known);
            service.default_publisher().publish(stored.clone()).await.unwrap();

            let mut stream = service
                .default_subscriber()
                .subscribe([known.clone(), unknown.clone(), known.clone()])
                .unwrap();
            stream.ready().await.unwrap();

            let first = timeout(WAIT, stream.next()).await.unwrap().unwrap();
            let second = timeout(WAIT, stream.next()).await.unwrap().unwrap();
            let mut seeds = [first, second];
            seeds.sort_by_key(|e| e.event_key().canonical());
            assert_eq!(seeds[0], stored);
            assert!(seeds[1].is_invalid());
            assert_eq!(seeds[1].event_key(), unknown);

            let live = numbered(&unknown, 3);
            service.default_publisher().publish(live.clone()).await.unwrap();
            assert_eq!(timeout(WAIT, stream.next()).await.unwrap().unwrap(), live);
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        for service in services() {
            let k = key("CSW.pubsub.ordered");
            let mut stream = service.default_subscriber().subscribe([k.clone()]).unwrap();
            stream.ready().await.unwrap();
            assert!(timeout(WAIT, stream.next()).await.unwrap().unwrap().is_invalid());

            let publisher = service.default_publisher();
            let outcomes: Vec<_> = (0..100).map(|n| publisher.publish(numbered(&k, n))).collect();
            for outcome in outcomes {
                outcome.await.unwrap();
            }

            for expected in 0..100 {
                let received = timeout(WAIT, stream.next()).await.unwrap().unwrap();
                assert_eq!(counter(&received), Some(expected));
            }
        }
    }

    #[tokio::test]
    async fn test_subscriptions_are_independent() {
        for service in services() {
            let k = key("CSW.pubsub.fanout");
            let subscriber = service.default_subscriber();
            let mut first = subscriber.subscribe([k.clone()]).unwrap();
            let mut second = service.make_new_subscriber().subscribe([k.clone()]).unwrap();
            first.ready().await.unwrap();
            second.ready().await.unwrap();
            timeout(WAIT, first.next()).await.unwrap().unwrap();
            timeout(WAIT, second.next()).await.unwrap().unwrap();

            first.unsubscribe().await;
            let published = numbered(&k, 9);
            service.default_publisher().publish(published.clone()).await.unwrap();

            assert_eq!(first.next().await, None);
            assert_eq!(timeout(WAIT, second.next()).await.unwrap().unwrap(), published);
        }
    }

    #[tokio::test]
    async fn test_nothing_delivered_after_unsubscribe() {
        for service in services() {
            let k = key("CSW.pubsub.silence");
            let seen = Arc::new(AtomicUsize::new(0));
            let counted = Arc::clone(&seen);
            let subscription = service
                .default_subscriber()
                .subscribe_callback([k.clone()], move |_| {
                    counted.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            subscription.ready().await.unwrap();

            service.default_publisher().publish(event(&k)).await.unwrap();
            timeout(WAIT, async {
                while seen.load(Ordering::SeqCst) < 2 {
                    sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap();

            subscription.unsubscribe().await;
            let before = seen.load(Ordering::SeqCst);
            for n in 0..10 {
                service.default_publisher().publish(numbered(&k, n)).await.unwrap();
            }
            sleep(Duration::from_millis(50)).await;
            assert_eq!(seen.load(Ordering::SeqCst), before);
        }
    }

    #[tokio::test]
    async fn test_async_callback_sees_events_in_order() {
        for service in services() {
            let k = key("CSW.pubsub.async");
            let received = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&received);
            let subscription = service
                .default_subscriber()
                .subscribe_async([k.clone()], move |event| {
                    let sink = Arc::clone(&sink);
                    async move {
                        sleep(Duration::from_millis(1)).await;
                        sink.lock().push(counter(&event));
                    }
                })
                .unwrap();
            subscription.ready().await.unwrap();

            for n in 0..5 {
                service.default_publisher().publish(numbered(&k, n)).await.unwrap();
            }
            timeout(WAIT, async {
                while received.lock().len() < 6 {
                    sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap();

            assert_eq!(
                *received.lock(),
                vec![None, Some(0), Some(1), Some(2), Some(3), Some(4)]
            );
            subscription.unsubscribe().await;
        }
    }

    #[tokio::test]
    async fn test_channel_subscription_feeds_caller_channel() {
        for service in services() {
            let k = key("CSW.pubsub.channel");
            let (tx, mut rx) = mpsc::channel(16);
            let subscription = service
                .default_subscriber()
                .subscribe_channel([k.clone()], tx)
                .unwrap();
            subscription.ready().await.unwrap();
            assert!(timeout(WAIT, rx.recv()).await.unwrap().unwrap().is_invalid());

            let published = event(&k);
            service.default_publisher().publish(published.clone()).await.unwrap();
            assert_eq!(timeout(WAIT, rx.recv()).await.unwrap().unwrap(), published);

            subscription.unsubscribe().await;
            assert!(subscription.is_cancelled());
        }
    }

    #[tokio::test]
    async fn test_get_and_get_all_read_the_store() {
        for service in services() {
            let stored = key("CSW.pubsub.stored");
            let missing = key("CSW.pubsub.missing");
            let published = event(&stored);
            service.default_publisher().publish(published.clone()).await.unwrap();

            let subscriber = service.default_subscriber();
            assert_eq!(subscriber.get(&stored), published);
            assert!(subscriber.get(&missing).is_invalid());

            let all = subscriber.get_all([&stored, &missing, &stored]);
            assert_eq!(all.len(), 2);
            assert!(all.contains(&published));
            assert!(all.iter().any(|e| e.is_invalid() && e.event_key() == missing));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscribing_mid_burst_never_repeats_or_rewinds() {
        for service in services() {
            let k = key("CSW.pubsub.midburst");
            let publisher = service.make_new_publisher();
            let producing = {
                let publisher = publisher.clone();
                let k = k.clone();
                tokio::spawn(async move {
                    for n in 1..=200 {
                        publisher.publish(numbered(&k, n)).await.unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            };

            let mut streams = Vec::new();
            for _ in 0..8 {
                streams.push(service.default_subscriber().subscribe([k.clone()]).unwrap());
                tokio::task::yield_now().await;
            }
            producing.await.unwrap();

            for mut stream in streams {
                let mut seen = Vec::new();
                while seen.last() != Some(&200) {
                    let next = timeout(WAIT, stream.next()).await.unwrap().unwrap();
                    seen.extend(counter(&next));
                }
                assert!(
                    seen.windows(2).all(|pair| pair[0] < pair[1]),
                    "{}: {seen:?}",
                    service.transport().name()
                );
            }
        }
    }
}
