//! Pattern and observe-event subscriptions.

#[cfg(test)]
mod tests {
    use crate::fixtures::{collect_for, event, key, pattern_services, services};
    use ebus_core::{EventService, EventServiceError};
    use ebus_types::{Event, Subsystem};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::time::timeout;

    const WINDOW: Duration = Duration::from_millis(200);

    /// Publish one event per key, in order.
    async fn publish_all(service: &EventService, keys: &[&str]) -> Vec<Event> {
        let publisher = service.default_publisher();
        let mut published = Vec::new();
        for canonical in keys {
            let e = event(&key(canonical));
            publisher.publish(e.clone()).await.unwrap();
            published.push(e);
        }
        published
    }

    const KEYS: [&str; 5] = [
        "CSW.prefix.movement.linear",
        "CSW.prefix.movement.angular",
        "CSW.prefix.temperature",
        "CSW.test_prefix.move",
        "TCS.prefix.movement.linear",
    ];

    #[tokio::test]
    async fn test_movement_pattern() {
        for service in pattern_services() {
            let mut stream = service
                .default_subscriber()
                .pattern_subscribe(Subsystem::Csw, "*.movement.*")
                .unwrap();
            stream.ready().await.unwrap();

            let published = publish_all(&service, &KEYS).await;
            let received = collect_for(&mut stream, WINDOW).await;
            assert_eq!(received, published[..2].to_vec());
        }
    }

    #[tokio::test]
    async fn test_single_character_wildcard() {
        for service in pattern_services() {
            let mut stream = service
                .default_subscriber()
                .pattern_subscribe(Subsystem::Csw, "*.?ove*")
                .unwrap();
            stream.ready().await.unwrap();

            let published = publish_all(&service, &KEYS).await;
            let received = collect_for(&mut stream, WINDOW).await;
            // `*` spans dots, so "prefix.movement.linear" matches too.
            assert_eq!(
                received,
                vec![published[0].clone(), published[1].clone(), published[3].clone()]
            );
        }
    }

    #[tokio::test]
    async fn test_star_matches_whole_subsystem_without_seeds() {
        for service in pattern_services() {
            // Stored before subscribing: pattern subscriptions are not seeded.
            publish_all(&service, &["CSW.prefix.early"]).await;

            let mut stream = service
                .default_subscriber()
                .pattern_subscribe(Subsystem::Csw, "*")
                .unwrap();
            stream.ready().await.unwrap();

            let published = publish_all(&service, &KEYS).await;
            let received = collect_for(&mut stream, WINDOW).await;
            assert_eq!(received, published[..4].to_vec());
        }
    }

    #[tokio::test]
    async fn test_pattern_callback() {
        for service in pattern_services() {
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let subscription = service
                .default_subscriber()
                .pattern_subscribe_callback(Subsystem::Tcs, "prefix.*", move |e| {
                    let _ = tx.send(e);
                })
                .unwrap();
            subscription.ready().await.unwrap();

            let published = publish_all(&service, &KEYS).await;
            let received = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
            assert_eq!(received, Some(published[4].clone()));

            subscription.unsubscribe().await;
        }
    }

    #[tokio::test]
    async fn test_observe_events_from_every_subsystem() {
        for service in pattern_services() {
            let mut stream = service.default_subscriber().subscribe_observe_events().unwrap();
            stream.ready().await.unwrap();

            let publisher = service.default_publisher();
            let system = event(&key("CSW.prefix.status"));
            let observe_csw = {
                let k = key("CSW.observer.observationStart");
                Event::observe(k.source().clone(), k.event_name().clone())
            };
            let observe_tcs = {
                let k = key("TCS.observer.exposureEnd");
                Event::observe(k.source().clone(), k.event_name().clone())
            };
            for e in [&observe_csw, &system, &observe_tcs] {
                publisher.publish(e.clone()).await.unwrap();
            }

            let received = collect_for(&mut stream, WINDOW).await;
            assert_eq!(received, vec![observe_csw, observe_tcs]);
            assert!(received_all_observe(&received));
        }
    }

    fn received_all_observe(events: &[Event]) -> bool {
        events.iter().all(Event::is_observe)
    }

    #[tokio::test]
    async fn test_log_transport_rejects_patterns() {
        for service in services() {
            if service.transport().capabilities().supports_pattern_subscribe {
                continue;
            }
            let subscriber = service.default_subscriber();
            assert!(matches!(
                subscriber.pattern_subscribe(Subsystem::Csw, "*"),
                Err(EventServiceError::PatternSubscriptionUnsupported { transport: "log" })
            ));
            assert!(matches!(
                subscriber.subscribe_observe_events(),
                Err(EventServiceError::PatternSubscriptionUnsupported { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_malformed_pattern_rejected() {
        for service in pattern_services() {
            let result = service
                .default_subscriber()
                .pattern_subscribe(Subsystem::Csw, "prefix.[abc");
            assert!(matches!(result, Err(EventServiceError::InvalidPattern { .. })));
        }
    }

    #[tokio::test]
    async fn test_unsubscribed_pattern_stream_ends() {
        for service in pattern_services() {
            let mut stream = service
                .default_subscriber()
                .pattern_subscribe(Subsystem::Csw, "*")
                .unwrap();
            stream.ready().await.unwrap();
            stream.unsubscribe().await;

            publish_all(&service, &KEYS).await;
            assert_eq!(stream.next().await, None);
        }
    }
}
