//! Stream and periodic publishing seen from a subscriber.

#[cfg(test)]
mod tests {
    use crate::fixtures::{collect_for, counter, key, numbered, services};
    use ebus_core::Schedule;
    use ebus_types::UtcTime;
    use futures::stream;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test]
    async fn test_published_stream_arrives_in_order() {
        for service in services() {
            let k = key("CSW.publishing.stream");
            let mut subscription = service.default_subscriber().subscribe([k.clone()]).unwrap();
            subscription.ready().await.unwrap();

            let events: Vec<_> = (0..20).map(|n| numbered(&k, n)).collect();
            let _publishing = service.default_publisher().publish_stream(stream::iter(events));

            let received = collect_for(&mut subscription, ms(300)).await;
            let expected: Vec<_> = std::iter::once(None).chain((0..20).map(Some)).collect();
            assert_eq!(received.iter().map(counter).collect::<Vec<_>>(), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_publish_every_interval() {
        for service in services() {
            let k = key("CSW.publishing.periodic");
            let mut subscription = service.default_subscriber().subscribe([k.clone()]).unwrap();
            subscription.ready().await.unwrap();

            let generated = k.clone();
            let mut n = 0;
            let publishing = service
                .default_publisher()
                .publish_periodic(
                    move || {
                        n += 1;
                        Some(numbered(&generated, n))
                    },
                    Schedule::every(ms(100)),
                )
                .unwrap();

            // Ticks at 0, 100, 200, 300 and 400ms.
            let received = collect_for(&mut subscription, ms(450)).await;
            publishing.cancel();
            assert_eq!(
                received.iter().map(counter).collect::<Vec<_>>(),
                vec![None, Some(1), Some(2), Some(3), Some(4), Some(5)]
            );

            let after = collect_for(&mut subscription, ms(500)).await;
            assert!(after.is_empty(), "{}", service.transport().name());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_publish_waits_for_start_time() {
        for service in services() {
            let k = key("CSW.publishing.scheduled");
            let mut subscription = service.default_subscriber().subscribe([k.clone()]).unwrap();
            subscription.ready().await.unwrap();

            let generated = k.clone();
            let mut n = 0;
            let schedule = Schedule::every(ms(500)).starting_at(UtcTime::now().plus(ms(1000)));
            let publishing = service
                .default_publisher()
                .publish_periodic(
                    move || {
                        n += 1;
                        Some(numbered(&generated, n))
                    },
                    schedule,
                )
                .unwrap();

            let early = collect_for(&mut subscription, ms(900)).await;
            assert_eq!(early.len(), 1);
            assert!(early[0].is_invalid());

            // Ticks at 1000, 1500, 2000 and 2500ms.
            let later = collect_for(&mut subscription, ms(1700)).await;
            publishing.cancel();
            assert_eq!(later.len(), 4);
            assert_eq!(counter(&later[3]), Some(4));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_generator_skips_empty_ticks() {
        for service in services() {
            let k = key("CSW.publishing.async");
            let mut subscription = service.default_subscriber().subscribe([k.clone()]).unwrap();
            subscription.ready().await.unwrap();

            let generated = k.clone();
            let mut tick = 0;
            let publishing = service
                .default_publisher()
                .publish_periodic_async(
                    move || {
                        tick += 1;
                        let event = (tick % 2 == 1).then(|| numbered(&generated, tick));
                        async move { event }
                    },
                    Schedule::every(ms(100)),
                )
                .unwrap();

            // Ticks 1..=6 at 0..=500ms, odd ones publish.
            let received = collect_for(&mut subscription, ms(550)).await;
            publishing.cancel();
            assert_eq!(
                received.iter().map(counter).collect::<Vec<_>>(),
                vec![None, Some(1), Some(3), Some(5)]
            );
        }
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        for service in services() {
            let k = key("CSW.publishing.zero");
            let result = service
                .default_publisher()
                .publish_periodic(move || Some(numbered(&k, 0)), Schedule::every(Duration::ZERO));
            assert!(result.is_err());
        }
    }
}
