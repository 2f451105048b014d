//! Concurrent encodes and decodes with distinct contextual sources.

use flexcache_core::{cacheable, DynValue, FlexibleCodec, NoContext, Serializer, TypeRegistry};
use std::sync::Arc;

#[cacheable(name = "sensor::Reading")]
struct Celsius(f64);

#[cacheable(name = "sensor::Reading")]
struct Fahrenheit(f64);

#[cacheable(name = "sensor::Frame")]
struct Frame {
    station: String,
    readings: Vec<DynValue>,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contexts_do_not_leak_between_calls() {
    // The shared default knows frames but not readings.
    let codec = Arc::new(FlexibleCodec::new(Arc::new(TypeRegistry::with_builtins().with::<Frame>())));

    let writer = FlexibleCodec::new(Arc::new(TypeRegistry::new()));
    let frame = Frame {
        station: "north".into(),
        readings: (0..8).map(|i| DynValue::new(Celsius(i as f64))).collect(),
    };
    let bytes = Arc::new(writer.serialize(Some(&frame)).unwrap());

    let mut tasks = Vec::new();
    for task in 0..32 {
        let codec = Arc::clone(&codec);
        let bytes = Arc::clone(&bytes);
        tasks.push(tokio::spawn(async move {
            let wants_celsius = task % 2 == 0;
            let mut context = TypeRegistry::new();
            if wants_celsius {
                context.register::<Celsius>();
            } else {
                context.register::<Fahrenheit>();
            }

            let own = Frame {
                station: format!("station-{task}"),
                readings: (0..4)
                    .map(|i| {
                        if wants_celsius {
                            DynValue::new(Celsius(i as f64))
                        } else {
                            DynValue::new(Fahrenheit(i as f64))
                        }
                    })
                    .collect(),
            };
            let expected = FlexibleCodec::new(Arc::new(TypeRegistry::new()))
                .serialize(Some(&own))
                .unwrap();

            for _ in 0..50 {
                let shared = Serializer::<Frame>::deserialize(&codec.in_context(&context), Some(&bytes))
                    .unwrap()
                    .unwrap();
                for reading in &shared.readings {
                    assert_eq!(reading.downcast_ref::<Celsius>().is_some(), wants_celsius);
                    assert_eq!(reading.downcast_ref::<Fahrenheit>().is_some(), !wants_celsius);
                }
                tokio::task::yield_now().await;

                let written = Serializer::<Frame>::serialize(&*codec, Some(&own)).unwrap();
                assert_eq!(written, expected);
                let back = Serializer::<Frame>::deserialize(&codec.in_context(&context), Some(&written))
                    .unwrap()
                    .unwrap();
                assert_eq!(back.station, own.station);
                assert_eq!(back.readings.len(), 4);
                tokio::task::yield_now().await;
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    // Without a context, readings cannot be resolved at all.
    assert!(FlexibleCodec::deserialize(&codec, Some(&bytes), &NoContext).is_err());
}
