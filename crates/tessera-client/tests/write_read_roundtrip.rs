//! End-to-end write + read round trips against the in-memory platform.
//!
//! Covers the full pipeline: scoped sequence writer → batching → background
//! flush → record-batch channel → platform storage → handler → streamer.

use tessera_client::{
    ClientError, OnErrorPolicy, SequenceConfig, SequenceStatus, TesseraClient, WriterConfig,
};
use tessera_core::{Header, Time};
use tessera_ontology::{Gps, GpsStatus, Ontology, Scalar};

fn metadata(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object metadata, got {other}"),
    }
}

#[tokio::test]
async fn test_write_then_stream_single_topic() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (client, _transport) = TesseraClient::in_memory();

    client
        .with_sequence("run-001", SequenceConfig::default(), |writer| async move {
            let speed = writer.topic_create::<Scalar>("t/a", None).await?;
            speed.push(Scalar::new(1.0).into_message(100)).await?;
            speed.push(Scalar::new(2.0).into_message(200)).await?;
            Ok(())
        })
        .await
        .unwrap();

    let mut handler = client.sequence_handler("run-001").await.unwrap().unwrap();
    assert_eq!(handler.sequence_info().status, SequenceStatus::Finalized);
    assert_eq!(handler.topics().len(), 1);
    assert_eq!(handler.topics()[0].name, "/t/a");
    assert_eq!(handler.topics()[0].row_count, 2);

    let streamer = handler.data_streamer(false).await.unwrap();

    let (topic, first) = streamer.next().await.unwrap().unwrap();
    assert_eq!(topic, "/t/a");
    assert_eq!(first.timestamp_ns, 100);
    assert_eq!(Scalar::from_record(&first.data).unwrap().value, 1.0);

    let (topic, second) = streamer.next().await.unwrap().unwrap();
    assert_eq!(topic, "/t/a");
    assert_eq!(second.timestamp_ns, 200);
    assert_eq!(Scalar::from_record(&second.data).unwrap().value, 2.0);

    assert!(streamer.next().await.unwrap().is_none());
    handler.close().await.unwrap();
}

#[tokio::test]
async fn test_header_and_payload_survive_the_wire() {
    let (client, _transport) = TesseraClient::in_memory();

    let fix = Gps {
        latitude: 45.07,
        longitude: 7.69,
        altitude: 240.5,
        status: GpsStatus {
            status: 1,
            service: 2,
        },
    };
    let header = Header::new(Time::from_nanos(999), "gps_antenna");

    let pushed = fix;
    let pushed_header = header.clone();
    client
        .with_sequence("run-002", SequenceConfig::default(), |writer| async move {
            let gps = writer.topic_create::<Gps>("sensors/gps", None).await?;
            gps.push_payload(pushed, 1_000, Some(pushed_header)).await?;
            Ok(())
        })
        .await
        .unwrap();

    let mut handler = client
        .topic_handler("run-002", "sensors/gps")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handler.ontology_tag(), "gps");

    let streamer = handler.data_streamer(false).await.unwrap();
    let message = streamer.next().await.unwrap().unwrap();
    assert_eq!(message.timestamp_ns, 1_000);
    assert_eq!(message.header, Some(header));
    assert_eq!(Gps::from_record(&message.data).unwrap(), fix);
    assert!(streamer.next().await.unwrap().is_none());
    handler.close().await.unwrap();
}

#[tokio::test]
async fn test_batching_thresholds_preserve_push_order() {
    let (client, _transport) = TesseraClient::in_memory();

    let config = SequenceConfig::default().with_writer(WriterConfig {
        max_batch_size_records: 3,
        ..WriterConfig::default()
    });
    client
        .with_sequence("run-003", config, |writer| async move {
            let channel = writer.topic_create::<Scalar>("t", None).await?;
            for ts in 0..10 {
                channel.push(Scalar::new(ts as f64).into_message(ts)).await?;
            }
            Ok(())
        })
        .await
        .unwrap();

    let mut handler = client.sequence_handler("run-003").await.unwrap().unwrap();
    let streamer = handler.data_streamer(false).await.unwrap();
    let mut seen = Vec::new();
    while let Some((_, message)) = streamer.next().await.unwrap() {
        seen.push(message.timestamp_ns);
    }
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_topic_names_are_normalized_on_create() {
    let (client, _transport) = TesseraClient::in_memory();

    client
        .with_sequence("run-004", SequenceConfig::default(), |writer| async move {
            let created = writer.topic_create::<Scalar>("no/leading/slash", None).await?;
            assert_eq!(created.topic(), "/no/leading/slash");
            assert!(writer.topic_exists("/no/leading/slash").await);
            assert!(writer.topic_exists("no/leading/slash").await);

            // Same name after normalization: rejected.
            let err = writer
                .topic_create::<Scalar>("/no/leading/slash", None)
                .await
                .unwrap_err();
            assert!(matches!(err, ClientError::DuplicateTopic { .. }));
            Ok(())
        })
        .await
        .unwrap();

    let handler = client.sequence_handler("run-004").await.unwrap().unwrap();
    assert_eq!(handler.topics()[0].name, "/no/leading/slash");
}

#[tokio::test]
async fn test_sequence_metadata_round_trip() {
    let (client, _transport) = TesseraClient::in_memory();

    let config = SequenceConfig::new(
        metadata(serde_json::json!({"operator": "rover-7", "environment": {"visibility": "low"}})),
        OnErrorPolicy::Report,
    );
    client
        .with_sequence("run-005", config, |writer| async move {
            writer
                .topic_create::<Scalar>(
                    "t",
                    Some(metadata(serde_json::json!({"unit": "m/s"}))),
                )
                .await?;
            Ok(())
        })
        .await
        .unwrap();

    let handler = client.sequence_handler("run-005").await.unwrap().unwrap();
    assert_eq!(
        handler.user_metadata()["environment"]["visibility"],
        serde_json::json!("low")
    );
    assert_eq!(
        handler.topics()[0].user_metadata["unit"],
        serde_json::json!("m/s")
    );
}

#[tokio::test]
async fn test_missing_resources_return_none() {
    let (client, _transport) = TesseraClient::in_memory();
    assert!(client
        .sequence_handler("does-not-exist")
        .await
        .unwrap()
        .is_none());
    assert!(client
        .topic_handler("does-not-exist", "/topic")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_force_new_instance_restarts_the_stream() {
    let (client, _transport) = TesseraClient::in_memory();

    client
        .with_sequence("run-006", SequenceConfig::default(), |writer| async move {
            let channel = writer.topic_create::<Scalar>("t", None).await?;
            channel.push(Scalar::new(1.0).into_message(10)).await?;
            channel.push(Scalar::new(2.0).into_message(20)).await?;
            Ok(())
        })
        .await
        .unwrap();

    let mut handler = client.sequence_handler("run-006").await.unwrap().unwrap();
    {
        let streamer = handler.data_streamer(false).await.unwrap();
        let (_, message) = streamer.next().await.unwrap().unwrap();
        assert_eq!(message.timestamp_ns, 10);
    }
    // Cached instance keeps its position.
    {
        let streamer = handler.data_streamer(false).await.unwrap();
        assert_eq!(streamer.next_timestamp(), Some(20));
    }
    // A forced new instance starts from the beginning.
    {
        let streamer = handler.data_streamer(true).await.unwrap();
        assert_eq!(streamer.next_timestamp(), Some(10));
    }
}
