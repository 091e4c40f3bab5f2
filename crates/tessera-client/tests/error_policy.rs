//! Lifecycle and failure-path behavior of the scoped sequence writer.

use tessera_client::{
    ClientError, OnErrorPolicy, SequenceConfig, SequenceStatus, TesseraClient, WriterConfig,
};
use tessera_ontology::{Gps, Imu, Ontology, Scalar};

fn flush_every_record() -> SequenceConfig {
    SequenceConfig::default().with_writer(WriterConfig {
        max_batch_size_records: 1,
        ..WriterConfig::default()
    })
}

#[tokio::test]
async fn test_report_policy_unlocks_and_keeps_flushed_data() {
    let (client, transport) = TesseraClient::in_memory();

    let fault_handle = transport.clone();
    let mut config = flush_every_record();
    config.on_error = OnErrorPolicy::Report;

    let result = client
        .with_sequence("failing-run", config, |writer| async move {
            let good = writer.topic_create::<Scalar>("t/a", None).await?;
            let bad = writer.topic_create::<Scalar>("t/b", None).await?;

            good.push(Scalar::new(1.0).into_message(100)).await?;
            good.push(Scalar::new(2.0).into_message(200)).await?;

            // From here on, /t/b's channel is down.
            fault_handle.fail_puts("failing-run", "/t/b").await;
            bad.push(Scalar::new(9.0).into_message(150)).await?;
            Ok(())
        })
        .await;

    // The scope exit observes the flush failure...
    assert!(matches!(
        result,
        Err(ClientError::FlushFailed { ref topic, .. }) if topic == "/t/b"
    ));
    // ... and the Report policy unlocks the sequence instead of purging it.
    assert_eq!(
        transport.sequence_status("failing-run").await,
        Some(SequenceStatus::Unlocked)
    );

    // Batches flushed before the failure remain retrievable.
    let mut handler = client
        .topic_handler("failing-run", "t/a")
        .await
        .unwrap()
        .unwrap();
    let streamer = handler.data_streamer(false).await.unwrap();
    assert_eq!(streamer.next().await.unwrap().unwrap().timestamp_ns, 100);
    assert_eq!(streamer.next().await.unwrap().unwrap().timestamp_ns, 200);
    assert!(streamer.next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_policy_aborts_and_purges() {
    let (client, transport) = TesseraClient::in_memory();

    let fault_handle = transport.clone();
    let mut config = flush_every_record();
    config.on_error = OnErrorPolicy::Delete;

    let writer = client.sequence_create("doomed-run", config).await.unwrap();
    let observer = writer.clone();
    let result = writer
        .scope(|writer| async move {
            let good = writer.topic_create::<Scalar>("t/a", None).await?;
            let bad = writer.topic_create::<Scalar>("t/b", None).await?;
            good.push(Scalar::new(1.0).into_message(100)).await?;

            fault_handle.fail_puts("doomed-run", "/t/b").await;
            bad.push(Scalar::new(9.0).into_message(150)).await?;
            Ok(())
        })
        .await;

    assert!(result.is_err());
    // Writer-side terminal status, server-side purge.
    assert_eq!(observer.sequence_status().await, SequenceStatus::Error);
    assert_eq!(transport.sequence_status("doomed-run").await, None);
    assert!(client.sequence_handler("doomed-run").await.unwrap().is_none());
}

#[tokio::test]
async fn test_body_error_runs_error_policy() {
    let (client, transport) = TesseraClient::in_memory();

    let result: Result<(), _> = client
        .with_sequence("aborted-run", SequenceConfig::default(), |writer| async move {
            writer.topic_create::<Scalar>("t", None).await?;
            Err(ClientError::Data("sensor dropped out".to_string()))
        })
        .await;

    assert!(matches!(result, Err(ClientError::Data(_))));
    // Default policy is Report.
    assert_eq!(
        transport.sequence_status("aborted-run").await,
        Some(SequenceStatus::Unlocked)
    );
}

#[tokio::test]
async fn test_panic_in_scope_still_runs_error_policy() {
    let transport = tessera_client::transport::InMemoryTransport::new();
    let client = TesseraClient::builder()
        .transport(std::sync::Arc::new(transport.clone()))
        .build()
        .unwrap();

    let join = tokio::spawn(async move {
        let result: Result<(), ClientError> = client
            .with_sequence("panicking-run", SequenceConfig::default(), |writer| async move {
                writer.topic_create::<Scalar>("t", None).await?;
                panic!("recorder crashed");
            })
            .await;
        result
    })
    .await;

    assert!(join.is_err());
    assert!(join.unwrap_err().is_panic());
    assert_eq!(
        transport.sequence_status("panicking-run").await,
        Some(SequenceStatus::Unlocked)
    );
}

#[tokio::test]
async fn test_writer_outside_scope_is_unusable() {
    let (client, _transport) = TesseraClient::in_memory();

    let writer = client
        .sequence_create("unscoped-run", SequenceConfig::default())
        .await
        .unwrap();
    let err = writer.topic_create::<Scalar>("t", None).await.unwrap_err();
    assert!(matches!(err, ClientError::UnsafeLifecycle));
}

#[tokio::test]
async fn test_writer_leaked_from_scope_is_closed() {
    let (client, _transport) = TesseraClient::in_memory();

    let mut leaked = None;
    client
        .with_sequence("leaky-run", SequenceConfig::default(), |writer| {
            let slot = &mut leaked;
            async move {
                writer.topic_create::<Scalar>("t", None).await?;
                *slot = Some(writer.clone());
                Ok(())
            }
        })
        .await
        .unwrap();

    let writer = leaked.unwrap();
    assert_eq!(writer.sequence_status().await, SequenceStatus::Finalized);
    let err = writer.topic_create::<Scalar>("late", None).await.unwrap_err();
    assert!(matches!(err, ClientError::SequenceClosed { .. }));

    let topic = writer.get_topic("t").await.unwrap();
    let err = topic.push(Scalar::new(1.0).into_message(1)).await.unwrap_err();
    assert!(matches!(err, ClientError::WriterClosed { .. }));
}

#[tokio::test]
async fn test_ontology_mismatch_rejected_before_enqueue() {
    let (client, _transport) = TesseraClient::in_memory();

    client
        .with_sequence("mismatch-run", SequenceConfig::default(), |writer| async move {
            let gps = writer.topic_create::<Gps>("sensors/gps", None).await?;
            let err = gps
                .push(Imu::default().into_message(100))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ClientError::OntologyMismatch { ref expected, ref found, .. }
                    if expected == "gps" && found == "imu"
            ));
            // The writer stays usable for correctly-typed payloads.
            gps.push(Gps::default().into_message(200)).await?;
            Ok(())
        })
        .await
        .unwrap();

    let handler = client.sequence_handler("mismatch-run").await.unwrap().unwrap();
    assert_eq!(handler.topics()[0].row_count, 1);
}

#[tokio::test]
async fn test_duplicate_sequence_is_rejected() {
    let (client, _transport) = TesseraClient::in_memory();
    client
        .with_sequence("twice", SequenceConfig::default(), |_writer| async move { Ok(()) })
        .await
        .unwrap();
    let err = client
        .with_sequence("twice", SequenceConfig::default(), |_writer| async move { Ok(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
