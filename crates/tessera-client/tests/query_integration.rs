//! Typed query facility against the in-memory platform: convenience
//! methods, metadata expressions, catalog queries and response chaining.

use tessera_client::{
    Query, QueryOntologyCatalog, QuerySequence, QueryTopic, SequenceConfig, SequenceFields,
    TesseraClient,
};
use tessera_client::query::OntologyQuery;
use tessera_ontology::{Gps, GpsStatus, Imu, Ontology, Scalar, Vector3};

fn metadata(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object metadata, got {other}"),
    }
}

/// Three sequences with distinct metadata and sensor payloads:
///
/// - `survey-alpha` (raw, private): IMU on two topics, GPS on one
/// - `survey-beta` (raw, public): one scalar channel
/// - `bench-gamma` (processed, private): one scalar channel
async fn inject_fixtures(client: &TesseraClient) {
    client
        .with_sequence(
            "survey-alpha",
            SequenceConfig::new(
                metadata(serde_json::json!({"status": "raw", "visibility": "private"})),
                Default::default(),
            ),
            |writer| async move {
                let imu_front = writer.topic_create::<Imu>("imu/front", None).await?;
                let imu_rear = writer.topic_create::<Imu>("imu/rear", None).await?;
                let gps = writer.topic_create::<Gps>("gps", None).await?;

                for ts in 0..5i64 {
                    let sample = Imu {
                        acceleration: Vector3::new(0.5 + ts as f64, 0.0, 9.81),
                        ..Imu::default()
                    };
                    imu_front.push(sample.into_message(ts * 10)).await?;
                    let sample = Imu {
                        acceleration: Vector3::new(-0.2, 0.0, 9.81),
                        ..Imu::default()
                    };
                    imu_rear.push(sample.into_message(ts * 10 + 1)).await?;
                }
                let fix = Gps {
                    latitude: 45.0,
                    longitude: 7.6,
                    altitude: 300.0,
                    status: GpsStatus {
                        status: 1,
                        service: 2,
                    },
                };
                gps.push(fix.into_message(25)).await?;
                Ok(())
            },
        )
        .await
        .unwrap();

    client
        .with_sequence(
            "survey-beta",
            SequenceConfig::new(
                metadata(serde_json::json!({"status": "raw", "visibility": "public"})),
                Default::default(),
            ),
            |writer| async move {
                let channel = writer.topic_create::<Scalar>("speed", None).await?;
                channel.push(Scalar::new(3.0).into_message(5)).await?;
                Ok(())
            },
        )
        .await
        .unwrap();

    client
        .with_sequence(
            "bench-gamma",
            SequenceConfig::new(
                metadata(serde_json::json!({"status": "processed", "visibility": "private"})),
                Default::default(),
            ),
            |writer| async move {
                let channel = writer.topic_create::<Scalar>("speed", None).await?;
                channel.push(Scalar::new(4.0).into_message(7)).await?;
                Ok(())
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_query_sequence_by_name_returns_all_topics() {
    let (client, _transport) = TesseraClient::in_memory();
    inject_fixtures(&client).await;

    let resp = client
        .query(QuerySequence::new().with_name("survey-alpha").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.len(), 1);
    assert_eq!(resp[0].sequence, "survey-alpha");
    let mut topics = resp[0].topics.clone();
    topics.sort();
    assert_eq!(topics, vec!["/gps", "/imu/front", "/imu/rear"]);
    assert!(topics.iter().all(|t| t.starts_with('/')));
}

#[tokio::test]
async fn test_query_sequence_by_name_match() {
    let (client, _transport) = TesseraClient::in_memory();
    inject_fixtures(&client).await;

    let resp = client
        .query(QuerySequence::new().with_name_match("survey-").unwrap())
        .await
        .unwrap();
    let mut names: Vec<_> = resp.iter().map(|item| item.sequence.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["survey-alpha", "survey-beta"]);

    let resp = client
        .query(QuerySequence::new().with_name_match("no-such-run").unwrap())
        .await
        .unwrap();
    assert!(resp.is_empty());
    assert_eq!(resp.len(), 0);
}

#[tokio::test]
async fn test_query_sequence_by_metadata_expressions() {
    let (client, _transport) = TesseraClient::in_memory();
    inject_fixtures(&client).await;

    let resp = client
        .query(
            QuerySequence::new()
                .with_expression(SequenceFields::user_metadata("status").eq("raw").unwrap())
                .unwrap()
                .with_expression(
                    SequenceFields::user_metadata("visibility")
                        .eq("private")
                        .unwrap(),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.len(), 1);
    assert_eq!(resp[0].sequence, "survey-alpha");

    // No sequence is both processed and public.
    let resp = client
        .query(
            QuerySequence::new()
                .with_expression(
                    SequenceFields::user_metadata("status")
                        .eq("processed")
                        .unwrap(),
                )
                .unwrap()
                .with_expression(
                    SequenceFields::user_metadata("visibility")
                        .eq("public")
                        .unwrap(),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp.is_empty());
}

#[tokio::test]
async fn test_query_topic_by_tag_and_name() {
    let (client, _transport) = TesseraClient::in_memory();
    inject_fixtures(&client).await;

    let resp = client
        .query(QueryTopic::new().with_ontology_tag("imu").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.len(), 1);
    assert_eq!(resp[0].sequence, "survey-alpha");
    assert_eq!(resp[0].topics.len(), 2);

    let resp = client
        .query(QueryTopic::new().with_name("/speed").unwrap())
        .await
        .unwrap();
    let mut names: Vec<_> = resp.iter().map(|item| item.sequence.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["bench-gamma", "survey-beta"]);
}

#[tokio::test]
async fn test_query_catalog_by_field_condition() {
    let (client, _transport) = TesseraClient::in_memory();
    inject_fixtures(&client).await;

    // Only /imu/front has acceleration.x >= 0.01.
    let imu = OntologyQuery::of::<Imu>();
    let resp = client
        .query(
            QueryOntologyCatalog::new()
                .with_expression(imu.field("acceleration.x").unwrap().geq(0.01).unwrap())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.len(), 1);
    assert_eq!(resp[0].sequence, "survey-alpha");
    assert_eq!(resp[0].topics, vec!["/imu/front"]);

    // Between catches the rear IMU as well.
    let resp = client
        .query(
            QueryOntologyCatalog::new()
                .with_expression(
                    imu.field("acceleration.x")
                        .unwrap()
                        .between(-1.0, 10.0)
                        .unwrap(),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp[0].topics.len(), 2);

    // Nested GPS status field.
    let gps = OntologyQuery::of::<Gps>();
    let resp = client
        .query(
            QueryOntologyCatalog::new()
                .with_expression(gps.field("status.service").unwrap().eq(2).unwrap())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.len(), 1);
    assert_eq!(resp[0].topics, vec!["/gps"]);
}

#[tokio::test]
async fn test_query_catalog_by_message_timestamp() {
    let (client, _transport) = TesseraClient::in_memory();
    inject_fixtures(&client).await;

    // IMU rows exist at ts 0..=41; nothing beyond 100.
    let resp = client
        .query(
            QueryOntologyCatalog::new()
                .with_message_timestamp("imu", Some(100), None)
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp.is_empty());

    let resp = client
        .query(
            QueryOntologyCatalog::new()
                .with_message_timestamp("imu", Some(1), Some(50))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.len(), 1);
    assert_eq!(resp[0].topics.len(), 2);
}

#[tokio::test]
async fn test_composite_query_intersects_scopes() {
    let (client, _transport) = TesseraClient::in_memory();
    inject_fixtures(&client).await;

    let imu = OntologyQuery::of::<Imu>();
    let resp = client
        .query(
            Query::new()
                .topic(QueryTopic::new().with_name_match("front").unwrap())
                .catalog(
                    QueryOntologyCatalog::new()
                        .with_expression(
                            imu.field("acceleration.x").unwrap().between(0.0, 10.0).unwrap(),
                        )
                        .unwrap(),
                ),
        )
        .await
        .unwrap();
    assert_eq!(resp.len(), 1);
    assert_eq!(resp[0].topics, vec!["/imu/front"]);
}

#[tokio::test]
async fn test_restricted_query_chaining() {
    let (client, _transport) = TesseraClient::in_memory();
    inject_fixtures(&client).await;

    let private = client
        .query(
            QuerySequence::new()
                .with_expression(
                    SequenceFields::user_metadata("visibility")
                        .eq("private")
                        .unwrap(),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    let mut names: Vec<_> = private.iter().map(|item| item.sequence.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["bench-gamma", "survey-alpha"]);

    // Re-querying with the chained builder reproduces the same domain.
    let again = client
        .query(private.to_query_sequence().unwrap())
        .await
        .unwrap();
    assert_eq!(again.len(), private.len());

    // Narrowing the chained topic query by ontology tag.
    let narrowed = client
        .query(
            private
                .to_query_topic()
                .unwrap()
                .with_ontology_tag("imu")
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].sequence, "survey-alpha");
    assert_eq!(narrowed[0].topics.len(), 2);
}

#[tokio::test]
async fn test_query_unknown_tag_fails_client_side() {
    let err = OntologyQuery::by_tag("not-an-ontology").unwrap_err();
    assert!(matches!(
        err,
        tessera_client::ClientError::Ontology(
            tessera_ontology::OntologyError::UnknownTag(_)
        )
    ));
}
