//! Records a short mixed-sensor sequence into the in-process platform,
//! replays the merged timeline, then narrows the catalog with a typed
//! query.
//!
//! Run with: `cargo run -p tessera-client --example record_and_replay`

use tessera_client::query::{OntologyQuery, QueryOntologyCatalog};
use tessera_client::{SequenceConfig, TesseraClient};
use tessera_ontology::{Gps, GpsStatus, Imu, Ontology, Vector3};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let (client, _platform) = TesseraClient::in_memory();

    // Write: one IMU topic at 200 Hz-ish spacing, one GPS topic at a
    // quarter of the rate.
    client
        .with_sequence("demo-run", SequenceConfig::default(), |writer| async move {
            let imu = writer.topic_create::<Imu>("imu", None).await?;
            let gps = writer.topic_create::<Gps>("gps", None).await?;

            for i in 0..20i64 {
                let sample = Imu {
                    acceleration: Vector3::new(0.1 * i as f64, 0.0, 9.81),
                    ..Imu::default()
                };
                imu.push(sample.into_message(i * 5_000_000)).await?;

                if i % 4 == 0 {
                    let fix = Gps {
                        latitude: 45.0 + i as f64 * 1e-6,
                        longitude: 7.6,
                        altitude: 240.0,
                        status: GpsStatus {
                            status: 1,
                            service: 2,
                        },
                    };
                    gps.push(fix.into_message(i * 5_000_000 + 1)).await?;
                }
            }
            Ok(())
        })
        .await?;

    // Read: the merged timeline across both topics.
    let mut handler = client
        .sequence_handler("demo-run")
        .await?
        .expect("sequence was just recorded");
    let streamer = handler.data_streamer(false).await?;
    let mut count = 0usize;
    while let Some((topic, message)) = streamer.next().await? {
        count += 1;
        if count <= 5 {
            println!("{topic}: ts={}", message.timestamp_ns);
        }
    }
    println!("replayed {count} messages in timestamp order");
    handler.close().await?;

    // Query: which topics saw acceleration.x of at least 1.0?
    let imu_fields = OntologyQuery::of::<Imu>();
    let response = client
        .query(
            QueryOntologyCatalog::new()
                .with_expression(imu_fields.field("acceleration.x")?.geq(1.0)?)?,
        )
        .await?;
    for item in &response {
        println!("match: {} {:?}", item.sequence, item.topics);
    }

    client.close().await?;
    Ok(())
}
