//! Tessera Client - SDK for the Tessera time-series recording platform
//!
//! Producers stream timestamped ontology payloads into named **sequences**
//! partitioned by **topics**; consumers read one topic or a chronologically
//! merged view across all topics of a sequence, and filter the catalog with
//! typed query builders.
//!
//! # Examples
//!
//! ## Writing a sequence
//!
//! ```ignore
//! use tessera_client::{TesseraClient, SequenceConfig};
//! use tessera_ontology::{Ontology, Scalar};
//!
//! let client = TesseraClient::builder().transport(transport).build()?;
//!
//! client
//!     .with_sequence("run-042", SequenceConfig::default(), |writer| async move {
//!         let speed = writer.topic_create::<Scalar>("car/speed", None).await?;
//!         speed.push(Scalar::new(12.5).into_message(1_700_000_000_000_000_000)).await?;
//!         Ok(())
//!     })
//!     .await?;
//! ```
//!
//! ## Reading the merged timeline
//!
//! ```ignore
//! let mut handler = client.sequence_handler("run-042").await?.unwrap();
//! let streamer = handler.data_streamer(false).await?;
//! while let Some((topic, message)) = streamer.next().await? {
//!     println!("{topic}: {}", message.timestamp_ns);
//! }
//! ```
//!
//! ## Querying the catalog
//!
//! ```ignore
//! use tessera_client::query::{OntologyQuery, QueryOntologyCatalog};
//! use tessera_ontology::Imu;
//!
//! let imu = OntologyQuery::of::<Imu>();
//! let resp = client
//!     .query(QueryOntologyCatalog::new().with_expression(imu.field("acceleration.x")?.geq(0.01)?)?)
//!     .await?;
//! let narrowed = client.query(resp.to_query_sequence()?).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod query;
pub mod retry;
pub mod streamer;
pub mod transport;
pub mod writer;

pub use client::{TesseraClient, TesseraClientBuilder};
pub use config::{OnErrorPolicy, ReaderConfig, SequenceConfig, UserMetadata, WriterConfig};
pub use error::{ClientError, Result};
pub use handler::{SequenceHandler, TopicHandler};
pub use query::{
    OntologyQuery, Query, QueryExpression, QueryOntologyCatalog, QueryResponse,
    QueryResponseItem, QuerySequence, QueryTopic, SequenceFields, TopicFields,
};
pub use retry::RetryPolicy;
pub use streamer::{SequenceDataStreamer, TopicDataStreamer};
pub use transport::{SequenceInfo, SequenceStatus, TopicInfo, Transport};
pub use writer::{SequenceWriter, TopicWriter};
