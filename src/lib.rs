//! Query executor core of an [ml-metadata] compatible store.
//!
//! This crate implements the layer below a metadata store's public API: it
//! translates a fixed set of typed metadata operations into SQL for
//! SQLite- and MySQL-compatible databases, manages the schema lifecycle
//! (creation, version detection, forward migration and downgrade), binds
//! heterogeneous values into the query templates, and returns uniform
//! [`RecordSet`](record_set::RecordSet) results. The enclosing service is
//! expected to provide the RPC surface and wrap each request in a
//! transaction on the [`MetadataSource`](metadata_source::MetadataSource).
//!
//! The supported schema is version 8.
//!
//! [ml-metadata]: https://github.com/google/ml-metadata
//!
//! # Examples
//!
//! ```
//! use mlmd_query::metadata_source::{MetadataSource, SqliteMetadataSource};
//! use mlmd_query::query::QueryConfig;
//! use mlmd_query::{InitOptions, QueryExecutor};
//! use tempfile::NamedTempFile;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let db_file = NamedTempFile::new()?;
//! let uri = format!("sqlite://{}", db_file.path().to_str().unwrap());
//! let mut source = SqliteMetadataSource::connect(&uri).await?;
//!
//! // Creates the schema on the empty database.
//! QueryExecutor::new(&mut source, QueryConfig::sqlite())
//!     .init_metadata_source(&InitOptions::default())
//!     .await?;
//!
//! // Records an artifact type and an artifact of that type.
//! source.begin().await?;
//! let mut executor = QueryExecutor::new(&mut source, QueryConfig::sqlite());
//! let type_id = executor.insert_artifact_type("DataSet", None, None).await?;
//! let artifact_id = executor
//!     .insert_artifact(type_id, Some("path/to/data"), None, None, 0, 0)
//!     .await?;
//! let artifacts = executor.select_artifacts_by_id(&[artifact_id]).await?;
//! assert_eq!(artifacts.records.len(), 1);
//! source.commit().await?;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
pub mod errors;
pub mod listing;
pub mod metadata;
pub mod metadata_source;
pub mod query;
pub mod record_set;

mod binder;
mod query_executor;

pub use self::query_executor::{InitOptions, QueryExecutor};
