//! Source search cluster abstraction.
//!
//! This module provides a `SourceCluster` trait covering the three read surfaces the
//! migration needs: shard topology, index schema, and ordered per-shard scans.

mod elasticsearch;
mod types;

pub use elasticsearch::ElasticsearchClient;
pub use types::*;
