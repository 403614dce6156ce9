//! MM Indexer - Offline population of the movie index
//!
//! Embeds plot summaries (splitting texts the provider rejects) and
//! upserts them in fixed-size batches, retrying failed batches forever
//! with a fixed delay.
//!
//! Author: hephaex@gmail.com

pub mod batch;
pub mod split;

pub use batch::{BatchIndexer, IndexReport, DEFAULT_BATCH_SIZE, DEFAULT_RETRY_DELAY};
pub use split::{average, embed_with_fallback, split_point, SplitPolicy};
