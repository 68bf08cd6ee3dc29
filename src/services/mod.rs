pub mod aggregator;
pub mod ingestor;

pub use aggregator::{AggregationError, Aggregator};
pub use ingestor::{run_consumer, EventIngestor, IngestError, IngestOutcome};
