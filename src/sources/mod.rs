pub mod client;

pub use client::{HttpSourceGateway, SourceClient, SourceError};
