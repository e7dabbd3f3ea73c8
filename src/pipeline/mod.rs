// Ingestion pipeline: fetch + dedup, row processing, and partitioned output

pub mod ingestion;
pub mod output;
pub mod processing;
