// Pipeline ingestion: fetching raw objects, content digests, and the dedup check

pub mod dedup;
pub mod digest;
pub mod fetch;

pub use dedup::DedupChecker;
pub use digest::content_digest;
pub use fetch::fetch_raw_file;
