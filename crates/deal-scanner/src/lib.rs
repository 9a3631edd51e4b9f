pub mod extractor;
pub mod feeds;
pub mod fetcher;
pub mod scanner;
pub mod selection;

pub use extractor::{classify, extract_candidate, extract_price};
pub use feeds::{parse_feed, HttpFeedSource, DEFAULT_FEEDS};
pub use fetcher::HttpPageFetcher;
pub use scanner::{DealScanner, DealSource, ScannerConfig};
pub use selection::{parse_selection, SelectionOutcome};
