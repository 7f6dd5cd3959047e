pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod graph;
pub mod normalize;
pub mod result;

pub use crawler::{Crawler, ProgressCallback, ResultCallback};
pub use error::{FetchError, ScanError};
pub use fetcher::{Fetcher, HttpFetcher};
pub use graph::{Admission, SiteGraph};
pub use normalize::{HeadProbe, SchemeProbe, normalize_seed, normalize_seed_with};
pub use result::{CrawlJob, VisitRecord, VisitState};
