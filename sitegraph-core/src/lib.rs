pub mod analytics;
pub mod crawl;
pub mod export;
pub mod report;
pub mod sitemap;

pub use analytics::{LinkAnalytics, RankedDomain, RankedPage, analyze};
pub use crawl::{
    CrawlOptions, CrawlOutcome, CrawlProgressCallback, CrawlResultCallback, execute_crawl,
};
pub use export::{ExportError, export_all, export_sitemap, load_sitemap};
pub use sitemap::{SiteMap, SiteMapEntry};

use colored::Colorize;

pub fn print_banner() {
    println!(
        "{}",
        r#"
     _ _                              _
 ___(_) |_ ___  __ _ _ __ __ _ _ __ | |__
/ __| | __/ _ \/ _` | '__/ _` | '_ \| '_ \
\__ \ | ||  __/ (_| | | | (_| | |_) | | | |
|___/_|\__\___|\__, |_|  \__,_| .__/|_| |_|
               |___/          |_|
"#
        .bright_cyan()
    );
    println!(
        "  {} {}\n",
        "map a site's link structure".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
