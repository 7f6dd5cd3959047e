// Terminal reports for crawls and link analytics

use crate::analytics::LinkAnalytics;
use crate::crawl::extract_url_path;
use colored::Colorize;
use sitegraph_scanner::{VisitRecord, VisitState};
use std::collections::BTreeMap;
use url::Url;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Render analytics as text: link split, out-degree distribution, most linked
/// pages and top external domains.
pub fn generate_analytics_report(analytics: &LinkAnalytics) -> String {
    let mut report = String::new();

    report.push_str("# Link structure:\n");
    if let Some(ref host) = analytics.base_host {
        report.push_str(&format!("  Base host: {}\n", host));
    }
    report.push_str(&format!("  Pages: {}\n", analytics.total_pages));
    report.push_str(&format!("  Total links: {}\n", analytics.total_links));
    report.push_str(&format!(
        "  Internal links: {} ({:.1}%)\n",
        analytics.internal_link_count,
        percentage(analytics.internal_link_count, analytics.total_links)
    ));
    report.push_str(&format!(
        "  External links: {} ({:.1}%)\n",
        analytics.external_link_count,
        percentage(analytics.external_link_count, analytics.total_links)
    ));
    report.push_str(&format!(
        "  Linked URLs never crawled: {}\n",
        analytics.dangling_targets
    ));

    report.push_str("\n## Outbound links per page\n");
    if analytics.out_degree_histogram.is_empty() {
        report.push_str("  (no page has outbound links)\n");
    }
    for (degree, pages) in &analytics.out_degree_histogram {
        report.push_str(&format!("  {:>5} links: {} page(s)\n", degree, pages));
    }

    report.push_str("\n## Most linked pages\n");
    if analytics.top_inbound_pages.is_empty() {
        report.push_str("  (none)\n");
    }
    for (rank, page) in analytics.top_inbound_pages.iter().enumerate() {
        report.push_str(&format!("  {:>2}. {:>5}  {}\n", rank + 1, page.count, page.url));
    }

    report.push_str("\n## Top external domains\n");
    if analytics.top_external_domains.is_empty() {
        report.push_str("  (none)\n");
    }
    for (rank, domain) in analytics.top_external_domains.iter().enumerate() {
        report.push_str(&format!(
            "  {:>2}. {:>5}  {}\n",
            rank + 1,
            domain.count,
            domain.domain
        ));
    }

    report
}

/// Generate a crawl report from the visited pages and their analytics
pub fn generate_crawl_report(records: &[VisitRecord], analytics: &LinkAnalytics) -> String {
    let failed: Vec<&VisitRecord> = records
        .iter()
        .filter(|r| matches!(r.state, VisitState::Failed(_)))
        .collect();

    let mut report = String::new();
    report.push_str(RULE);
    report.push_str("\n\n# Summary:\n");
    report.push_str(&format!("  Pages crawled: {}\n", records.len()));
    report.push_str(&format!("  Failed fetches: {}\n", failed.len()));
    let deepest = records.iter().map(|r| r.depth).max().unwrap_or(0);
    report.push_str(&format!("  Deepest level reached: {}\n", deepest));
    report.push('\n');
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&generate_analytics_report(analytics));

    report.push('\n');
    report.push_str(RULE);
    report.push_str("\n\n");

    // Group pages by host, hosts sorted for a stable listing
    let mut by_host: BTreeMap<String, Vec<&VisitRecord>> = BTreeMap::new();
    for record in records {
        let host = Url::parse(&record.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        by_host.entry(host).or_default().push(record);
    }

    for (host, host_records) in &by_host {
        report.push_str(&format!("## {}\n", host.bold()));
        report.push_str(&format!("  {} pages found\n\n", host_records.len()));

        for record in host_records {
            let path = extract_url_path(&record.url);
            let line = match record.state {
                VisitState::Fetched => format!(
                    "  {} {} {}",
                    "✓".green(),
                    path,
                    format!("({} links, depth {})", record.out_degree(), record.depth).dimmed()
                ),
                VisitState::Failed(ref reason) => {
                    format!("  {} {} {}", "✗".red(), path, reason.red())
                }
                VisitState::Pending => format!("  {} {}", "…".yellow(), path),
            };
            report.push_str(&line);
            report.push('\n');
        }
        report.push('\n');
    }

    report
}
