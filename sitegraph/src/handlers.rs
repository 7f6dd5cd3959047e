use anyhow::{Context, bail};
use chrono::{DateTime, Local};
use clap::ArgMatches;
use colored::Colorize;
use sitegraph_core::export::{ExportedFiles, export_all, load_sitemap};
use sitegraph_core::report::{generate_analytics_report, generate_crawl_report};
use sitegraph_core::{CrawlOptions, CrawlProgressCallback, LinkAnalytics, analyze, execute_crawl};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// Re-export crawl types and functions from sitegraph-core
pub use sitegraph_core::crawl::extract_url_path;

/// Folder name for a crawl's artifacts: the URL as typed with `//`, `/` and
/// `:` flattened to `_`, then the depth and a local timestamp.
pub fn derive_output_dir_name(url: &str, max_depth: usize, started: &DateTime<Local>) -> String {
    let flattened = url.trim().replace("//", "_").replace('/', "_").replace(':', "_");
    format!(
        "{}_depth_{}_{}",
        flattened,
        max_depth,
        started.format("%Y-%m-%d_%H-%M-%S")
    )
}

/// Expand a leading `~` in a user supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

/// Where a crawl writes its files: the `--output` directory if given,
/// otherwise a derived folder under the current directory.
pub fn resolve_output_dir(
    output: Option<&PathBuf>,
    url: &str,
    max_depth: usize,
    started: &DateTime<Local>,
) -> PathBuf {
    match output {
        Some(dir) => expand_path(dir),
        None => PathBuf::from(derive_output_dir_name(url, max_depth, started)),
    }
}

/// Load a persisted sitemap and analyze it. Without an explicit base URL the
/// first page in the file, which is the crawl seed, is used.
pub fn analyze_sitemap_file(path: &Path, base: Option<&str>) -> anyhow::Result<LinkAnalytics> {
    let sitemap = load_sitemap(path)
        .with_context(|| format!("Failed to load sitemap {}", path.display()))?;

    let base = match base.or(sitemap.seed()) {
        Some(base) => base.to_string(),
        None => bail!(
            "{} contains no pages; pass --base to name the site",
            path.display()
        ),
    };

    Ok(analyze(&sitemap, &base))
}

fn print_saved_files(files: &ExportedFiles) {
    println!("{}", "Saved:".bold());
    for path in [&files.sitemap, &files.analytics, &files.dot] {
        println!("  {} {}", "→".blue(), path.display());
    }
}

pub async fn handle_crawl(sub_matches: &ArgMatches) -> anyhow::Result<()> {
    let started = Local::now();
    let quiet = sub_matches.get_flag("quiet");
    let json = sub_matches.get_flag("json");

    let url = sub_matches
        .get_one::<String>("url")
        .context("--url is required")?
        .clone();
    let max_depth = *sub_matches.get_one::<usize>("depth").unwrap_or(&2);
    let threads = *sub_matches.get_one::<usize>("threads").unwrap_or(&10);
    let timeout = Duration::from_secs(*sub_matches.get_one::<u64>("timeout").unwrap_or(&20));
    let output_dir = resolve_output_dir(
        sub_matches.get_one::<PathBuf>("output"),
        &url,
        max_depth,
        &started,
    );

    // Ctrl-C stops admitting new pages; whatever was gathered is still exported
    let cancellation = CancellationToken::new();
    let signal_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight pages");
            signal_token.cancel();
        }
    });

    if !quiet && !json {
        println!("\nCrawling {}", url.bright_white());
        println!("Workers: {}", threads);
        println!("Max depth: {}", max_depth);
        println!("Timeout: {}s\n", timeout.as_secs());
    }

    let options = CrawlOptions {
        url,
        threads,
        max_depth,
        timeout,
        show_progress_bars: !quiet && !json,
        cancellation: Some(cancellation),
        result_callback: None,
    };

    let progress_callback: Option<CrawlProgressCallback> = if quiet || json {
        None
    } else {
        Some(Arc::new(|msg: String| println!("{} {}", "→".blue(), msg)))
    };

    let outcome = execute_crawl(options, progress_callback)
        .await
        .context("Crawl failed")?;

    let analytics = analyze(&outcome.sitemap, &outcome.seed);
    let files = export_all(&outcome.sitemap, &analytics, &output_dir)
        .with_context(|| format!("Failed to export results to {}", output_dir.display()))?;

    info!(
        pages = outcome.records.len(),
        failed = outcome.failed_count(),
        dir = %output_dir.display(),
        "Crawl exported"
    );

    if json {
        let summary = serde_json::json!({
            "seed": outcome.seed,
            "pages": outcome.records.len(),
            "failed": outcome.failed_count(),
            "files": {
                "sitemap": files.sitemap,
                "analytics": files.analytics,
                "dot": files.dot,
            },
            "analytics": analytics,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("\n{} Crawl complete!\n", "✓".green().bold());
        print!("{}", generate_crawl_report(&outcome.records, &analytics));
        print_saved_files(&files);
    }

    Ok(())
}

pub fn handle_analyze(sub_matches: &ArgMatches) -> anyhow::Result<()> {
    let path = sub_matches
        .get_one::<PathBuf>("SITEMAP")
        .map(|p| expand_path(p))
        .context("a sitemap path is required")?;
    let base = sub_matches.get_one::<String>("base").map(String::as_str);

    let analytics = analyze_sitemap_file(&path, base)?;

    if sub_matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&analytics)?);
    } else {
        print!("{}", generate_analytics_report(&analytics));
    }

    Ok(())
}
