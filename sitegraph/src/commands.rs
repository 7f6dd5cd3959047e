use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitegraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitegraph")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner, progress and informational logging")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a site from a seed URL, then export its sitemap and link \
                analytics.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help(
                            "Seed URL. A bare host is probed over https before falling back \
                        to http",
                        ),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Maximum crawl depth; the seed sits at depth 0")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("2"),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of async worker 'threads' in the worker pool.")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("20"),
                )
                .arg(
                    arg!(-o --"output" <DIR>)
                        .required(false)
                        .help(
                            "Directory for sitemap.json, analytics.json and sitemap.dot \
                        (default: derived from the URL, depth and current time)",
                        )
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print a JSON summary instead of the text report")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("analyze")
                .about("Compute link analytics for a previously exported sitemap.json")
                .arg(
                    arg!(<SITEMAP>)
                        .required(true)
                        .help("Path to the sitemap file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-b --"base" <URL>)
                        .required(false)
                        .help(
                            "Base URL for internal/external classification (default: first \
                        page in the sitemap)",
                        ),
                )
                .arg(
                    arg!(--"json")
                        .required(false)
                        .help("Print the analytics as JSON instead of text")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
}
