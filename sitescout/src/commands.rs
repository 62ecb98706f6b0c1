use crate::CLAP_STYLING;
use clap::{arg, command};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitescout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitescout")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log per-URL decisions to stderr")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about(
                    "Estimate the size of a site, then crawl it and probe common subdomains. \
                Reports subdomains, subdirectories and pages.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The seed URL (https:// is assumed when no scheme is given)"),
                )
                .arg(
                    arg!(--"max-pages" <NUM>)
                        .required(false)
                        .help("Upper bound on pages fetched (default: 200)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-depth" <NUM>)
                        .required(false)
                        .help("Do not follow links further than this from the seed (default: 3)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Fetches in flight at once (default: 4)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"order" <ORDER>)
                        .required(false)
                        .help("Which pending URL to fetch next: latest (greatest URL first) or fifo")
                        .value_parser(["latest", "fifo"]),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Page fetch timeout in seconds (default: 10)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"no-probe")
                        .required(false)
                        .help("Skip DNS probing of common subdomain labels")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"preview-only")
                        .required(false)
                        .help("Report what the prescan found without crawling further")
                        .action(clap::ArgAction::SetTrue)
                        .conflicts_with("yes"),
                )
                .arg(
                    arg!(-y --"yes")
                        .required(false)
                        .help("Proceed with the full crawl without asking")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"config" <PATH>)
                        .required(false)
                        .help("JSON file with crawl, probe and estimator settings"),
                ),
        )
}
