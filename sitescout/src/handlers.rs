use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use serde::Deserialize;
use sitescout_core::report::{ReportFormat, render_report, save_report};
use sitescout_core::session::{Decision, SessionOptions, SessionOutcome, execute_session};
use sitescout_scanner::crawler::CrawlConfig;
use sitescout_scanner::estimator::{EstimatorConfig, Prescan};
use sitescout_scanner::frontier::QueueOrder;
use sitescout_scanner::normalize::NormalizedUrl;
use sitescout_scanner::prober::ProbeConfig;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Settings loadable from `--config`. Command-line flags win over these.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub crawl: CrawlConfig,
    pub probe: ProbeConfig,
    pub estimator: EstimatorConfig,
}

pub fn load_config(path: &str) -> Result<ConfigFile, String> {
    let expanded = shellexpand::tilde(path);
    let path = PathBuf::from(expanded.as_ref());
    let content = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Invalid config file {}: {}", path.display(), e))
}

/// Parse the seed argument, assuming https:// when no scheme is given
pub fn parse_seed_arg(raw: &str) -> Result<NormalizedUrl, String> {
    NormalizedUrl::parse_seed(raw.trim()).map_err(|e| format!("Invalid URL '{}': {}", raw, e))
}

/// Everything `scan` needs, pulled out of the parsed arguments.
#[derive(Debug)]
pub struct ScanArgs {
    pub seed: NormalizedUrl,
    pub config: ConfigFile,
    pub probe: bool,
    pub preview_only: bool,
    pub assume_yes: bool,
    pub format: ReportFormat,
    pub output: Option<String>,
}

impl ScanArgs {
    pub fn from_matches(args: &ArgMatches) -> Result<Self, String> {
        let raw_url = args
            .get_one::<String>("url")
            .ok_or("--url must be provided")?;
        let seed = parse_seed_arg(raw_url)?;

        let mut config = match args.get_one::<String>("config") {
            Some(path) => load_config(path)?,
            None => ConfigFile::default(),
        };

        if let Some(max_pages) = args.get_one::<usize>("max-pages") {
            config.crawl.max_pages = *max_pages;
        }
        if let Some(max_depth) = args.get_one::<usize>("max-depth") {
            config.crawl.max_depth = Some(*max_depth);
        }
        if let Some(threads) = args.get_one::<usize>("threads") {
            config.crawl = config.crawl.with_workers(*threads);
        }
        if let Some(order) = args.get_one::<String>("order") {
            config.crawl.order = match order.as_str() {
                "fifo" => QueueOrder::Fifo,
                _ => QueueOrder::LatestFirst,
            };
        }
        if let Some(timeout) = args.get_one::<u64>("timeout") {
            config.crawl.fetch_timeout_secs = *timeout;
        }

        let format = args
            .get_one::<String>("format")
            .and_then(|f| ReportFormat::from_str(f))
            .unwrap_or(ReportFormat::Text);

        Ok(Self {
            seed,
            config,
            probe: !args.get_flag("no-probe"),
            preview_only: args.get_flag("preview-only"),
            assume_yes: args.get_flag("yes"),
            format,
            output: args.get_one::<String>("output").cloned(),
        })
    }

    pub fn session_options(&self, show_progress: bool) -> SessionOptions {
        SessionOptions {
            seed: self.seed.clone(),
            crawl: self.config.crawl.clone(),
            probe: self.probe.then(|| self.config.probe.clone()),
            estimator: self.config.estimator.clone(),
            show_progress,
        }
    }
}

/// Map a prompt answer to a decision. Anything unrecognised aborts.
pub fn decision_from_response(response: &str) -> Decision {
    match response.trim().to_lowercase().as_str() {
        "y" | "yes" => Decision::Proceed,
        "p" | "preview" => Decision::PreviewOnly,
        _ => Decision::Abort,
    }
}

pub fn print_banner() {
    println!(
        "{}",
        r#"
   _____ _ _                            _
  / ____(_) |                          | |
 | (___  _| |_ ___  ___  ___ ___  _   _| |_
  \___ \| | __/ _ \/ __|/ __/ _ \| | | | __|
  ____) | | ||  __/\__ \ (_| (_) | |_| | |_
 |_____/|_|\__\___||___/\___\___/ \__,_|\__|
"#
        .bright_cyan()
        .bold()
    );
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    let _ = io::stdout().flush();
    let mut response = String::new();
    if io::stdin().read_line(&mut response).is_err() {
        return String::new();
    }
    response.trim().to_lowercase()
}

fn print_estimate(prescan: &Prescan, max_pages: usize) {
    let estimate = &prescan.estimate;
    print_divider();
    println!("{}", "  PRESCAN".bright_white().bold());
    print_divider();
    println!(
        "{} Found {} URLs so far ({} first-level links, {}/{} samples fetched)",
        "→".blue(),
        estimate.sampled_url_count.to_string().cyan(),
        estimate.first_level_links,
        estimate.samples_succeeded,
        estimate.samples_attempted
    );
    println!(
        "{} Estimated total: ~{} URLs",
        "→".blue(),
        estimate.extrapolated_total.to_string().bright_white()
    );
    if estimate.exceeds(max_pages) {
        println!(
            "{} The site looks larger than the {} page budget. Only the latest {} URLs will be crawled.",
            "⚠".yellow().bold(),
            max_pages,
            max_pages
        );
    }
    println!();
}

pub async fn handle_scan(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let scan = ScanArgs::from_matches(args).map_err(anyhow::Error::msg)?;
    debug!("Scan settings: {:?}", scan.config);

    if !quiet {
        println!("\n🕷️  Mapping {}", scan.seed.to_string().bright_white());
        println!("Max pages: {}", scan.config.crawl.max_pages);
        match scan.config.crawl.max_depth {
            Some(depth) => println!("Max depth: {}", depth),
            None => println!("Max depth: unlimited"),
        }
        println!("Workers: {}", scan.config.crawl.workers);
        println!(
            "Subdomain probing: {}\n",
            if scan.probe { "enabled" } else { "disabled" }
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Interrupted, finishing in-flight requests...", "!".yellow().bold());
            ctrl_c_token.cancel();
        }
    });

    let max_pages = scan.config.crawl.max_pages;
    let (preview_only, assume_yes) = (scan.preview_only, scan.assume_yes);
    let outcome = execute_session(scan.session_options(!quiet), cancel, |prescan| {
        if !quiet {
            print_estimate(prescan, max_pages);
        }
        if preview_only {
            Decision::PreviewOnly
        } else if assume_yes {
            Decision::Proceed
        } else {
            decision_from_response(&print_prompt(
                "Proceed with the full crawl? [y]es / [N]o / [p]review only:",
            ))
        }
    })
    .await
    .context("Scan failed")?;

    let report = match outcome {
        SessionOutcome::Completed(report) | SessionOutcome::Preview(report) => report,
        SessionOutcome::Aborted(_) => {
            println!("{} Scan cancelled.", "✗".red().bold());
            return Ok(());
        }
    };

    if report.cancelled {
        println!(
            "{} Scan interrupted, reporting partial results",
            "⚠".yellow().bold()
        );
    } else if !quiet {
        println!("\n{} Scan complete!\n", "✓".green().bold());
    }

    let rendered = render_report(&report, scan.format).map_err(anyhow::Error::msg)?;
    match scan.output {
        Some(ref path) => {
            let written = save_report(&rendered, path).map_err(anyhow::Error::msg)?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                written.display().to_string().bright_white()
            );
        }
        None => print!("{}", rendered),
    }

    Ok(())
}
