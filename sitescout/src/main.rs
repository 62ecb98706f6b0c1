use colored::Colorize;
use sitescout::command_argument_builder;
use sitescout::handlers::{handle_scan, print_banner};
use tracing::Level;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    match chosen_command.subcommand() {
        Some(("scan", primary_command)) => {
            if let Err(e) = handle_scan(primary_command, quiet).await {
                eprintln!("{} {:#}", "✗".red().bold(), e);
                std::process::exit(1);
            }
        }
        None => {}
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
