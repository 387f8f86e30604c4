use clap::Parser;
use quasar::core::config::{self, CliOverrides};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quasar", about = "Terminal dashboard for a simulation agent worker")]
struct Args {
    /// Worker command line (overrides QUASAR_WORKER and the config file)
    #[arg(short, long)]
    worker: Option<String>,

    /// Workspace root shared with the worker
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Run one prompt without the TUI and print the transcript to stdout
    #[arg(short, long)]
    prompt: Option<String>,

    /// Resume from the saved checkpoint without asking
    #[arg(long)]
    auto_restart: bool,

    /// Log level written to quasar.log
    #[arg(long, default_value_t = LevelFilter::Debug)]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to quasar.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    if let Ok(log_file) = File::create("quasar.log") {
        let _ = WriteLogger::init(args.log_level, log_config, log_file);
    }

    let file_config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("quasar: {e}");
            std::process::exit(1);
        }
    };
    let resolved = config::resolve(
        &file_config,
        &CliOverrides {
            worker: args.worker,
            workspace: args.workspace,
            auto_restart: args.auto_restart,
        },
    );

    log::info!(
        "Quasar starting with worker: {} {}",
        resolved.worker.program,
        resolved.worker.args.join(" ")
    );

    let code = match args.prompt {
        Some(prompt) => quasar::headless::run(&resolved, prompt)?,
        None => quasar::tui::run(&resolved)?,
    };
    std::process::exit(code);
}
