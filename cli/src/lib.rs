use clap::Parser;

mod commands;

/// Keep REPLICA in sync with SOURCE, checking again every INTERVAL seconds.
///
/// Files are copied or overwritten from SOURCE to REPLICA; entries missing
/// from SOURCE are deleted from REPLICA. Every operation is logged to
/// LOG_FILE and to stdout.
#[derive(Parser, Debug)]
#[command(name = "rust-mirrorsync")]
#[command(version, about = "One-way periodic directory mirroring", long_about)]
pub struct Cli {
    /// Source directory, treated as ground truth
    pub source: String,

    /// Replica directory, the only tree ever modified
    pub replica: String,

    /// Sync interval in seconds (fractions allowed)
    #[arg(value_parser = parse_interval)]
    pub interval: f64,

    /// Log file, appended to
    pub log_file: String,

    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

/// 校验同步间隔：必须能换算成非零的 Duration
fn parse_interval(value: &str) -> Result<f64, String> {
    let interval: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    app::sync::interval_from_secs(interval)
        .map(|_| interval)
        .map_err(|e| format!("invalid interval: {}", e))
}

pub async fn cli_match() -> utils::error::Result<()> {
    let cli = Cli::parse();

    commands::sync_cmd(cli).await
}
