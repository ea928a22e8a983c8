use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cityzen::config::ConfigArgs;
use cityzen::explorer::{render_summary, CityExplorer};
use cityzen::hours::{self, WeeklyHours};
use cityzen::{logging, server};
use clap::{Parser, Subcommand};
use std::process::ExitCode;

/// CityZen: top-rated places, weather and live opening status for any city.
///
/// Settings come from flags, the environment, or a .env file
/// (WEATHER_API_KEY, PLACES_API_KEY, CITYZEN_CACHE_DIR, ...).
///
/// Examples:
///   cityzen search Lisbon
///   cityzen search "New York" --places-limit 5
///   cityzen status --hours "Monday: 9:00 AM – 5:00 PM" --tz Europe/Paris
///   cityzen serve --port 8080
///   cityzen refresh
#[derive(Parser)]
#[command(name = "cityzen", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Top places and current weather for a city or country (JSON on stdout).
    Search {
        /// City or country, e.g. Lisbon or "New York".
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Evaluate weekly opening hours at an instant.
    Status {
        /// One "<Weekday>: <hours>" line; repeat for each day.
        #[arg(long = "hours", required = true)]
        hours: Vec<String>,

        /// Instant to evaluate (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<String>,

        /// IANA timezone to read the hours in (e.g. Europe/Paris). Defaults to UTC.
        #[arg(long)]
        tz: Option<String>,
    },

    /// Run one cache eviction and status refresh pass.
    Refresh {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Serve the HTTP API with the periodic refresh job.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing(&cli.log_level) {
        eprintln!("Warning: {}", e);
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Search { query, config } => {
            let config = config.validate()?;
            let mut explorer = CityExplorer::from_config(&config);
            let report = explorer.search(&query.join(" "))?;

            // Summary to stderr, JSON to stdout
            eprint!("{}", render_summary(&report));
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Status { hours: lines, at, tz } => {
            let weekly = WeeklyHours::new(lines);
            let at: DateTime<Utc> = match at {
                Some(s) => DateTime::parse_from_rfc3339(&s)
                    .with_context(|| format!("Invalid instant '{}'", s))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            let status = match tz {
                Some(id) => {
                    let tz: Tz = id.parse().map_err(|_| {
                        anyhow!("Unknown timezone '{}'. Use IANA format (e.g. Europe/Paris).", id)
                    })?;
                    hours::resolve(Some(&weekly), &at.with_timezone(&tz))
                }
                None => hours::resolve(Some(&weekly), &at),
            };
            println!("{}", status);
        }

        Command::Refresh { mut config } => {
            // Eviction and recomputation never call upstream.
            config.offline = true;
            let config = config.validate()?;
            let mut explorer = CityExplorer::from_config(&config);
            println!("{}", explorer.refresh(Utc::now()));
        }

        Command::Serve { host, port, config } => {
            let config = config.validate()?;
            let runtime = tokio::runtime::Runtime::new().context("could not start async runtime")?;
            runtime
                .block_on(server::start(&config, &host, port))
                .with_context(|| format!("server on {}:{} failed", host, port))?;
        }
    }
    Ok(())
}
