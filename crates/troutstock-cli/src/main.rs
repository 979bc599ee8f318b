use std::fs;
use std::path::PathBuf;
use std::process;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use troutstock::table::TableBackend;
use troutstock::utils::{EventFilter, StockingStats, group_by_water_body};
use troutstock::{DateRange, ScraperConfig, StockingEvent, WebScraper};

#[derive(Parser)]
#[command(name = "troutstock")]
#[command(about = "A Virginia DWR trout stocking schedule scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Scan tables with regular expressions instead of a DOM parser"
    )]
    regex_backend: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string())
}

#[derive(Subcommand)]
enum Commands {
    /// List stocking events with optional filtering and pagination
    List {
        #[arg(
            long,
            help = "Maximum number of results to return",
            value_parser = clap::value_parser!(u16).range(1..)
        )]
        limit: Option<u16>,

        #[arg(
            long,
            help = "Number of results to skip from the beginning",
            value_parser = clap::value_parser!(u16).range(1..)
        )]
        offset: Option<u16>,

        #[arg(
            long,
            value_name = "YYYY-MM-DD",
            help = "Show stockings from this date onwards",
            value_parser = parse_date,
        )]
        start_date: Option<NaiveDate>,

        #[arg(
            long,
            value_name = "YYYY-MM-DD",
            help = "Show stockings up to this date",
            value_parser = parse_date,
        )]
        end_date: Option<NaiveDate>,

        #[arg(long, help = "Filter by county")]
        county: Option<String>,

        #[arg(long, help = "Filter by species, e.g. 'rainbow'")]
        species: Option<String>,

        #[arg(long, help = "Filter by water body name")]
        water_body: Option<String>,

        #[arg(long, help = "Request the full history instead of the recent window")]
        backfill: bool,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Group stocking events by water body
    Group {
        #[arg(
            long,
            value_name = "YYYY-MM-DD",
            help = "Show stockings from this date onwards",
            value_parser = parse_date,
        )]
        start_date: Option<NaiveDate>,

        #[arg(
            long,
            value_name = "YYYY-MM-DD",
            help = "Show stockings up to this date",
            value_parser = parse_date,
        )]
        end_date: Option<NaiveDate>,

        #[arg(long, help = "Request the full history instead of the recent window")]
        backfill: bool,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Extract stocking events from a saved copy of the schedule page
    Parse {
        #[arg(help = "Path to the saved HTML page")]
        file: PathBuf,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn print_events(events: &[StockingEvent], format: OutputFormat) {
    match format {
        OutputFormat::Json => serialize_json(&events),
        OutputFormat::Text => {
            if events.is_empty() {
                println!("No stocking events found.");
            } else {
                for (i, event) in events.iter().enumerate() {
                    println!("{:>3}. {}", i + 1, event);
                }
                print!("{}", StockingStats::from_events(events));
            }
        }
    }
}

/// The window to request from the page: the full history, the user's own
/// bounds, or the recent window by default.
/// The window to request from the schedule page. Missing bounds come from
/// the recent window, stretched so they never cut off an explicit bound.
fn request_range(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    backfill: bool,
    today: NaiveDate,
) -> DateRange {
    if backfill {
        return DateRange::backfill(today);
    }

    let recent = DateRange::recent(today);
    let start = start_date
        .unwrap_or_else(|| end_date.map_or(recent.start(), |end| end.min(recent.start())));
    let end = end_date.unwrap_or_else(|| recent.end().max(start));
    DateRange::new(start, end).unwrap_or_else(|e| {
        log::warn!("{e}, requesting the recent window instead");
        recent
    })
}

async fn scrape(
    scraper: &WebScraper,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    backfill: bool,
) -> Vec<StockingEvent> {
    let range = request_range(start_date, end_date, backfill, Local::now().date_naive());
    let events = scraper.scrape(Some(range)).await.unwrap_or_else(|e| {
        log::error!("Error fetching stocking schedule: {}", e);
        process::exit(1);
    });

    if events.is_empty() {
        log::warn!("The schedule page had no stocking events");
    }
    events
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let backend = if cli.regex_backend {
        TableBackend::Regex
    } else {
        TableBackend::Dom
    };

    let scraper = WebScraper::with_config(ScraperConfig {
        backend,
        ..Default::default()
    })
    .unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    match cli.command {
        Commands::List {
            limit,
            offset,
            start_date,
            end_date,
            county,
            species,
            water_body,
            backfill,
            format,
        } => {
            let filter = EventFilter {
                start_date,
                end_date,
                county,
                species,
                water_body,
                limit: limit.map(usize::from),
                offset: offset.map(usize::from),
            };

            let filter = filter.validate().unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            let events = scrape(&scraper, start_date, end_date, backfill).await;
            print_events(&filter.apply(events), format);
        }

        Commands::Group {
            start_date,
            end_date,
            backfill,
            format,
        } => {
            let filter = EventFilter {
                start_date,
                end_date,
                ..Default::default()
            }
            .validate()
            .unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            let events = filter.apply(scrape(&scraper, start_date, end_date, backfill).await);
            let groups = group_by_water_body(&events);

            match format {
                OutputFormat::Json => serialize_json(&groups),
                OutputFormat::Text => {
                    if groups.is_empty() {
                        println!("No stocking events found.");
                    }
                    for (water_body, events) in &groups {
                        println!("{} ({} stocking(s))", water_body, events.len());
                        for event in events {
                            println!("   {} · {}", event.date.date_naive(), event.species);
                        }
                    }
                }
            }
        }

        Commands::Parse { file, format } => {
            log::info!("Parsing saved schedule page {}...", file.display());

            let html = fs::read_to_string(&file).unwrap_or_else(|e| {
                log::error!("Error reading {}: {}", file.display(), e);
                process::exit(1);
            });

            print_events(&scraper.scrape_html(&html), format);
        }
    }
}
