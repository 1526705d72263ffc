use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use soil_dashboard::config::DashboardConfig;
use soil_dashboard::data::geocoded::{load_geocoded, GeocodedTable};
use soil_dashboard::data::shared;
use soil_dashboard::query::{self, QueryParams};
use soil_dashboard::views::{self, Page, PageContext};

#[derive(Parser, Debug)]
#[command(author, version, about = "Swiss soil heavy-metal dashboard core")]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Measurement table (.csv, .json or .parquet)
    #[arg(long)]
    data: Option<PathBuf>,
    /// Geocoded municipalities CSV
    #[arg(long)]
    geocoded: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = PageArg::Overview)]
    page: PageArg,
    /// Shareable query string, e.g. "municipalities=Zurich&year_range=1990,2000"
    #[arg(long, default_value = "")]
    query: String,
    /// Print single-line JSON
    #[arg(long)]
    compact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PageArg {
    Overview,
    Municipality,
    HeavyMetal,
    Map,
    Categories,
}

impl PageArg {
    fn page(self) -> Option<Page> {
        match self {
            PageArg::Overview => Some(Page::Overview),
            PageArg::Municipality => Some(Page::MunicipalityDetail),
            PageArg::HeavyMetal => Some(Page::HeavyMetalDetail),
            PageArg::Map => Some(Page::Map),
            PageArg::Categories => None,
        }
    }
}

#[derive(Serialize)]
struct Output<'a, T: Serialize> {
    query: String,
    view: &'a T,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config =
        DashboardConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(data) = args.data {
        config.data_path = data;
    }
    if let Some(geocoded) = args.geocoded {
        config.geocoded_path = geocoded;
    }

    let dataset = shared::init(&config)
        .with_context(|| format!("Failed to load {}", config.data_path.display()))?;

    let params = QueryParams::parse(&args.query);
    let (mut selection, report) = query::decode_with_report(&params, dataset.categories());
    if !report.is_clean() {
        log::info!(
            "Query reconciled: {} value(s) dropped, year range reset: {}",
            report.dropped.len(),
            report.year_range_reset
        );
    }

    let json = match args.page.page() {
        None => {
            let output = Output {
                query: QueryParams::from(query::encode(&selection)).to_query_string(),
                view: dataset.categories(),
            };
            to_json(&output, args.compact)?
        }
        Some(page) => {
            let geocoded = if page == Page::Map {
                load_optional_geocoded(&config)
            } else {
                None
            };
            let ctx = PageContext {
                dataset,
                settings: &config.charts,
                geocoded: geocoded.as_ref(),
            };
            let view = views::build(page, &ctx, &mut selection);
            let output = Output {
                query: QueryParams::from(query::encode(&selection)).to_query_string(),
                view: &view,
            };
            to_json(&output, args.compact)?
        }
    };

    println!("{json}");
    Ok(())
}

/// The map page degrades to a no-data view when coordinates are missing.
fn load_optional_geocoded(config: &DashboardConfig) -> Option<GeocodedTable> {
    match load_geocoded(&config.geocoded_path) {
        Ok(table) => Some(table),
        Err(e) => {
            log::warn!("Geocoded municipalities unavailable: {e}");
            None
        }
    }
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    json.context("Failed to serialise output")
}
