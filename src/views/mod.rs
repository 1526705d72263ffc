//! Page view models handed to the presentation layer.
//!
//! Each page filters, aggregates and packages the result into serialisable
//! structs. Nothing here renders; an empty subset becomes an explicit
//! [`NoData`] view instead of an empty chart.

pub mod heavy_metal;
pub mod map;
pub mod municipality;
pub mod overview;

use std::fmt;

use serde::Serialize;

use crate::config::ChartSettings;
use crate::data::aggregate::{aggregate, DataSummary};
use crate::data::filter::{apply, FilterSelection};
use crate::data::geocoded::GeocodedTable;
use crate::data::model::{Categories, Dataset, Dimension, Measurement, YearRange};

pub use heavy_metal::HeavyMetalView;
pub use map::MapView;
pub use municipality::MunicipalityView;
pub use overview::OverviewView;

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Overview,
    MunicipalityDetail,
    HeavyMetalDetail,
    Map,
}

impl Page {
    pub fn title(&self) -> &'static str {
        match self {
            Page::Overview => "Overview Dashboard",
            Page::MunicipalityDetail => "Municipality Detail",
            Page::HeavyMetalDetail => "Heavy Metal Detail",
            Page::Map => "Geographic Distribution",
        }
    }

    /// Fill in the selections a page needs when the user has not made them.
    pub fn apply_defaults(
        &self,
        selection: &mut FilterSelection,
        categories: &Categories,
        settings: &ChartSettings,
    ) {
        let first_metals = || {
            categories
                .heavy_metals
                .iter()
                .take(settings.default_metal_count)
                .cloned()
                .collect()
        };

        match self {
            Page::Overview => {
                if selection.heavy_metals.is_empty() {
                    selection.heavy_metals = first_metals();
                }
            }
            Page::MunicipalityDetail => {
                if selection.heavy_metals.is_empty() {
                    selection.heavy_metals = first_metals();
                }
                if selection.municipalities.is_empty() {
                    if let Some(first) = categories.municipalities.iter().next() {
                        selection.municipalities.insert(first.clone());
                    }
                }
            }
            Page::HeavyMetalDetail => {
                // The detail metal replaces the metal multi-select on this page
                selection.heavy_metals.clear();
                if selection.heavy_metal_detail.is_none() {
                    selection.heavy_metal_detail = categories.heavy_metals.iter().next().cloned();
                }
            }
            Page::Map => {}
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Explicit "nothing to show" state for a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoData {
    pub page: Page,
    pub message: String,
}

impl NoData {
    pub fn new(page: Page, message: impl Into<String>) -> Self {
        NoData {
            page,
            message: message.into(),
        }
    }

    /// The standard message for a filter combination with no rows.
    pub fn for_filters(page: Page, context: Option<&str>) -> Self {
        let context = context.map(|c| format!(" for {c}")).unwrap_or_default();
        NoData::new(
            page,
            format!("No data available for the selected filters{context}. Please adjust your selection."),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageView {
    Overview(OverviewView),
    MunicipalityDetail(MunicipalityView),
    HeavyMetalDetail(HeavyMetalView),
    Map(MapView),
    NoData(NoData),
}

impl PageView {
    pub fn is_empty(&self) -> bool {
        matches!(self, PageView::NoData(_))
    }
}

/// Everything a page build needs besides the selection.
pub struct PageContext<'a> {
    pub dataset: &'a Dataset,
    pub settings: &'a ChartSettings,
    pub geocoded: Option<&'a GeocodedTable>,
}

/// Apply `page`'s defaults to `selection`, filter, and build the page view.
pub fn build(page: Page, ctx: &PageContext<'_>, selection: &mut FilterSelection) -> PageView {
    page.apply_defaults(selection, ctx.dataset.categories(), ctx.settings);
    let rows = apply(ctx.dataset, selection);
    log::debug!("Building {page} from {} of {} rows", rows.len(), ctx.dataset.len());

    match page {
        Page::Overview => overview::build(&rows, selection, ctx),
        Page::MunicipalityDetail => municipality::build(&rows, selection, ctx),
        Page::HeavyMetalDetail => heavy_metal::build(&rows, selection, ctx),
        Page::Map => map::build(&rows, selection, ctx),
    }
}

// ---------------------------------------------------------------------------
// Shared chart building blocks
// ---------------------------------------------------------------------------

/// Sidebar summary of the filtered subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidebarSummary {
    #[serde(flatten)]
    pub data: DataSummary,
    pub selected_years: YearRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearPoint {
    pub year: i32,
    pub mean: f64,
}

/// One line in a time-series chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub color: String,
    pub points: Vec<YearPoint>,
}

/// Mean concentration per year, ascending by year.
pub fn yearly_means(rows: &[&Measurement]) -> Vec<YearPoint> {
    aggregate(rows, &[Dimension::Year])
        .sorted_by_key()
        .iter()
        .filter_map(|g| {
            g.key.first().and_then(|k| k.as_year()).map(|year| YearPoint {
                year,
                mean: g.mean,
            })
        })
        .collect()
}

/// Mean concentration for one (heavy metal, land use) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMean {
    pub heavy_metal: String,
    pub land_use: String,
    pub mean: f64,
}

/// Mean per (heavy metal, land use), sorted by metal then land use.
pub fn land_use_means(rows: &[&Measurement]) -> Vec<CategoryMean> {
    aggregate(rows, &[Dimension::HeavyMetal, Dimension::LandUse])
        .sorted_by_key()
        .iter()
        .filter_map(|g| match g.key.as_slice() {
            [metal, land_use] => Some(CategoryMean {
                heavy_metal: metal.to_string(),
                land_use: land_use.to_string(),
                mean: g.mean,
            }),
            _ => None,
        })
        .collect()
}

/// Rows of `rows` measuring `metal`.
pub fn rows_for_metal<'a>(rows: &[&'a Measurement], metal: &str) -> Vec<&'a Measurement> {
    rows.iter().copied().filter(|m| m.heavy_metal == metal).collect()
}
