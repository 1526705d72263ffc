use serde::Serialize;

use super::{
    land_use_means, rows_for_metal, yearly_means, CategoryMean, NoData, Page, PageContext,
    PageView, Series, YearPoint,
};
use crate::color::SeriesColors;
use crate::data::aggregate::distribution_by;
use crate::data::filter::FilterSelection;
use crate::data::model::{Dimension, Measurement};
use crate::stats::Distribution;

const SELECT_PROMPT: &str =
    "Please select at least one municipality from the sidebar to view detailed analysis.";

/// Deep dive into one or more selected municipalities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalityView {
    pub municipalities: Vec<String>,
    /// One line per (municipality, metal).
    pub time_series: Vec<Series>,
    pub national_comparison: Vec<NationalComparison>,
    pub land_use_profile: Vec<CategoryMean>,
    pub summary_table: Vec<SummaryRow>,
}

/// Selection's yearly mean for one metal beside the nationwide yearly mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationalComparison {
    pub heavy_metal: String,
    pub color: String,
    pub selection: Vec<YearPoint>,
    pub national: Vec<YearPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub heavy_metal: String,
    pub land_use: String,
    #[serde(flatten)]
    pub stats: Distribution,
}

pub(super) fn build(rows: &[&Measurement], selection: &FilterSelection, ctx: &PageContext<'_>) -> PageView {
    if selection.municipalities.is_empty() {
        return PageView::NoData(NoData::new(Page::MunicipalityDetail, SELECT_PROMPT));
    }
    if rows.is_empty() {
        return PageView::NoData(NoData::for_filters(Page::MunicipalityDetail, None));
    }

    let categories = ctx.dataset.categories();
    let metal_colors = SeriesColors::new(&categories.heavy_metals);
    let line_colors = SeriesColors::new(&categories.municipalities);

    let mut time_series = Vec::new();
    for municipality in &selection.municipalities {
        let muni_rows: Vec<&Measurement> = rows
            .iter()
            .copied()
            .filter(|m| &m.municipality == municipality)
            .collect();
        for metal in &selection.heavy_metals {
            let points = yearly_means(&rows_for_metal(&muni_rows, metal));
            if points.is_empty() {
                continue;
            }
            time_series.push(Series {
                name: format!("{municipality} - {metal}"),
                color: line_colors.color_for(municipality),
                points,
            });
        }
    }

    // The national mean covers the whole dataset, not just the filtered subset
    let all_rows: Vec<&Measurement> = ctx.dataset.records().iter().collect();
    let national_comparison = selection
        .heavy_metals
        .iter()
        .filter_map(|metal| {
            let selected = yearly_means(&rows_for_metal(rows, metal));
            if selected.is_empty() {
                return None;
            }
            Some(NationalComparison {
                heavy_metal: metal.clone(),
                color: metal_colors.color_for(metal),
                selection: selected,
                national: yearly_means(&rows_for_metal(&all_rows, metal)),
            })
        })
        .collect();

    let mut summary_table: Vec<SummaryRow> = distribution_by(rows, &[Dimension::HeavyMetal, Dimension::LandUse])
        .into_iter()
        .filter_map(|d| match d.key.as_slice() {
            [metal, land_use] => Some(SummaryRow {
                heavy_metal: metal.to_string(),
                land_use: land_use.to_string(),
                stats: d.stats,
            }),
            _ => None,
        })
        .collect();
    summary_table.sort_by(|a, b| (&a.heavy_metal, &a.land_use).cmp(&(&b.heavy_metal, &b.land_use)));

    PageView::MunicipalityDetail(MunicipalityView {
        municipalities: selection.municipalities.iter().cloned().collect(),
        time_series,
        national_comparison,
        land_use_profile: land_use_means(rows),
        summary_table,
    })
}
