use serde::Serialize;

use super::{
    land_use_means, rows_for_metal, yearly_means, CategoryMean, NoData, Page, PageContext,
    PageView, Series, SidebarSummary, YearPoint,
};
use crate::color::SeriesColors;
use crate::data::aggregate::{aggregate, summarize};
use crate::data::filter::FilterSelection;
use crate::data::model::{Dimension, DimensionValue, Measurement};

/// High-level exploration across all municipalities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewView {
    pub summary: SidebarSummary,
    pub top_municipalities: Vec<MetalRanking>,
    pub time_series: Vec<MetalTimeSeries>,
    pub land_use_breakdown: Vec<CategoryMean>,
    /// (metal, colour) for the selected metals, shared by every chart.
    pub legend: Vec<(String, String)>,
}

/// Bar chart: highest-mean municipalities for one metal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetalRanking {
    pub heavy_metal: String,
    pub color: String,
    pub bars: Vec<RankedMean>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMean {
    pub municipality: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Line chart: per-municipality yearly means against the national mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetalTimeSeries {
    pub heavy_metal: String,
    pub municipalities: Vec<Series>,
    pub national_average: Vec<YearPoint>,
}

pub(super) fn build(rows: &[&Measurement], selection: &FilterSelection, ctx: &PageContext<'_>) -> PageView {
    if rows.is_empty() {
        return PageView::NoData(NoData::for_filters(Page::Overview, None));
    }

    let categories = ctx.dataset.categories();
    let metal_colors = SeriesColors::new(&categories.heavy_metals);
    let municipality_colors = SeriesColors::new(&categories.municipalities);
    let settings = ctx.settings;

    // Top municipalities, one chart per selected metal
    let averages = aggregate(rows, &[Dimension::Municipality, Dimension::HeavyMetal]);
    let top_municipalities = selection
        .heavy_metals
        .iter()
        .filter_map(|metal| {
            let top = averages
                .filter_key(Dimension::HeavyMetal, &DimensionValue::from(metal.as_str()))
                .top_n(settings.top_municipalities);
            if top.is_empty() {
                return None;
            }
            let bars = top
                .iter()
                .map(|g| RankedMean {
                    municipality: g.key[0].to_string(),
                    mean: g.mean,
                    min: g.min,
                    max: g.max,
                    count: g.count,
                })
                .collect();
            Some(MetalRanking {
                heavy_metal: metal.clone(),
                color: metal_colors.color_for(metal),
                bars,
            })
        })
        .collect();

    let time_series = selection
        .heavy_metals
        .iter()
        .filter_map(|metal| {
            let metal_rows = rows_for_metal(rows, metal);
            if metal_rows.is_empty() {
                return None;
            }
            Some(MetalTimeSeries {
                heavy_metal: metal.clone(),
                municipalities: municipality_lines(&metal_rows, settings.time_series_municipalities, &municipality_colors),
                national_average: yearly_means(&metal_rows),
            })
        })
        .collect();

    let legend = metal_colors
        .legend_entries()
        .into_iter()
        .filter(|(metal, _)| selection.heavy_metals.contains(metal))
        .collect();

    PageView::Overview(OverviewView {
        summary: SidebarSummary {
            data: summarize(rows),
            selected_years: selection.year_range,
        },
        top_municipalities,
        time_series,
        land_use_breakdown: land_use_means(rows),
        legend,
    })
}

/// Yearly mean lines for the first `limit` municipalities, ordered by the
/// earliest year they were sampled, then by name.
fn municipality_lines(metal_rows: &[&Measurement], limit: usize, colors: &SeriesColors) -> Vec<Series> {
    let yearly = aggregate(metal_rows, &[Dimension::Year, Dimension::Municipality]).sorted_by_key();

    let mut names: Vec<String> = Vec::new();
    for g in yearly.iter() {
        let name = g.key[1].to_string();
        if names.len() >= limit {
            break;
        }
        if !names.contains(&name) {
            names.push(name);
        }
    }

    names
        .into_iter()
        .map(|name| {
            let points = yearly
                .iter()
                .filter(|g| g.key[1].as_text() == Some(name.as_str()))
                .filter_map(|g| g.key[0].as_year().map(|year| YearPoint { year, mean: g.mean }))
                .collect();
            Series {
                color: colors.color_for(&name),
                name,
                points,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartSettings;
    use crate::views::{build as build_page, fixtures};

    #[test]
    fn test_overview_with_default_metals() {
        let ds = fixtures::dataset();
        let settings = ChartSettings {
            top_municipalities: 3,
            time_series_municipalities: 3,
            ..ChartSettings::default()
        };
        let ctx = PageContext {
            dataset: &ds,
            settings: &settings,
            geocoded: None,
        };
        let mut sel = FilterSelection::unfiltered(ds.categories());

        let PageView::Overview(view) = build_page(Page::Overview, &ctx, &mut sel) else {
            panic!("expected overview");
        };

        // Cadmium, Lead, Zinc are the three default metals
        assert_eq!(view.top_municipalities.len(), 3);
        let cadmium = &view.top_municipalities[0];
        assert_eq!(cadmium.heavy_metal, "Cadmium");
        let names: Vec<&str> = cadmium.bars.iter().map(|b| b.municipality.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(names[0], "Basel");
        assert!(!names.contains(&"Bern"));
        let zurich = cadmium.bars.iter().find(|b| b.municipality == "Zurich");
        assert_eq!(zurich.map(|b| b.count), Some(6));

        let lead = &view.time_series[1];
        assert_eq!(lead.heavy_metal, "Lead");
        let lines: Vec<&str> = lead.municipalities.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(lines, vec!["Aarau", "Basel", "Bern"]);
        assert_eq!(lead.national_average.len(), 3);
        assert_eq!(lead.municipalities[0].points.len(), 3);

        assert_eq!(view.summary.data.total_records, ds.len());
        assert!(!view.land_use_breakdown.is_empty());

        let legend: Vec<&str> = view.legend.iter().map(|(metal, _)| metal.as_str()).collect();
        assert_eq!(legend, vec!["Cadmium", "Lead", "Zinc"]);
        assert_eq!(view.legend[0].1, cadmium.color);
    }

    #[test]
    fn test_metal_without_rows_is_skipped() {
        let ds = fixtures::dataset();
        let settings = ChartSettings::default();
        let ctx = PageContext {
            dataset: &ds,
            settings: &settings,
            geocoded: None,
        };
        let mut sel = FilterSelection::unfiltered(ds.categories());
        sel.heavy_metals.insert("Cadmium".to_string());
        sel.heavy_metals.insert("Zinc".to_string());
        sel.year_range.max = 2000;

        let PageView::Overview(view) = build_page(Page::Overview, &ctx, &mut sel) else {
            panic!("expected overview");
        };
        assert_eq!(view.top_municipalities.len(), 1);
        assert_eq!(view.time_series.len(), 1);
        assert_eq!(view.time_series[0].heavy_metal, "Cadmium");
        // Zinc has no rows here but stays in the legend
        let legend: Vec<&str> = view.legend.iter().map(|(metal, _)| metal.as_str()).collect();
        assert_eq!(legend, vec!["Cadmium", "Zinc"]);
    }
}
