use serde::Serialize;

use super::{rows_for_metal, yearly_means, NoData, Page, PageContext, PageView, Series, YearPoint};
use crate::color::SeriesColors;
use crate::data::aggregate::distribution_by;
use crate::data::filter::FilterSelection;
use crate::data::model::{Dimension, Measurement};
use crate::stats::Distribution;

/// One metal across every municipality in the filtered subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeavyMetalView {
    pub heavy_metal: String,
    pub ranking: Vec<MunicipalityRank>,
    pub evolution: Vec<Series>,
    pub overall_yearly: Vec<YearPoint>,
    pub land_use_stats: Vec<LandUseStats>,
    pub overall: Distribution,
    /// Municipality holding the single highest sample.
    pub highest_municipality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalityRank {
    pub municipality: String,
    #[serde(flatten)]
    pub stats: Distribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandUseStats {
    pub land_use: String,
    #[serde(flatten)]
    pub stats: Distribution,
}

pub(super) fn build(rows: &[&Measurement], selection: &FilterSelection, ctx: &PageContext<'_>) -> PageView {
    if rows.is_empty() {
        return PageView::NoData(NoData::for_filters(Page::HeavyMetalDetail, None));
    }
    let Some(metal) = selection.heavy_metal_detail.as_deref() else {
        return PageView::NoData(NoData::new(Page::HeavyMetalDetail, "Please select a heavy metal."));
    };

    let metal_rows = rows_for_metal(rows, metal);
    let values: Vec<f64> = metal_rows.iter().map(|m| m.concentration).collect();
    let Some(overall) = Distribution::from_values(&values) else {
        return PageView::NoData(NoData::new(
            Page::HeavyMetalDetail,
            format!("No data available for {metal}. Please select a different heavy metal."),
        ));
    };

    let mut ranking: Vec<MunicipalityRank> = distribution_by(&metal_rows, &[Dimension::Municipality])
        .into_iter()
        .map(|d| MunicipalityRank {
            municipality: d.key.first().map(|k| k.to_string()).unwrap_or_default(),
            stats: d.stats,
        })
        .collect();
    ranking.sort_by(|a, b| {
        b.stats
            .mean
            .total_cmp(&a.stats.mean)
            .then_with(|| a.municipality.cmp(&b.municipality))
    });
    ranking.truncate(ctx.settings.ranking_size);

    let colors = SeriesColors::new(&ctx.dataset.categories().municipalities);
    let evolution = ranking
        .iter()
        .take(ctx.settings.evolution_series)
        .map(|rank| {
            let muni_rows: Vec<&Measurement> = metal_rows
                .iter()
                .copied()
                .filter(|m| m.municipality == rank.municipality)
                .collect();
            Series {
                name: rank.municipality.clone(),
                color: colors.color_for(&rank.municipality),
                points: yearly_means(&muni_rows),
            }
        })
        .collect();

    let mut land_use_stats: Vec<LandUseStats> = distribution_by(&metal_rows, &[Dimension::LandUse])
        .into_iter()
        .map(|d| LandUseStats {
            land_use: d.key.first().map(|k| k.to_string()).unwrap_or_default(),
            stats: d.stats,
        })
        .collect();
    land_use_stats.sort_by(|a, b| a.land_use.cmp(&b.land_use));

    // First occurrence wins on ties
    let highest_municipality = metal_rows
        .iter()
        .copied()
        .fold(None::<&Measurement>, |best, m| match best {
            Some(b) if b.concentration >= m.concentration => Some(b),
            _ => Some(m),
        })
        .map(|m| m.municipality.clone())
        .unwrap_or_default();

    PageView::HeavyMetalDetail(HeavyMetalView {
        heavy_metal: metal.to_string(),
        ranking,
        evolution,
        overall_yearly: yearly_means(&metal_rows),
        land_use_stats,
        overall,
        highest_municipality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartSettings;
    use crate::data::model::Dataset;
    use crate::views::{build as build_page, fixtures};

    fn view_for(ds: &Dataset, settings: &ChartSettings, sel: &mut FilterSelection) -> PageView {
        let ctx = PageContext {
            dataset: ds,
            settings,
            geocoded: None,
        };
        build_page(Page::HeavyMetalDetail, &ctx, sel)
    }

    #[test]
    fn test_lead_detail() {
        let ds = fixtures::dataset();
        let settings = ChartSettings {
            ranking_size: 3,
            evolution_series: 2,
            ..ChartSettings::default()
        };
        let mut sel = FilterSelection::unfiltered(ds.categories());
        sel.heavy_metal_detail = Some("Lead".to_string());

        let PageView::HeavyMetalDetail(view) = view_for(&ds, &settings, &mut sel) else {
            panic!("expected heavy metal view");
        };
        assert_eq!(view.heavy_metal, "Lead");
        assert_eq!(view.ranking.len(), 3);
        assert_eq!(view.ranking[0].municipality, "Basel");
        assert_eq!(view.ranking[0].stats.count, 3);
        assert_eq!(view.evolution.len(), 2);
        assert_eq!(view.evolution[0].points.len(), 3);
        assert_eq!(view.overall.count, 15);
        assert_eq!(view.overall_yearly.len(), 3);
        assert_eq!(view.highest_municipality, "Basel");

        let land_uses: Vec<&str> = view.land_use_stats.iter().map(|s| s.land_use.as_str()).collect();
        assert_eq!(land_uses, vec!["Agricultural", "Forest", "Urban"]);
    }

    #[test]
    fn test_detail_defaults_to_first_metal() {
        let ds = fixtures::dataset();
        let settings = ChartSettings::default();
        let mut sel = FilterSelection::unfiltered(ds.categories());

        let view = view_for(&ds, &settings, &mut sel);
        assert_eq!(sel.heavy_metal_detail.as_deref(), Some("Cadmium"));
        assert!(!view.is_empty());
    }

    #[test]
    fn test_metal_missing_from_subset() {
        let ds = fixtures::dataset();
        let settings = ChartSettings::default();
        let mut sel = FilterSelection::unfiltered(ds.categories());
        sel.municipalities.insert("Bern".to_string());
        sel.heavy_metal_detail = Some("Zinc".to_string());

        let PageView::NoData(empty) = view_for(&ds, &settings, &mut sel) else {
            panic!("expected no-data view");
        };
        assert!(empty.message.contains("Zinc"));
    }

    #[test]
    fn test_detail_ignores_metal_multiselect() {
        let ds = fixtures::dataset();
        let settings = ChartSettings::default();
        let params = crate::query::QueryParams::parse("heavy_metals=Cadmium&selected_heavy_metal_detail=Lead");
        let mut sel = crate::query::decode(&params, ds.categories());

        let PageView::HeavyMetalDetail(view) = view_for(&ds, &settings, &mut sel) else {
            panic!("expected heavy metal view");
        };
        assert_eq!(view.heavy_metal, "Lead");
        assert_eq!(view.overall.count, 15);
        assert!(sel.heavy_metals.is_empty());
    }

    #[test]
    fn test_highest_keeps_first_on_tie() {
        let ds = Dataset::from_records(vec![
            Measurement::new("Bern", "Lead", "Urban", 2000, 5.0),
            Measurement::new("Aarau", "Lead", "Urban", 2001, 5.0),
        ]);
        let settings = ChartSettings::default();
        let mut sel = FilterSelection::unfiltered(ds.categories());

        let PageView::HeavyMetalDetail(view) = view_for(&ds, &settings, &mut sel) else {
            panic!("expected heavy metal view");
        };
        assert_eq!(view.highest_municipality, "Bern");
        // Equal means rank by name
        assert_eq!(view.ranking[0].municipality, "Aarau");
        assert_eq!(view.overall.std, Some(0.0));
    }
}
