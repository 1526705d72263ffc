use std::collections::BTreeMap;

use serde::Serialize;

use super::{NoData, Page, PageContext, PageView};
use crate::color::ConcentrationBand;
use crate::data::aggregate::{aggregate, GroupSummary};
use crate::data::filter::FilterSelection;
use crate::data::geocoded::GeoPoint;
use crate::data::model::{Dimension, Measurement};

const MIN_RADIUS: f64 = 8.0;
const RADIUS_SPAN: f64 = 15.0;
const FLAT_RADIUS: f64 = 15.0;

/// Geographic distribution of one metal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub heavy_metal: String,
    pub metrics: MapMetrics,
    pub markers: Vec<MapMarker>,
    pub legend: Vec<LegendEntry>,
    pub highest: Vec<MunicipalityAverage>,
    pub lowest: Vec<MunicipalityAverage>,
}

/// Headline numbers over every geocoded sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapMetrics {
    pub municipalities: usize,
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub municipality: String,
    #[serde(flatten)]
    pub location: GeoPoint,
    pub year: i32,
    pub concentration: f64,
    /// Distinct land uses behind this marker, comma separated.
    pub land_uses: String,
    pub band: ConcentrationBand,
    pub color: &'static str,
    pub radius: f64,
    /// Every sample of this municipality shown in its detail table.
    pub samples: Vec<SampleRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub sampling_period: Option<String>,
    pub land_use: String,
    pub concentration: f64,
    pub sampling_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MunicipalityAverage {
    pub municipality: String,
    pub mean: f64,
    pub count: usize,
}

pub(super) fn build(rows: &[&Measurement], selection: &FilterSelection, ctx: &PageContext<'_>) -> PageView {
    let categories = ctx.dataset.categories();
    let Some(metal) = selection
        .heavy_metals
        .iter()
        .next()
        .or_else(|| categories.heavy_metals.iter().next())
        .cloned()
    else {
        return PageView::NoData(NoData::for_filters(Page::Map, None));
    };

    let Some(geocoded) = ctx.geocoded else {
        return PageView::NoData(NoData::new(
            Page::Map,
            "Geocoded municipalities file not found. Please run the geocoding step first.",
        ));
    };

    let metal_rows: Vec<&Measurement> = rows.iter().copied().filter(|m| m.heavy_metal == metal).collect();
    if metal_rows.is_empty() {
        return PageView::NoData(NoData::for_filters(Page::Map, Some(&metal)));
    }

    let located: Vec<(&Measurement, GeoPoint)> = metal_rows
        .iter()
        .filter_map(|m| geocoded.get(&m.municipality).map(|p| (*m, p)))
        .collect();
    if located.is_empty() {
        return PageView::NoData(NoData::new(
            Page::Map,
            "Unable to match municipalities with geographic coordinates.",
        ));
    }
    log::debug!(
        "Map for {metal}: {} of {} samples geocoded",
        located.len(),
        metal_rows.len()
    );

    let joined: Vec<&Measurement> = located.iter().map(|(m, _)| *m).collect();
    let metrics = metrics(&joined);

    let latest = latest_per_land_use(&located);
    let (min, max) = latest.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (m, _)| {
        (lo.min(m.concentration), hi.max(m.concentration))
    });

    let markers = markers(&latest, &joined, min, max);

    let averages = aggregate(&joined, &[Dimension::Municipality]);
    let to_average = |g: &GroupSummary| MunicipalityAverage {
        municipality: g.key.first().map(|k| k.to_string()).unwrap_or_default(),
        mean: g.mean,
        count: g.count,
    };
    let highest = averages.top_n(ctx.settings.map_extremes).iter().map(to_average).collect();
    let lowest = averages.bottom_n(ctx.settings.map_extremes).iter().map(to_average).collect();

    PageView::Map(MapView {
        heavy_metal: metal,
        metrics,
        markers,
        legend: ConcentrationBand::ALL
            .iter()
            .map(|b| LegendEntry {
                label: b.label(),
                color: b.color(),
            })
            .collect(),
        highest,
        lowest,
    })
}

fn metrics(joined: &[&Measurement]) -> MapMetrics {
    let summary = aggregate(joined, &[]);
    let municipalities = aggregate(joined, &[Dimension::Municipality]).len();
    let first = summary.iter().next().cloned();
    match first {
        Some(all) => MapMetrics {
            municipalities,
            mean: all.mean,
            max: all.max,
            min: all.min,
        },
        None => MapMetrics {
            municipalities,
            mean: f64::NAN,
            max: f64::NAN,
            min: f64::NAN,
        },
    }
}

/// For each (municipality, land use), the first sample from its most recent
/// year.
fn latest_per_land_use<'a>(located: &[(&'a Measurement, GeoPoint)]) -> Vec<(&'a Measurement, GeoPoint)> {
    let mut latest: Vec<(&Measurement, GeoPoint)> = Vec::new();
    let mut slots: BTreeMap<(&str, &str), usize> = BTreeMap::new();

    for &(m, point) in located {
        let key = (m.municipality.as_str(), m.land_use.as_str());
        match slots.get(&key) {
            Some(&i) if latest[i].0.year >= m.year => {}
            Some(&i) => latest[i] = (m, point),
            None => {
                slots.insert(key, latest.len());
                latest.push((m, point));
            }
        }
    }
    latest
}

/// One marker per (municipality, year) of the latest samples, sized and
/// banded by where its mean sits between `min` and `max`.
fn markers(latest: &[(&Measurement, GeoPoint)], joined: &[&Measurement], min: f64, max: f64) -> Vec<MapMarker> {
    let mut grouped: BTreeMap<(&str, i32), (GeoPoint, Vec<&Measurement>)> = BTreeMap::new();
    for &(m, point) in latest {
        grouped
            .entry((m.municipality.as_str(), m.year))
            .or_insert_with(|| (point, Vec::new()))
            .1
            .push(m);
    }

    grouped
        .into_iter()
        .map(|((municipality, year), (location, samples))| {
            let concentration = samples.iter().map(|m| m.concentration).sum::<f64>() / samples.len() as f64;
            let mut land_uses: Vec<&str> = Vec::new();
            for m in &samples {
                if !land_uses.contains(&m.land_use.as_str()) {
                    land_uses.push(&m.land_use);
                }
            }

            let (normalized, radius) = if max > min {
                let n = (concentration - min) / (max - min);
                (n, MIN_RADIUS + n * RADIUS_SPAN)
            } else {
                (0.5, FLAT_RADIUS)
            };
            let band = ConcentrationBand::from_normalized(normalized);

            MapMarker {
                municipality: municipality.to_string(),
                location,
                year,
                concentration,
                land_uses: land_uses.join(", "),
                band,
                color: band.color(),
                radius,
                samples: joined
                    .iter()
                    .filter(|m| m.municipality == municipality)
                    .map(|m| SampleRow {
                        sampling_period: m.sampling_period.clone(),
                        land_use: m.land_use.clone(),
                        concentration: m.concentration,
                        sampling_date: m.sampling_date.clone(),
                    })
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartSettings;
    use crate::data::geocoded::GeocodedTable;
    use crate::data::model::Dataset;
    use crate::views::{build as build_page, fixtures};

    fn geocoded() -> GeocodedTable {
        GeocodedTable::from_points(vec![
            ("Zurich".to_string(), GeoPoint { latitude: 47.37, longitude: 8.54 }),
            ("Basel".to_string(), GeoPoint { latitude: 47.56, longitude: 7.59 }),
            ("Bern".to_string(), GeoPoint { latitude: 46.95, longitude: 7.45 }),
        ])
    }

    fn map_for(ds: &Dataset, geo: Option<&GeocodedTable>, sel: &mut FilterSelection) -> PageView {
        let settings = ChartSettings {
            map_extremes: 2,
            ..ChartSettings::default()
        };
        let ctx = PageContext {
            dataset: ds,
            settings: &settings,
            geocoded: geo,
        };
        build_page(Page::Map, &ctx, sel)
    }

    #[test]
    fn test_markers_use_latest_year() {
        let ds = fixtures::dataset();
        let geo = geocoded();
        let mut sel = FilterSelection::unfiltered(ds.categories());

        let PageView::Map(view) = map_for(&ds, Some(&geo), &mut sel) else {
            panic!("expected map view");
        };
        // First metal alphabetically; Aarau has no coordinates
        assert_eq!(view.heavy_metal, "Cadmium");
        assert_eq!(view.metrics.municipalities, 3);
        // Metrics span every year, unlike the markers
        assert!((view.metrics.max - 2.4).abs() < 1e-12);
        assert!((view.metrics.min - 0.25).abs() < 1e-12);
        assert!((view.metrics.mean - 1.03125).abs() < 1e-12);

        let names: Vec<&str> = view.markers.iter().map(|m| m.municipality.as_str()).collect();
        assert_eq!(names, vec!["Basel", "Bern", "Zurich"]);
        assert!(view.markers.iter().all(|m| m.year == 2010));

        let zurich = &view.markers[2];
        assert_eq!(zurich.land_uses, "Urban, Agricultural");
        assert!((zurich.concentration - 0.9).abs() < 1e-12);
        assert_eq!(zurich.samples.len(), 6);

        // Basel holds the max, Bern the min
        assert_eq!(view.markers[0].band, ConcentrationBand::High);
        assert!((view.markers[0].radius - 23.0).abs() < 1e-9);
        assert_eq!(view.markers[1].band, ConcentrationBand::Low);
        assert!((view.markers[1].radius - 8.0).abs() < 1e-9);

        assert_eq!(view.highest[0].municipality, "Basel");
        assert_eq!(view.lowest[0].municipality, "Bern");
        assert_eq!(view.legend.len(), 4);
    }

    #[test]
    fn test_single_value_is_flat() {
        let ds = Dataset::from_records(vec![Measurement::new("Bern", "Lead", "Urban", 2000, 3.0)]);
        let geo = geocoded();
        let mut sel = FilterSelection::unfiltered(ds.categories());

        let PageView::Map(view) = map_for(&ds, Some(&geo), &mut sel) else {
            panic!("expected map view");
        };
        assert_eq!(view.markers[0].radius, 15.0);
        assert_eq!(view.markers[0].band, ConcentrationBand::MediumLow);
    }

    #[test]
    fn test_missing_coordinates() {
        let ds = fixtures::dataset();
        let mut sel = FilterSelection::unfiltered(ds.categories());
        assert!(map_for(&ds, None, &mut sel).is_empty());

        let only_geneva = GeocodedTable::from_points(vec![(
            "Geneva".to_string(),
            GeoPoint { latitude: 46.2, longitude: 6.14 },
        )]);
        let mut sel = FilterSelection::unfiltered(ds.categories());
        let PageView::NoData(empty) = map_for(&ds, Some(&only_geneva), &mut sel) else {
            panic!("expected no-data view");
        };
        assert!(empty.message.contains("coordinates"));
    }
}
