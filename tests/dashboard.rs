use std::fs;

use tempfile::TempDir;

use soil_dashboard::config::{ChartSettings, ColumnMapping};
use soil_dashboard::data::aggregate::aggregate;
use soil_dashboard::data::filter::{apply, FilterSelection};
use soil_dashboard::data::geocoded::load_geocoded;
use soil_dashboard::data::loader::load_file;
use soil_dashboard::data::model::{Dataset, Measurement, YearRange};
use soil_dashboard::query::{self, QueryParams};
use soil_dashboard::views::{self, Page, PageContext, PageView};

fn scenario() -> Dataset {
    Dataset::from_records(vec![
        Measurement::new("Zurich", "Cadmium", "Agricultural", 2010, 0.5),
        Measurement::new("Zurich", "Cadmium", "Agricultural", 2012, 1.5),
        Measurement::new("Basel", "Lead", "Urban", 2011, 2.0),
    ])
}

#[test]
fn zurich_filter_then_global_aggregate() {
    let ds = scenario();
    let mut sel = FilterSelection::unfiltered(ds.categories());
    sel.municipalities.insert("Zurich".to_string());

    let rows = apply(&ds, &sel);
    assert_eq!(rows, vec![&ds.records()[0], &ds.records()[1]]);

    let result = aggregate(&rows, &[]);
    assert_eq!(result.len(), 1);
    let all = &result.groups[0];
    assert_eq!(all.mean, 1.0);
    assert_eq!(all.min, 0.5);
    assert_eq!(all.max, 1.5);
    assert_eq!(all.count, 2);
}

#[test]
fn stale_link_is_reconciled() {
    let ds = scenario();
    let params = QueryParams::parse("municipalities=Zurich,Unknown&year_range=abc,2020");
    let (sel, report) = query::decode_with_report(&params, ds.categories());

    assert_eq!(sel.municipalities.iter().collect::<Vec<_>>(), vec!["Zurich"]);
    assert_eq!(sel.year_range, YearRange { min: 2010, max: 2012 });
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].value, "Unknown");
    assert!(report.year_range_reset);
}

#[test]
fn empty_subset_aggregates_to_nothing() {
    let ds = scenario();
    let params = QueryParams::parse("municipalities=Basel&heavy_metals=Cadmium");
    let sel = query::decode(&params, ds.categories());

    let rows = apply(&ds, &sel);
    assert!(rows.is_empty());
    assert!(aggregate(&rows, &[]).is_empty());
}

#[test]
fn pages_from_files_serialise_with_kind() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data.csv");
    fs::write(
        &data,
        "Municipality,Heavy metal,Land use,Year,Heavy metal concentration (mg/kg DM),Sampling Period,Sampling date\n\
         Zürich,Lead,Urban,2005,40.0,2005-2009,2005-06-01\n\
         Zürich,Lead,Forest,2005,60.0,2005-2009,2005-06-02\n\
         Zürich,Lead,Urban,2010,30.0,2010-2014,2010-05-12\n\
         Sion,Lead,Vineyard,2010,90.0,2010-2014,2010-07-20\n\
         Sion,Copper,Vineyard,2010,120.0,2010-2014,2010-07-20\n",
    )
    .unwrap();
    let geo = dir.path().join("municipalities_geocoded.csv");
    fs::write(
        &geo,
        "Municipality,Latitude,Longitude\nZürich,47.3769,8.5417\nSion,46.2331,7.3606\nNowhere,,\n",
    )
    .unwrap();

    let ds = load_file(&data, &ColumnMapping::default()).unwrap();
    let geocoded = load_geocoded(&geo).unwrap();
    assert_eq!(geocoded.len(), 2);

    let settings = ChartSettings::default();
    let ctx = PageContext {
        dataset: &ds,
        settings: &settings,
        geocoded: Some(&geocoded),
    };

    let params = QueryParams::parse("?heavy_metals=Lead&municipalities=Z%C3%BCrich");
    let mut sel = query::decode(&params, ds.categories());
    let PageView::Map(map) = views::build(Page::Map, &ctx, &mut sel) else {
        panic!("expected map view");
    };
    assert_eq!(map.heavy_metal, "Lead");
    // Latest Urban sample is 2010, latest Forest sample is 2005
    let years: Vec<i32> = map.markers.iter().map(|m| m.year).collect();
    assert_eq!(years, vec![2005, 2010]);
    assert_eq!(map.markers[1].samples.len(), 3);
    assert_eq!(map.markers[1].samples[0].sampling_date.as_deref(), Some("2005-06-01"));

    // The detail page drops the metal multi-select and would default to Copper
    sel.heavy_metal_detail = Some("Lead".to_string());
    let json = serde_json::to_value(views::build(Page::HeavyMetalDetail, &ctx, &mut sel)).unwrap();
    assert_eq!(json["kind"], "heavy_metal_detail");
    assert_eq!(json["heavy_metal"], "Lead");
    assert_eq!(json["highest_municipality"], "Zürich");

    let mut sel = query::decode(&QueryParams::parse("land_uses=Forest&year_range=2010,2010"), ds.categories());
    let json = serde_json::to_value(views::build(Page::Overview, &ctx, &mut sel)).unwrap();
    assert_eq!(json["kind"], "no_data");
    assert_eq!(json["page"], "overview");

    let canonical = QueryParams::from(query::encode(&sel)).to_query_string();
    assert!(canonical.contains("year_range=2010,2010"));
}
