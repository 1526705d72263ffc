//! Query-parameter codec: `FilterSelection` ⇄ shareable URL parameters.
//!
//! Decoding never fails. Unknown category values are dropped and a malformed
//! year range falls back to the full dataset bounds, so stale or hand-edited
//! links always open on a valid selection.

use std::collections::{BTreeMap, BTreeSet};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::data::filter::FilterSelection;
use crate::data::model::{Categories, Dimension, YearRange};

pub const MUNICIPALITIES: &str = "municipalities";
pub const HEAVY_METALS: &str = "heavy_metals";
pub const LAND_USES: &str = "land_uses";
pub const YEAR_RANGE: &str = "year_range";
pub const HEAVY_METAL_DETAIL: &str = "selected_heavy_metal_detail";

/// Log target for reconciliation events (dropped values, reset ranges).
pub const ANALYTICS_TARGET: &str = "soil_dashboard::analytics";

/// Unreserved characters plus `,`, which separates list values.
const QUERY_VALUE_CHARSET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b',');

/// Parameter key for a categorical dimension.
pub fn param_key(dim: Dimension) -> Option<&'static str> {
    match dim {
        Dimension::Municipality => Some(MUNICIPALITIES),
        Dimension::HeavyMetal => Some(HEAVY_METALS),
        Dimension::LandUse => Some(LAND_USES),
        Dimension::Year => None,
    }
}

// ---------------------------------------------------------------------------
// ParamStore – the host's opaque key/value store
// ---------------------------------------------------------------------------

/// Key/value access to the host's current query parameters.
pub trait ParamStore {
    fn get(&self, key: &str) -> Option<&str>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

impl ParamStore for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        BTreeMap::get(self, key).map(String::as_str)
    }

    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        BTreeMap::remove(self, key);
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Flat parameter map for `selection`. Empty dimensions are omitted; the year
/// range is always present.
pub fn encode(selection: &FilterSelection) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    write_to_store(selection, &mut params);
    params
}

/// Push `selection` into `store`, removing keys for empty dimensions.
pub fn write_to_store<S: ParamStore + ?Sized>(selection: &FilterSelection, store: &mut S) {
    for dim in Dimension::CATEGORICAL {
        let (Some(key), Some(values)) = (param_key(dim), selection.selected(dim)) else {
            continue;
        };
        if values.is_empty() {
            store.remove(key);
        } else {
            store.set(key, join(values));
        }
    }

    let range = selection.year_range;
    store.set(YEAR_RANGE, format!("{},{}", range.min, range.max));

    match &selection.heavy_metal_detail {
        Some(metal) => store.set(HEAVY_METAL_DETAIL, metal.clone()),
        None => store.remove(HEAVY_METAL_DETAIL),
    }
}

fn join(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// A parameter value discarded during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedValue {
    pub key: &'static str,
    pub value: String,
}

/// What decoding had to correct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub dropped: Vec<DroppedValue>,
    /// The supplied year range was malformed or outside the data.
    pub year_range_reset: bool,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && !self.year_range_reset
    }
}

/// Decode and reconcile a selection from `params`. Never fails.
///
/// Each dropped value is logged at debug level under [`ANALYTICS_TARGET`].
pub fn decode<S: ParamStore + ?Sized>(params: &S, categories: &Categories) -> FilterSelection {
    let (selection, report) = decode_with_report(params, categories);
    for dropped in &report.dropped {
        log::debug!(
            target: ANALYTICS_TARGET,
            "dropped unknown {} value {:?}",
            dropped.key,
            dropped.value
        );
    }
    if report.year_range_reset {
        log::debug!(
            target: ANALYTICS_TARGET,
            "reset year range {:?} to {}",
            params.get(YEAR_RANGE).unwrap_or_default(),
            categories.year_bounds
        );
    }
    selection
}

/// [`decode`], also returning what was corrected.
pub fn decode_with_report<S: ParamStore + ?Sized>(
    params: &S,
    categories: &Categories,
) -> (FilterSelection, Reconciliation) {
    let mut report = Reconciliation::default();
    let mut selection = FilterSelection::unfiltered(categories);

    for dim in Dimension::CATEGORICAL {
        let (Some(key), Some(valid)) = (param_key(dim), categories.values(dim)) else {
            continue;
        };
        let Some(raw) = params.get(key) else {
            continue;
        };
        let mut chosen = BTreeSet::new();
        for value in split_values(raw) {
            if valid.contains(value) {
                chosen.insert(value.to_string());
            } else {
                report.dropped.push(DroppedValue {
                    key,
                    value: value.to_string(),
                });
            }
        }
        if let Some(target) = selection.selected_mut(dim) {
            *target = chosen;
        }
    }

    if let Some(raw) = params.get(YEAR_RANGE) {
        match parse_year_range(raw).and_then(|r| r.clamp_to(&categories.year_bounds)) {
            Some(range) => selection.year_range = range,
            None => report.year_range_reset = true,
        }
    }

    if let Some(raw) = params.get(HEAVY_METAL_DETAIL) {
        let metal = raw.trim();
        if categories.heavy_metals.contains(metal) {
            selection.heavy_metal_detail = Some(metal.to_string());
        } else if !metal.is_empty() {
            report.dropped.push(DroppedValue {
                key: HEAVY_METAL_DETAIL,
                value: metal.to_string(),
            });
        }
    }

    (selection, report)
}

fn split_values(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|v| !v.is_empty())
}

/// Parse `"min,max"`. `None` unless there are exactly two integers in order.
fn parse_year_range(raw: &str) -> Option<YearRange> {
    let mut parts = raw.split(',').map(str::trim);
    let min = parts.next()?.parse::<i32>().ok()?;
    let max = parts.next()?.parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    YearRange::new(min, max)
}

// ---------------------------------------------------------------------------
// QueryParams – raw URL query strings
// ---------------------------------------------------------------------------

/// Parameters parsed from, and rendered to, a raw `a=b&c=d` query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    /// Parse a query string. A leading `?` is ignored, `+` is a space and
    /// keys/values are percent-decoded. Later duplicates win.
    pub fn parse(query: &str) -> Self {
        let query = query.trim().trim_start_matches('?');
        let params = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key), decode_component(value))
            })
            .collect();
        QueryParams(params)
    }

    /// Render as `key=value&...` in key order, percent-encoding each part.
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, QUERY_VALUE_CHARSET),
                    utf8_percent_encode(v, QUERY_VALUE_CHARSET)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl From<BTreeMap<String, String>> for QueryParams {
    fn from(params: BTreeMap<String, String>) -> Self {
        QueryParams(params)
    }
}

impl ParamStore for QueryParams {
    fn get(&self, key: &str) -> Option<&str> {
        ParamStore::get(&self.0, key)
    }

    fn set(&mut self, key: &str, value: String) {
        self.0.set(key, value);
    }

    fn remove(&mut self, key: &str) {
        ParamStore::remove(&mut self.0, key);
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
