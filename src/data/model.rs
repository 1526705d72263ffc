use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// YearRange – inclusive [min, max] span of sampling years
// ---------------------------------------------------------------------------

/// Inclusive year interval. Always satisfies `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    /// Build a range, or `None` when the bounds are inverted.
    pub fn new(min: i32, max: i32) -> Option<Self> {
        (min <= max).then_some(YearRange { min, max })
    }

    pub fn contains(&self, year: i32) -> bool {
        self.min <= year && year <= self.max
    }

    /// Intersect with `bounds`. `None` when the two ranges do not overlap.
    pub fn clamp_to(&self, bounds: &YearRange) -> Option<YearRange> {
        YearRange::new(self.min.max(bounds.min), self.max.min(bounds.max))
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.min, self.max)
    }
}

// ---------------------------------------------------------------------------
// Dimension – the four axes a measurement can be filtered or grouped on
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Municipality,
    HeavyMetal,
    LandUse,
    Year,
}

impl Dimension {
    /// The three categorical dimensions, in query-parameter order.
    pub const CATEGORICAL: [Dimension; 3] =
        [Dimension::Municipality, Dimension::HeavyMetal, Dimension::LandUse];

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Municipality => "Municipality",
            Dimension::HeavyMetal => "Heavy metal",
            Dimension::LandUse => "Land use",
            Dimension::Year => "Year",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The value a single measurement holds for one [`Dimension`].
///
/// Serialized untagged so group keys read as plain `"Zurich"` / `2010` in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Text(String),
    Year(i32),
}

impl DimensionValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DimensionValue::Text(s) => Some(s),
            DimensionValue::Year(_) => None,
        }
    }

    pub fn as_year(&self) -> Option<i32> {
        match self {
            DimensionValue::Year(y) => Some(*y),
            DimensionValue::Text(_) => None,
        }
    }
}

impl From<&str> for DimensionValue {
    fn from(s: &str) -> Self {
        DimensionValue::Text(s.to_string())
    }
}

impl From<i32> for DimensionValue {
    fn from(year: i32) -> Self {
        DimensionValue::Year(year)
    }
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionValue::Text(s) => write!(f, "{s}"),
            DimensionValue::Year(y) => write!(f, "{y}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Measurement – one row of the source table
// ---------------------------------------------------------------------------

/// A single soil sample: concentration of one heavy metal in mg/kg dry matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub municipality: String,
    pub heavy_metal: String,
    pub land_use: String,
    pub year: i32,
    /// mg/kg DM, never negative.
    pub concentration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_date: Option<String>,
}

impl Measurement {
    pub fn new(
        municipality: &str,
        heavy_metal: &str,
        land_use: &str,
        year: i32,
        concentration: f64,
    ) -> Self {
        Measurement {
            municipality: municipality.to_string(),
            heavy_metal: heavy_metal.to_string(),
            land_use: land_use.to_string(),
            year,
            concentration,
            sampling_period: None,
            sampling_date: None,
        }
    }

    /// Categorical value for `dim`; `None` for [`Dimension::Year`].
    pub fn category(&self, dim: Dimension) -> Option<&str> {
        match dim {
            Dimension::Municipality => Some(&self.municipality),
            Dimension::HeavyMetal => Some(&self.heavy_metal),
            Dimension::LandUse => Some(&self.land_use),
            Dimension::Year => None,
        }
    }

    pub fn value(&self, dim: Dimension) -> DimensionValue {
        match self.category(dim) {
            Some(text) => DimensionValue::Text(text.to_string()),
            None => DimensionValue::Year(self.year),
        }
    }
}

// ---------------------------------------------------------------------------
// Categories – closed-world option sets derived from the loaded table
// ---------------------------------------------------------------------------

/// Distinct values per categorical dimension plus the observed year span.
///
/// These sets populate the selectable filter options and are the reference
/// every externally supplied filter value is reconciled against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Categories {
    pub municipalities: BTreeSet<String>,
    pub heavy_metals: BTreeSet<String>,
    pub land_uses: BTreeSet<String>,
    /// `0 - 0` for an empty table; the loader never produces one.
    pub year_bounds: YearRange,
}

impl Categories {
    pub fn from_records(records: &[Measurement]) -> Self {
        let mut municipalities = BTreeSet::new();
        let mut heavy_metals = BTreeSet::new();
        let mut land_uses = BTreeSet::new();
        let mut bounds: Option<YearRange> = None;

        for m in records {
            municipalities.insert(m.municipality.clone());
            heavy_metals.insert(m.heavy_metal.clone());
            land_uses.insert(m.land_use.clone());
            bounds = Some(match bounds {
                Some(b) => YearRange {
                    min: b.min.min(m.year),
                    max: b.max.max(m.year),
                },
                None => YearRange {
                    min: m.year,
                    max: m.year,
                },
            });
        }

        Categories {
            municipalities,
            heavy_metals,
            land_uses,
            year_bounds: bounds.unwrap_or(YearRange { min: 0, max: 0 }),
        }
    }

    /// Option set for a categorical dimension; `None` for [`Dimension::Year`].
    pub fn values(&self, dim: Dimension) -> Option<&BTreeSet<String>> {
        match dim {
            Dimension::Municipality => Some(&self.municipalities),
            Dimension::HeavyMetal => Some(&self.heavy_metals),
            Dimension::LandUse => Some(&self.land_uses),
            Dimension::Year => None,
        }
    }

    pub fn contains(&self, dim: Dimension, value: &str) -> bool {
        self.values(dim).is_some_and(|set| set.contains(value))
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The immutable measurement table with its category index.
///
/// Built once; there is no mutating API, so the cached [`Categories`] can
/// never go stale.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Measurement>,
    categories: Categories,
}

impl Dataset {
    /// Build the category index from the loaded records.
    pub fn from_records(records: Vec<Measurement>) -> Self {
        let categories = Categories::from_records(&records);
        Dataset {
            records,
            categories,
        }
    }

    pub fn records(&self) -> &[Measurement] {
        &self.records
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    /// Number of measurements.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
