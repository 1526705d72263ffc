use std::collections::BTreeSet;

use serde::Serialize;

use super::model::{Categories, Dataset, Dimension, Measurement, YearRange};

// ---------------------------------------------------------------------------
// Filter selection: which values are selected per dimension
// ---------------------------------------------------------------------------

/// The active constraints across the four filter dimensions.
///
/// An empty set means "no filter" on that dimension (every value passes).
/// `heavy_metal_detail` is the detail page's single-select; it is carried
/// alongside the filters but is never used as a row predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    pub municipalities: BTreeSet<String>,
    pub heavy_metals: BTreeSet<String>,
    pub land_uses: BTreeSet<String>,
    pub year_range: YearRange,
    pub heavy_metal_detail: Option<String>,
}

impl FilterSelection {
    /// A selection that lets every row of the dataset through.
    pub fn unfiltered(categories: &Categories) -> Self {
        FilterSelection {
            municipalities: BTreeSet::new(),
            heavy_metals: BTreeSet::new(),
            land_uses: BTreeSet::new(),
            year_range: categories.year_bounds,
            heavy_metal_detail: None,
        }
    }

    /// Selected set for a categorical dimension; `None` for [`Dimension::Year`].
    pub fn selected(&self, dim: Dimension) -> Option<&BTreeSet<String>> {
        match dim {
            Dimension::Municipality => Some(&self.municipalities),
            Dimension::HeavyMetal => Some(&self.heavy_metals),
            Dimension::LandUse => Some(&self.land_uses),
            Dimension::Year => None,
        }
    }

    pub fn selected_mut(&mut self, dim: Dimension) -> Option<&mut BTreeSet<String>> {
        match dim {
            Dimension::Municipality => Some(&mut self.municipalities),
            Dimension::HeavyMetal => Some(&mut self.heavy_metals),
            Dimension::LandUse => Some(&mut self.land_uses),
            Dimension::Year => None,
        }
    }

    /// Whether `m` satisfies every active predicate.
    pub fn matches(&self, m: &Measurement) -> bool {
        let passes = |selected: &BTreeSet<String>, value: &str| {
            selected.is_empty() || selected.contains(value)
        };

        passes(&self.municipalities, &m.municipality)
            && passes(&self.heavy_metals, &m.heavy_metal)
            && passes(&self.land_uses, &m.land_use)
            && self.year_range.contains(m.year)
    }
}

/// Return indices of measurements that pass all active filters.
pub fn filtered_indices(dataset: &Dataset, selection: &FilterSelection) -> Vec<usize> {
    dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, m)| selection.matches(m))
        .map(|(i, _)| i)
        .collect()
}

/// Return the measurements that pass all active filters, in dataset order.
///
/// An empty result is a normal outcome; callers render a "no data" state.
pub fn apply<'a>(dataset: &'a Dataset, selection: &FilterSelection) -> Vec<&'a Measurement> {
    dataset
        .records()
        .iter()
        .filter(|m| selection.matches(m))
        .collect()
}
