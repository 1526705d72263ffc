use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::model::{Dimension, DimensionValue, Measurement, YearRange};
use crate::stats::Distribution;

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// One value per requested grouping dimension, in `group_by` order.
pub type GroupKey = Vec<DimensionValue>;

/// Split `rows` into groups keyed by `group_by`, keeping the order in which
/// each key first occurs.
fn group_concentrations(rows: &[&Measurement], group_by: &[Dimension]) -> Vec<(GroupKey, Vec<f64>)> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<f64>)> = Vec::new();

    for m in rows {
        let key: GroupKey = group_by.iter().map(|&dim| m.value(dim)).collect();
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, Vec::new()));
                groups.len() - 1
            }
        };
        groups[slot].1.push(m.concentration);
    }

    groups
}

// ---------------------------------------------------------------------------
// AggregateResult – mean / min / max / count per group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: GroupKey,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl GroupSummary {
    /// The key part for `dim`, given the `group_by` the result was built with.
    fn part<'k>(&'k self, group_by: &[Dimension], dim: Dimension) -> Option<&'k DimensionValue> {
        group_by
            .iter()
            .position(|&d| d == dim)
            .and_then(|i| self.key.get(i))
    }
}

/// Grouped concentration statistics for a filtered subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub group_by: Vec<Dimension>,
    pub groups: Vec<GroupSummary>,
}

impl AggregateResult {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupSummary> {
        self.groups.iter()
    }

    /// Look up the summary for an exact key.
    pub fn get(&self, key: &[DimensionValue]) -> Option<&GroupSummary> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// The key part of `group` for `dim`, if `dim` was grouped on.
    pub fn key_part<'g>(&self, group: &'g GroupSummary, dim: Dimension) -> Option<&'g DimensionValue> {
        group.part(&self.group_by, dim)
    }

    /// Keep only the groups whose `dim` key equals `value`.
    pub fn filter_key(&self, dim: Dimension, value: &DimensionValue) -> AggregateResult {
        AggregateResult {
            group_by: self.group_by.clone(),
            groups: self
                .groups
                .iter()
                .filter(|g| g.part(&self.group_by, dim) == Some(value))
                .cloned()
                .collect(),
        }
    }

    /// Groups ordered by ascending key.
    pub fn sorted_by_key(&self) -> AggregateResult {
        let mut groups = self.groups.clone();
        groups.sort_by(|a, b| a.key.cmp(&b.key));
        AggregateResult {
            group_by: self.group_by.clone(),
            groups,
        }
    }

    /// The `n` groups with the highest mean; ties go to the smaller key.
    pub fn top_n(&self, n: usize) -> AggregateResult {
        self.ranked(n, |a, b| b.mean.total_cmp(&a.mean))
    }

    /// The `n` groups with the lowest mean; ties go to the smaller key.
    pub fn bottom_n(&self, n: usize) -> AggregateResult {
        self.ranked(n, |a, b| a.mean.total_cmp(&b.mean))
    }

    fn ranked<F>(&self, n: usize, by_mean: F) -> AggregateResult
    where
        F: Fn(&GroupSummary, &GroupSummary) -> Ordering,
    {
        let mut groups = self.groups.clone();
        groups.sort_by(|a, b| by_mean(a, b).then_with(|| a.key.cmp(&b.key)));
        groups.truncate(n);
        AggregateResult {
            group_by: self.group_by.clone(),
            groups,
        }
    }
}

/// Group `rows` by `group_by` and compute mean, min, max and count of the
/// concentration in each group.
///
/// Groups appear in order of first occurrence. An empty `group_by` yields a
/// single global row; zero input rows yield an empty result.
pub fn aggregate(rows: &[&Measurement], group_by: &[Dimension]) -> AggregateResult {
    let groups = group_concentrations(rows, group_by)
        .into_iter()
        .map(|(key, values)| {
            let count = values.len();
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / count as f64;
            GroupSummary {
                key,
                mean,
                min,
                max,
                count,
            }
        })
        .collect();

    AggregateResult {
        group_by: group_by.to_vec(),
        groups,
    }
}

// ---------------------------------------------------------------------------
// Distributions per group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDistribution {
    pub key: GroupKey,
    pub stats: Distribution,
}

/// Full [`Distribution`] per group, in order of first occurrence.
pub fn distribution_by(rows: &[&Measurement], group_by: &[Dimension]) -> Vec<GroupDistribution> {
    group_concentrations(rows, group_by)
        .into_iter()
        .filter_map(|(key, values)| {
            Distribution::from_values(&values).map(|stats| GroupDistribution { key, stats })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Data summary
// ---------------------------------------------------------------------------

/// Headline counts for a filtered subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub total_records: usize,
    pub municipalities: usize,
    pub heavy_metals: usize,
    /// Observed year span; `None` for an empty subset.
    pub years: Option<YearRange>,
}

pub fn summarize(rows: &[&Measurement]) -> DataSummary {
    let municipalities: BTreeSet<&str> = rows.iter().map(|m| m.municipality.as_str()).collect();
    let heavy_metals: BTreeSet<&str> = rows.iter().map(|m| m.heavy_metal.as_str()).collect();
    let min = rows.iter().map(|m| m.year).min();
    let max = rows.iter().map(|m| m.year).max();

    DataSummary {
        total_records: rows.len(),
        municipalities: municipalities.len(),
        heavy_metals: heavy_metals.len(),
        years: min.zip(max).and_then(|(lo, hi)| YearRange::new(lo, hi)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Measurement> {
        vec![
            Measurement::new("Zurich", "Cadmium", "Agricultural", 2010, 0.5),
            Measurement::new("Zurich", "Cadmium", "Agricultural", 2012, 1.5),
            Measurement::new("Basel", "Lead", "Urban", 2011, 2.0),
            Measurement::new("Bern", "Lead", "Urban", 2011, 2.0),
            Measurement::new("Basel", "Cadmium", "Forest", 2010, 0.25),
        ]
    }

    fn refs(records: &[Measurement]) -> Vec<&Measurement> {
        records.iter().collect()
    }

    #[test]
    fn test_global_aggregate_of_zurich_rows() {
        let records = rows();
        let zurich: Vec<&Measurement> = records.iter().filter(|m| m.municipality == "Zurich").collect();

        let result = aggregate(&zurich, &[]);
        assert_eq!(result.len(), 1);
        let g = &result.groups[0];
        assert!(g.key.is_empty());
        assert_eq!(g.mean, 1.0);
        assert_eq!(g.min, 0.5);
        assert_eq!(g.max, 1.5);
        assert_eq!(g.count, 2);
    }

    #[test]
    fn test_constant_group() {
        let records: Vec<Measurement> = (0..7)
            .map(|i| Measurement::new("Aarau", "Zinc", "Urban", 1990 + i, 42.0))
            .collect();
        let result = aggregate(&refs(&records), &[Dimension::Municipality]);
        assert_eq!(result.len(), 1);
        let g = &result.groups[0];
        assert_eq!((g.mean, g.min, g.max, g.count), (42.0, 42.0, 42.0, 7));
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        assert!(aggregate(&[], &[]).is_empty());
        assert!(aggregate(&[], &[Dimension::Year]).is_empty());
        assert!(distribution_by(&[], &[Dimension::LandUse]).is_empty());
    }

    #[test]
    fn test_groups_keep_first_occurrence_order() {
        let records = rows();
        let result = aggregate(&refs(&records), &[Dimension::Municipality]);
        let names: Vec<String> = result.iter().map(|g| g.key[0].to_string()).collect();
        assert_eq!(names, vec!["Zurich", "Basel", "Bern"]);

        let basel = result.get(&[DimensionValue::from("Basel")]).unwrap();
        assert_eq!(basel.count, 2);
        assert_eq!(basel.mean, 1.125);
    }

    #[test]
    fn test_multi_dimension_keys() {
        let records = rows();
        let result = aggregate(&refs(&records), &[Dimension::HeavyMetal, Dimension::Year]);
        assert_eq!(result.len(), 3);

        let lead_2011 = result
            .get(&[DimensionValue::from("Lead"), DimensionValue::Year(2011)])
            .unwrap();
        assert_eq!(lead_2011.count, 2);

        let cadmium = result.filter_key(Dimension::HeavyMetal, &DimensionValue::from("Cadmium"));
        assert_eq!(cadmium.len(), 2);
        let years: Vec<i32> = cadmium
            .iter()
            .filter_map(|g| cadmium.key_part(g, Dimension::Year).and_then(|v| v.as_year()))
            .collect();
        assert_eq!(years, vec![2010, 2012]);
    }

    #[test]
    fn test_top_n_breaks_ties_by_name() {
        let records = rows();
        let result = aggregate(&refs(&records), &[Dimension::Municipality]);

        let top = result.top_n(2);
        let names: Vec<String> = top.iter().map(|g| g.key[0].to_string()).collect();
        assert_eq!(names, vec!["Bern", "Basel"]);

        let bottom = result.bottom_n(1);
        assert_eq!(bottom.groups[0].key[0], DimensionValue::from("Zurich"));

        let mut tied = aggregate(&refs(&records), &[Dimension::Municipality]);
        for g in &mut tied.groups {
            g.mean = 1.0;
        }
        let names: Vec<String> = tied.top_n(3).iter().map(|g| g.key[0].to_string()).collect();
        assert_eq!(names, vec!["Basel", "Bern", "Zurich"]);
    }

    #[test]
    fn test_distribution_by_land_use() {
        let records = rows();
        let dists = distribution_by(&refs(&records), &[Dimension::LandUse]);
        assert_eq!(dists.len(), 3);
        let urban = dists
            .iter()
            .find(|d| d.key == vec![DimensionValue::from("Urban")])
            .unwrap();
        assert_eq!(urban.stats.count, 2);
        assert_eq!(urban.stats.std, Some(0.0));
    }

    #[test]
    fn test_summarize() {
        let records = rows();
        let summary = summarize(&refs(&records));
        assert_eq!(summary.total_records, 5);
        assert_eq!(summary.municipalities, 3);
        assert_eq!(summary.heavy_metals, 2);
        assert_eq!(summary.years, Some(YearRange { min: 2010, max: 2012 }));

        let empty = summarize(&[]);
        assert_eq!(empty.total_records, 0);
        assert_eq!(empty.years, None);
    }
}
