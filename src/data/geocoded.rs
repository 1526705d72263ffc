use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::loader::LoadError;

/// Latitude / longitude of a municipality centroid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// One line of `municipalities_geocoded.csv`. Coordinates are blank when the
/// geocoder found nothing.
#[derive(Debug, Deserialize)]
struct GeocodedRow {
    #[serde(rename = "Municipality")]
    municipality: String,
    #[serde(rename = "Latitude")]
    latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    longitude: Option<f64>,
}

/// Municipality → coordinates lookup used by the map page.
#[derive(Debug, Clone, Default)]
pub struct GeocodedTable {
    points: BTreeMap<String, GeoPoint>,
}

impl GeocodedTable {
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (String, GeoPoint)>,
    {
        GeocodedTable {
            points: points.into_iter().collect(),
        }
    }

    pub fn get(&self, municipality: &str) -> Option<GeoPoint> {
        self.points.get(municipality).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Read the geocoded municipalities CSV. Rows without coordinates are skipped.
pub fn load_geocoded(path: &Path) -> Result<GeocodedTable, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let mut points = BTreeMap::new();
    let mut missing = 0usize;
    for result in reader.deserialize::<GeocodedRow>() {
        let row = result?;
        match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => {
                points.insert(row.municipality.trim().to_string(), GeoPoint { latitude, longitude });
            }
            _ => missing += 1,
        }
    }

    if missing > 0 {
        log::warn!("{missing} municipalities in {} have no coordinates", path.display());
    }
    log::info!("Loaded coordinates for {} municipalities", points.len());

    Ok(GeocodedTable { points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_geocoded_skips_blank_coordinates() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "Municipality,Latitude,Longitude").unwrap();
        writeln!(file, "Zurich,47.3769,8.5417").unwrap();
        writeln!(file, "Atlantis,,").unwrap();
        writeln!(file, "Basel,47.5596,7.5886").unwrap();
        file.flush().unwrap();

        let table = load_geocoded(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get("Zurich"),
            Some(GeoPoint { latitude: 47.3769, longitude: 8.5417 })
        );
        assert_eq!(table.get("Atlantis"), None);
    }
}
