use std::sync::OnceLock;

use super::loader::{load_file, LoadError};
use super::model::Dataset;
use crate::config::DashboardConfig;

static DATASET: OnceLock<Dataset> = OnceLock::new();

/// Load the process-wide dataset on first call and return it.
///
/// Later calls return the already-loaded table without touching the file
/// system. If two threads race, both may load but only the first result is
/// kept.
pub fn init(config: &DashboardConfig) -> Result<&'static Dataset, LoadError> {
    if let Some(ds) = DATASET.get() {
        return Ok(ds);
    }
    let dataset = load_file(&config.data_path, &config.columns)?;
    Ok(install(dataset))
}

/// Install an already-built dataset and return the shared one. When a dataset
/// is already installed, `dataset` is dropped and the existing one returned.
pub fn install(dataset: Dataset) -> &'static Dataset {
    DATASET.get_or_init(move || dataset)
}

/// The shared dataset, if it has been initialised.
pub fn get() -> Option<&'static Dataset> {
    DATASET.get()
}
