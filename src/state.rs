use crate::data::filter::{filtered_indices, FilterSelection};
use crate::data::model::{Dataset, Dimension, Measurement, YearRange};
use crate::query::{self, ParamStore};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// One user's filter state over the shared, read-only dataset.
///
/// Sessions never share a selection; they only share the dataset and its
/// category cache.
pub struct SessionState<'a> {
    dataset: &'a Dataset,

    /// Current reconciled selection.
    selection: FilterSelection,

    /// Indices of measurements passing the current filters (cached).
    visible_indices: Vec<usize>,
}

impl<'a> SessionState<'a> {
    /// Start with nothing filtered.
    pub fn new(dataset: &'a Dataset) -> Self {
        let selection = FilterSelection::unfiltered(dataset.categories());
        Self::with_selection(dataset, selection)
    }

    /// Restore a session from the host's query parameters.
    pub fn from_params<S: ParamStore + ?Sized>(dataset: &'a Dataset, params: &S) -> Self {
        let selection = query::decode(params, dataset.categories());
        Self::with_selection(dataset, selection)
    }

    fn with_selection(dataset: &'a Dataset, selection: FilterSelection) -> Self {
        let mut state = SessionState {
            dataset,
            selection,
            visible_indices: Vec::new(),
        };
        state.refilter();
        state
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn visible_indices(&self) -> &[usize] {
        &self.visible_indices
    }

    /// Measurements passing the current filters, in dataset order.
    pub fn visible_rows(&self) -> Vec<&'a Measurement> {
        let records = self.dataset.records();
        self.visible_indices.iter().map(|&i| &records[i]).collect()
    }

    /// Recompute `visible_indices` after a selection change.
    pub fn refilter(&mut self) {
        self.visible_indices = filtered_indices(self.dataset, &self.selection);
    }

    /// Toggle a single category value. Values outside the dataset's
    /// categories are ignored.
    pub fn toggle(&mut self, dim: Dimension, value: &str) {
        if !self.dataset.categories().contains(dim, value) {
            log::debug!("Ignoring unknown {dim} value {value:?}");
            return;
        }
        let Some(selected) = self.selection.selected_mut(dim) else {
            return;
        };
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
        self.refilter();
    }

    /// Select every value of a dimension explicitly.
    pub fn select_all(&mut self, dim: Dimension) {
        let Some(all_vals) = self.dataset.categories().values(dim) else {
            return;
        };
        if let Some(selected) = self.selection.selected_mut(dim) {
            *selected = all_vals.clone();
            self.refilter();
        }
    }

    /// Clear a dimension, which lifts its filter.
    pub fn select_none(&mut self, dim: Dimension) {
        if let Some(selected) = self.selection.selected_mut(dim) {
            selected.clear();
            self.refilter();
        }
    }

    /// Set the year range, clamped to the dataset bounds. Ranges that miss
    /// the data entirely are ignored.
    pub fn set_year_range(&mut self, range: YearRange) {
        if let Some(clamped) = range.clamp_to(&self.dataset.categories().year_bounds) {
            self.selection.year_range = clamped;
            self.refilter();
        }
    }

    /// Choose the heavy-metal detail page's metal. Unknown metals clear it.
    pub fn set_heavy_metal_detail(&mut self, metal: Option<&str>) {
        self.selection.heavy_metal_detail = metal
            .filter(|m| self.dataset.categories().heavy_metals.contains(*m))
            .map(str::to_string);
    }

    /// Push the current selection to the host's parameter store.
    pub fn sync_to<S: ParamStore + ?Sized>(&self, store: &mut S) {
        query::write_to_store(&self.selection, store);
    }
}
