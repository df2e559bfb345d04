pub mod normalize;
pub mod select;
pub mod source;

use serde::Serialize;

/// One reporting period as offered to the user.
///
/// `id` is the opaque server-side identifier; `label` is the human-readable
/// range description (e.g. "July 2024 to June 2025"). Duplicate ids are kept
/// in arrival order; normalization guarantees `id` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodRecord {
    pub id: String,
    pub label: String,
}

/// The from/to pair chosen for an upload. An empty string means the slot is
/// still unselected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodSelection {
    pub from_period_id: String,
    pub to_period_id: String,
}

impl PeriodSelection {
    pub fn is_complete(&self) -> bool {
        !self.from_period_id.is_empty() && !self.to_period_id.is_empty()
    }
}
