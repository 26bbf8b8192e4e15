use crate::classify::{grouped_labels, Variant, NO_BASIN_PLACEHOLDER};
use crate::error::ConfigError;
use crate::types::{ExecutionTaskRecord, PlanningYearRecord};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Closed date interval, both ends inclusive, compared by day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Undated records never fall inside a range.
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        date.is_some_and(|d| d >= self.start && d <= self.end)
    }
}

/// Basins picked by the user. An empty selection means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasinSelection(BTreeSet<String>);

impl BasinSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn admits(&self, label: &str) -> bool {
        self.0.is_empty() || self.0.contains(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for BasinSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .map(|s: String| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

pub fn filter_planning(rows: &[PlanningYearRecord], range: &DateRange) -> Vec<PlanningYearRecord> {
    rows.iter()
        .filter(|r| range.contains(r.date))
        .cloned()
        .collect()
}

pub fn filter_execution(
    rows: &[ExecutionTaskRecord],
    range: &DateRange,
    basins: &BasinSelection,
) -> Vec<ExecutionTaskRecord> {
    rows.iter()
        .filter(|r| range.contains(r.date) && basins.admits(&r.basin_label))
        .cloned()
        .collect()
}

/// Labels offered in the basin picker.
///
/// Grouped: the canonical basins present in the data, in canonical order
/// (all of them when nothing was loaded). Small: the sorted distinct labels,
/// or a placeholder when there are none.
pub fn available_basins(variant: Variant, rows: &[ExecutionTaskRecord]) -> Vec<String> {
    let present: BTreeSet<&str> = rows.iter().map(|r| r.basin_label.as_str()).collect();
    match variant {
        Variant::Grouped => {
            let labels: Vec<String> = grouped_labels()
                .filter(|l| present.contains(l))
                .map(str::to_string)
                .collect();
            if labels.is_empty() {
                grouped_labels().map(str::to_string).collect()
            } else {
                labels
            }
        }
        Variant::Small if present.is_empty() => vec![NO_BASIN_PLACEHOLDER.to_string()],
        Variant::Small => present.into_iter().map(str::to_string).collect(),
    }
}
