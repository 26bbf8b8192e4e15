// Basin classification and label reconciliation.
//
// Execution rows get a canonical basin label either straight from their
// "Bacia" column (small variant) or from the name of the workbook they came
// from (grouped variant). Planning columns and sub-basin labels are free text
// and are resolved to those canonical labels by keyword matching.
use crate::types::ExecutionTaskRecord;
use crate::util::fold_ascii;
use clap::ValueEnum;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Deployment variant. Selects the classifier policy and bar ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// One execution workbook; basin read from the "Bacia" column.
    #[default]
    Small,
    /// One workbook per basin; basin inferred from the file name.
    Grouped,
}

/// Which execution column is matched against the canonical basins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchBy {
    #[default]
    Basin,
    SubBasin,
}

pub const MISSING_BASIN: &str = "N/A";
pub const NO_BASIN_PLACEHOLDER: &str = "Sem Bacia Definida";
pub const OTHER_BASIN: &str = "Outras";

struct GroupedBasin {
    label: &'static str,
    keywords: &'static [&'static str],
}

/// Grouped-variant basins in priority and display order. The last entry is
/// the catch-all.
const GROUPED_BASINS: &[GroupedBasin] = &[
    GroupedBasin { label: "Bacia Icaraí", keywords: &["ICARAÍ", "ICARAI"] },
    GroupedBasin { label: "Bacia Barreto", keywords: &["BARRETO"] },
    GroupedBasin { label: "Bacia Sapê", keywords: &["SAPÊ", "SAPE"] },
    GroupedBasin { label: OTHER_BASIN, keywords: &[] },
];

pub fn grouped_labels() -> impl Iterator<Item = &'static str> {
    GROUPED_BASINS.iter().map(|b| b.label)
}

/// Pick the grouped basin for a workbook from its file name (the directory
/// part is ignored). First keyword hit in priority order wins.
pub fn classify_filename(path: &str) -> &'static str {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_uppercase())
        .unwrap_or_else(|| path.to_uppercase());
    GROUPED_BASINS
        .iter()
        .find(|b| b.keywords.iter().any(|k| name.contains(k)))
        .map(|b| b.label)
        .unwrap_or(OTHER_BASIN)
}

/// Basin label for one execution row.
///
/// The grouped variant stamps the file's basin on every row and ignores the
/// in-sheet value.
pub fn assign_basin(variant: Variant, in_sheet: Option<&str>, source: &str) -> String {
    match variant {
        Variant::Small => in_sheet
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(MISSING_BASIN)
            .to_string(),
        Variant::Grouped => classify_filename(source).to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalBasin {
    pub label: String,
    /// Lowercased; includes the ASCII-folded spelling.
    keywords: Vec<String>,
}

impl CanonicalBasin {
    fn new<I, S>(label: &str, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kws: Vec<String> = Vec::new();
        for k in keywords {
            let k = k.as_ref().trim();
            if k.is_empty() {
                continue;
            }
            for candidate in [k.to_lowercase(), fold_ascii(k)] {
                if !kws.contains(&candidate) {
                    kws.push(candidate);
                }
            }
        }
        Self {
            label: label.to_string(),
            keywords: kws,
        }
    }

    fn is_exactly(&self, text: &str) -> bool {
        self.label.trim().to_lowercase() == text.trim().to_lowercase()
    }

    fn appears_in(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

/// Ordered canonical basins plus the matching rule that maps free text onto
/// them.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciler {
    basins: Vec<CanonicalBasin>,
}

impl Reconciler {
    pub fn grouped() -> Self {
        let basins = GROUPED_BASINS
            .iter()
            .map(|b| CanonicalBasin::new(b.label, b.keywords.iter()))
            .collect();
        Self { basins }
    }

    /// Small variant: each detected label is its own keyword.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let basins = labels
            .into_iter()
            .map(|l| CanonicalBasin::new(l.as_ref(), [l.as_ref()]))
            .collect();
        Self { basins }
    }

    pub fn for_variant(variant: Variant, execution: &[ExecutionTaskRecord]) -> Self {
        match variant {
            Variant::Grouped => Self::grouped(),
            Variant::Small => {
                let labels: BTreeSet<&str> =
                    execution.iter().map(|r| r.basin_label.as_str()).collect();
                Self::from_labels(labels)
            }
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.basins.iter().map(|b| b.label.as_str())
    }

    /// Canonical label for a piece of free text.
    ///
    /// An exact (case-insensitive) label match wins outright; otherwise the
    /// first basin whose keyword is a substring of the text. `None` means the
    /// text belongs to no basin and is dropped from per-basin totals.
    pub fn resolve(&self, text: &str) -> Option<&str> {
        if text.trim().is_empty() {
            return None;
        }
        self.basins
            .iter()
            .find(|b| b.is_exactly(text))
            .or_else(|| self.basins.iter().find(|b| b.appears_in(text)))
            .map(|b| b.label.as_str())
    }
}
