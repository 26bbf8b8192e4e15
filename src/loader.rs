use crate::classify::Variant;
use crate::error::LoadError;
use crate::normalize::{cell_to_text, execution_tasks, planning_basins, planning_years};
use crate::types::{Dataset, RawTable};
use calamine::{open_workbook_auto, Data, Reader};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// A worksheet name plus the alternative spellings accepted when the primary
/// name is absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetName {
    pub primary: String,
    pub aliases: Vec<String>,
}

impl SheetName {
    pub fn new(primary: &str, aliases: &[&str]) -> Self {
        Self {
            primary: primary.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    fn pick<'a>(&self, available: &'a [String]) -> Option<&'a String> {
        self.candidates().find_map(|c| {
            available
                .iter()
                .find(|n| n.as_str() == c)
                .or_else(|| available.iter().find(|n| n.to_lowercase() == c.to_lowercase()))
        })
    }
}

/// Everything that determines what a load reads. Two equal requests always
/// produce the same dataset, which is what the cache relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadRequest {
    pub planning_path: PathBuf,
    pub planning_year_sheet: SheetName,
    pub planning_basin_sheet: SheetName,
    pub execution_paths: Vec<PathBuf>,
    pub execution_sheet: SheetName,
    pub variant: Variant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub planning_year_rows: usize,
    pub planning_categories: usize,
    pub execution_files_loaded: usize,
    pub execution_files_skipped: usize,
    pub execution_rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub dataset: Dataset,
    pub report: LoadReport,
}

static LOAD_CACHE: Lazy<Mutex<HashMap<LoadRequest, Arc<Loaded>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn table_from_rows<'a, I>(source: String, mut rows: I) -> RawTable
where
    I: Iterator<Item = &'a [Data]>,
{
    let headers = match rows.next() {
        Some(h) => h.iter().map(|c| cell_to_text(c).unwrap_or_default()).collect(),
        None => return RawTable { source, ..RawTable::default() },
    };
    let rows = rows
        .filter(|r| r.iter().any(|c| !matches!(c, Data::Empty)))
        .map(<[Data]>::to_vec)
        .collect();
    RawTable {
        source,
        headers,
        rows,
    }
}

/// Read one sheet; the first row is the header row.
pub fn try_load_sheet(path: &Path, sheet: &SheetName) -> Result<RawTable, LoadError> {
    if !path.is_file() {
        return Err(LoadError::MissingFile(path.to_path_buf()));
    }
    let mut workbook = open_workbook_auto(path).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let names = workbook.sheet_names();
    let name = sheet
        .pick(&names)
        .cloned()
        .ok_or_else(|| LoadError::MissingSheet {
            path: path.to_path_buf(),
            sheet: sheet.primary.clone(),
        })?;
    let range = workbook
        .worksheet_range(&name)
        .map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let table = table_from_rows(file_label(path), range.rows());
    debug!(
        "read {} rows from '{}' in {}",
        table.rows.len(),
        name,
        path.display()
    );
    Ok(table)
}

/// Like [`try_load_sheet`], but any failure becomes an empty table.
pub fn load_sheet(path: &Path, sheet: &SheetName) -> RawTable {
    match try_load_sheet(path, sheet) {
        Ok(t) => t,
        Err(e) => {
            warn!("{}", e);
            RawTable {
                source: file_label(path),
                ..RawTable::default()
            }
        }
    }
}

/// Load every execution workbook that can be read, in input order. Files
/// that fail are skipped with a warning.
pub fn load_execution(paths: &[PathBuf], sheet: &SheetName) -> (Vec<RawTable>, usize) {
    let mut tables = Vec::with_capacity(paths.len());
    let mut skipped = 0usize;
    for path in paths {
        match try_load_sheet(path, sheet) {
            Ok(t) => tables.push(t),
            Err(e) => {
                warn!("skipping execution file: {}", e);
                skipped += 1;
            }
        }
    }
    (tables, skipped)
}

/// Read and normalize everything a request names, bypassing the cache.
pub fn read_dataset(req: &LoadRequest) -> Loaded {
    let plan_years = load_sheet(&req.planning_path, &req.planning_year_sheet);
    let plan_basins = load_sheet(&req.planning_path, &req.planning_basin_sheet);
    let (exec_tables, skipped) = load_execution(&req.execution_paths, &req.execution_sheet);

    let dataset = Dataset {
        planning_years: planning_years(&plan_years),
        planning_basins: planning_basins(&plan_basins),
        execution: exec_tables
            .iter()
            .flat_map(|t| execution_tasks(t, req.variant))
            .collect(),
    };
    let report = LoadReport {
        planning_year_rows: dataset.planning_years.len(),
        planning_categories: dataset.planning_basins.categories.len(),
        execution_files_loaded: exec_tables.len(),
        execution_files_skipped: skipped,
        execution_rows: dataset.execution.len(),
    };
    info!(
        planning_rows = report.planning_year_rows,
        categories = report.planning_categories,
        execution_rows = report.execution_rows,
        "dataset loaded"
    );
    let months = &dataset.planning_basins.records;
    if let (Some(first), Some(last)) = (months.first(), months.last()) {
        debug!("planning basin months: {} to {}", first.month_label, last.month_label);
    }
    Loaded { dataset, report }
}

/// Memoized [`read_dataset`]: a repeated request returns the earlier result
/// without touching the filesystem.
pub fn load_dataset(req: &LoadRequest) -> Arc<Loaded> {
    let mut cache = LOAD_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(hit) = cache.get(req) {
        debug!("load cache hit");
        return Arc::clone(hit);
    }
    let loaded = Arc::new(read_dataset(req));
    cache.insert(req.clone(), Arc::clone(&loaded));
    loaded
}

pub fn clear_cache() {
    LOAD_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}
