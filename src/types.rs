use calamine::Data;
use chrono::NaiveDate;
use serde::Serialize;
use tabled::Tabled;

/// A worksheet as read from disk: trimmed header texts plus raw cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// File name the sheet was read from.
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Data>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column index by header name: exact match first, then ignoring case.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| {
                let lower = name.to_lowercase();
                self.headers.iter().position(|h| h.to_lowercase() == lower)
            })
    }

    pub fn cell(&self, row: usize, col: Option<usize>) -> &Data {
        static EMPTY: Data = Data::Empty;
        col.and_then(|c| self.rows.get(row).and_then(|r| r.get(c)))
            .unwrap_or(&EMPTY)
    }
}

/// One period row of the "Serviços por Ano" planning sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningYearRecord {
    pub date: Option<NaiveDate>,
    pub planned_network_length: f64,
    pub planned_connections: f64,
    /// Taken from the sheet (or pre-computed over the whole sheet at load
    /// time); never recomputed after filtering.
    pub cumulative_planned_network_length: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanningBasinRecord {
    pub month_label: String,
    /// One value per entry of `PlanningBasinTable::categories`.
    pub values: Vec<f64>,
}

/// The "Planejamento Físico Bacias" sheet: a month label plus one
/// free-text-labelled numeric column per planning category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanningBasinTable {
    pub categories: Vec<String>,
    pub records: Vec<PlanningBasinRecord>,
}

impl PlanningBasinTable {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() || self.records.is_empty()
    }

    /// Sum of one category column over every month.
    pub fn category_total(&self, idx: usize) -> f64 {
        self.records
            .iter()
            .filter_map(|r| r.values.get(idx))
            .fold(0.0, |acc, v| acc + v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionTaskRecord {
    pub date: Option<NaiveDate>,
    pub executed_network_length: f64,
    pub executed_connections: f64,
    pub basin_label: String,
    pub sub_basin_label: Option<String>,
    /// File name of the workbook the row came from.
    pub source: String,
}

/// Everything the dashboard needs, loaded once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub planning_years: Vec<PlanningYearRecord>,
    pub planning_basins: PlanningBasinTable,
    pub execution: Vec<ExecutionTaskRecord>,
}

impl Dataset {
    /// True when there is nothing at all to show.
    pub fn is_empty(&self) -> bool {
        self.planning_years.is_empty()
            && self.planning_basins.is_empty()
            && self.execution.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodTotals {
    pub planned_network_length: f64,
    pub planned_connections: f64,
    pub executed_network_length: f64,
    pub executed_connections: f64,
    pub physical_advance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedPoint {
    pub date: NaiveDate,
    pub cumulative: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedPoint {
    /// First day of the month.
    pub month: NaiveDate,
    pub monthly: f64,
    pub cumulative: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SCurve {
    pub planned: Vec<PlannedPoint>,
    pub executed: Vec<ExecutedPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasinComparisonRow {
    pub basin: String,
    pub planned_total: f64,
    pub executed_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdownRow {
    pub category: String,
    pub basin: String,
    pub planned_total: f64,
    pub executed_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasinSummaryRow {
    pub basin: String,
    pub executed_network_length: f64,
    pub executed_connections: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub selected_basins: Vec<String>,
    pub totals: PeriodTotals,
    pub s_curve: SCurve,
    pub basin_comparison: Vec<BasinComparisonRow>,
    pub category_breakdown: Vec<CategoryBreakdownRow>,
    pub basin_summary: Vec<BasinSummaryRow>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SCurveTableRow {
    #[serde(rename = "Mes")]
    #[tabled(rename = "Mês")]
    pub month: String,
    #[serde(rename = "PrevistoAcumulado")]
    #[tabled(rename = "Previsto Acum.")]
    pub planned_cumulative: String,
    #[serde(rename = "ExecutadoMes")]
    #[tabled(rename = "Executado Mês")]
    pub executed_monthly: String,
    #[serde(rename = "ExecutadoAcumulado")]
    #[tabled(rename = "Executado Acum.")]
    pub executed_cumulative: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BasinComparisonTableRow {
    #[serde(rename = "Bacia")]
    #[tabled(rename = "Bacia")]
    pub basin: String,
    #[serde(rename = "Previsto")]
    #[tabled(rename = "Previsto")]
    pub planned: String,
    #[serde(rename = "Executado")]
    #[tabled(rename = "Executado")]
    pub executed: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CategoryTableRow {
    #[serde(rename = "Categoria")]
    #[tabled(rename = "Categoria")]
    pub category: String,
    #[serde(rename = "Bacia")]
    #[tabled(rename = "Bacia")]
    pub basin: String,
    #[serde(rename = "Previsto")]
    #[tabled(rename = "Previsto")]
    pub planned: String,
    #[serde(rename = "Executado")]
    #[tabled(rename = "Executado")]
    pub executed: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct BasinSummaryTableRow {
    #[serde(rename = "Bacia")]
    #[tabled(rename = "Bacia")]
    pub basin: String,
    #[serde(rename = "Extensao_m")]
    #[tabled(rename = "Extensão (m)")]
    pub length: String,
    #[serde(rename = "Ligacoes_und")]
    #[tabled(rename = "Ligações (und)")]
    pub connections: String,
}
