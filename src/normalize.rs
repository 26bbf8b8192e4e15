// Turns raw worksheet cells into typed records.
//
// Nothing in here fails: unparseable dates become `None`, unparseable or
// missing numbers become 0, missing basins become "N/A".
use crate::classify::{assign_basin, Variant};
use crate::types::{
    ExecutionTaskRecord, PlanningBasinRecord, PlanningBasinTable, PlanningYearRecord, RawTable,
};
use crate::util::{excel_datetime_to_date, excel_serial_to_date, parse_date_safe, parse_f64_safe};
use calamine::Data;
use chrono::NaiveDate;

pub const COL_DATE: &str = "Data";
pub const COL_PLAN_LENGTH: &str = "Rede";
pub const COL_PLAN_CONNECTIONS: &str = "Ligações";
pub const COL_PLAN_CUMULATIVE: &str = "Rede Acumulado";
pub const COL_MONTH: &str = "Mês";
pub const COL_EXEC_LENGTH: &str = "Extensão (m)";
pub const COL_EXEC_CONNECTIONS: &str = "Ligações (und)";
pub const COL_BASIN: &str = "Bacia";
pub const COL_SUB_BASIN: &str = "Sub Bacia";

pub fn cell_to_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => excel_datetime_to_date(dt),
        Data::Float(f) => excel_serial_to_date(*f),
        Data::Int(i) => excel_serial_to_date(*i as f64),
        Data::DateTimeIso(s) | Data::String(s) => parse_date_safe(Some(s.as_str())),
        _ => None,
    }
}

/// Numeric value of a cell, never negative; 0 when it cannot be read.
pub fn cell_to_f64(cell: &Data) -> f64 {
    let v = match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::Bool(b) => f64::from(u8::from(*b)),
        Data::String(s) => parse_f64_safe(Some(s.as_str())).unwrap_or(0.0),
        _ => 0.0,
    };
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Text of a cell; `None` for blanks.
pub fn cell_to_text(cell: &Data) -> Option<String> {
    let s = match cell {
        Data::Empty => return None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{:.0}", f),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match excel_datetime_to_date(dt) {
            Some(d) => d.to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::Error(e) => format!("{:?}", e),
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Rows of the "Serviços por Ano" sheet.
///
/// Missing "Data" falls back to the first column and missing "Rede" to the
/// second. Without a "Rede Acumulado" column the cumulative is computed here,
/// once, over the whole sheet in date order.
pub fn planning_years(table: &RawTable) -> Vec<PlanningYearRecord> {
    if table.is_empty() || table.headers.is_empty() {
        return Vec::new();
    }
    let date_col = table.column(COL_DATE).or(Some(0));
    let length_col = table
        .column(COL_PLAN_LENGTH)
        .or_else(|| (table.headers.len() > 1).then_some(1));
    let conn_col = table.column(COL_PLAN_CONNECTIONS);
    let cum_col = table.column(COL_PLAN_CUMULATIVE);

    let mut records: Vec<PlanningYearRecord> = (0..table.rows.len())
        .map(|i| PlanningYearRecord {
            date: cell_to_date(table.cell(i, date_col)),
            planned_network_length: cell_to_f64(table.cell(i, length_col)),
            planned_connections: cell_to_f64(table.cell(i, conn_col)),
            cumulative_planned_network_length: cell_to_f64(table.cell(i, cum_col)),
        })
        .collect();

    if cum_col.is_none() {
        fill_cumulative(&mut records);
    }
    records
}

fn fill_cumulative(records: &mut [PlanningYearRecord]) {
    let mut order: Vec<usize> = (0..records.len()).collect();
    // Undated rows go last; they never pass a date filter anyway.
    order.sort_by_key(|&i| (records[i].date.is_none(), records[i].date));
    let mut running = 0.0;
    for i in order {
        running += records[i].planned_network_length;
        records[i].cumulative_planned_network_length = running;
    }
}

/// The "Planejamento Físico Bacias" sheet: "Mês" plus one numeric column per
/// planning category. Columns with a blank header are ignored.
pub fn planning_basins(table: &RawTable) -> PlanningBasinTable {
    let month_col = table.column(COL_MONTH);
    let category_cols: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(i, h)| Some(*i) != month_col && !h.is_empty())
        .map(|(i, _)| i)
        .collect();

    let categories = category_cols
        .iter()
        .map(|&i| table.headers[i].clone())
        .collect();
    let records = (0..table.rows.len())
        .map(|r| PlanningBasinRecord {
            month_label: cell_to_text(table.cell(r, month_col)).unwrap_or_default(),
            values: category_cols
                .iter()
                .map(|&c| cell_to_f64(table.cell(r, Some(c))))
                .collect(),
        })
        .collect();
    PlanningBasinTable {
        categories,
        records,
    }
}

/// Rows of one execution workbook, with the basin assigned per `variant`.
pub fn execution_tasks(table: &RawTable, variant: Variant) -> Vec<ExecutionTaskRecord> {
    let date_col = table.column(COL_DATE);
    let length_col = table.column(COL_EXEC_LENGTH);
    let conn_col = table.column(COL_EXEC_CONNECTIONS);
    let basin_col = table.column(COL_BASIN);
    let sub_col = table.column(COL_SUB_BASIN);

    (0..table.rows.len())
        .map(|i| {
            let in_sheet = cell_to_text(table.cell(i, basin_col));
            ExecutionTaskRecord {
                date: cell_to_date(table.cell(i, date_col)),
                executed_network_length: cell_to_f64(table.cell(i, length_col)),
                executed_connections: cell_to_f64(table.cell(i, conn_col)).round(),
                basin_label: assign_basin(variant, in_sheet.as_deref(), &table.source),
                sub_basin_label: cell_to_text(table.cell(i, sub_col)),
                source: table.source.clone(),
            }
        })
        .collect()
}
