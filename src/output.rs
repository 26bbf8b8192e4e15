use crate::error::DashboardError;
use crate::types::{
    BasinComparisonRow, BasinComparisonTableRow, BasinSummaryRow, BasinSummaryTableRow,
    CategoryBreakdownRow, CategoryTableRow, DashboardReport, PeriodTotals, SCurve,
    SCurveTableRow,
};
use crate::util::{format_date_br, format_number, format_pct};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

pub const S_CURVE_FILE: &str = "curva_s.csv";
pub const COMPARISON_FILE: &str = "comparativo_bacias.csv";
pub const CATEGORY_FILE: &str = "categorias_planejamento.csv";
pub const SUMMARY_FILE: &str = "resumo_bacias.csv";
pub const JSON_FILE: &str = "resumo.json";

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn Error>> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn print_table<T>(title: &str, rows: &[T])
where
    T: Tabled + Clone,
{
    println!("{}\n", title);
    if rows.is_empty() {
        println!("(sem dados)\n");
        return;
    }
    let table_str = Table::new(rows.to_vec()).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

pub fn header_line(report: &DashboardReport) -> String {
    let basins = if report.selected_basins.is_empty() {
        "Todas".to_string()
    } else {
        report.selected_basins.join(", ")
    };
    format!(
        "Período: {} a {} | Bacias: {}",
        format_date_br(report.start),
        format_date_br(report.end),
        basins
    )
}

pub fn metric_lines(t: &PeriodTotals) -> Vec<(&'static str, String)> {
    vec![
        ("Previsto Rede (Período)", format_number(t.planned_network_length, 0)),
        ("Previsto LNE (Período)", format_number(t.planned_connections, 0)),
        ("Avanço Físico", format_pct(t.physical_advance_pct)),
        ("Executado Rede", format_number(t.executed_network_length, 0)),
        ("Executado LNE", format_number(t.executed_connections, 0)),
    ]
}

/// Both curves on one date axis; a dash where a curve has no point.
pub fn s_curve_rows(curve: &SCurve) -> Vec<SCurveTableRow> {
    let mut axis: BTreeMap<NaiveDate, (Option<f64>, Option<(f64, f64)>)> = BTreeMap::new();
    for p in &curve.planned {
        axis.entry(p.date).or_default().0 = Some(p.cumulative);
    }
    for p in &curve.executed {
        axis.entry(p.month).or_default().1 = Some((p.monthly, p.cumulative));
    }
    let dash = || "-".to_string();
    axis.into_iter()
        .map(|(date, (planned, executed))| SCurveTableRow {
            month: format_date_br(date),
            planned_cumulative: planned.map_or_else(dash, |v| format_number(v, 0)),
            executed_monthly: executed.map_or_else(dash, |(m, _)| format_number(m, 0)),
            executed_cumulative: executed.map_or_else(dash, |(_, c)| format_number(c, 0)),
        })
        .collect()
}

pub fn comparison_rows(rows: &[BasinComparisonRow]) -> Vec<BasinComparisonTableRow> {
    rows.iter()
        .map(|r| BasinComparisonTableRow {
            basin: r.basin.clone(),
            planned: format_number(r.planned_total, 0),
            executed: format_number(r.executed_total, 0),
        })
        .collect()
}

pub fn category_rows(rows: &[CategoryBreakdownRow]) -> Vec<CategoryTableRow> {
    rows.iter()
        .map(|r| CategoryTableRow {
            category: r.category.clone(),
            basin: r.basin.clone(),
            planned: format_number(r.planned_total, 0),
            executed: format_number(r.executed_total, 0),
        })
        .collect()
}

pub fn summary_rows(rows: &[BasinSummaryRow]) -> Vec<BasinSummaryTableRow> {
    rows.iter()
        .map(|r| BasinSummaryTableRow {
            basin: r.basin.clone(),
            length: format_number(r.executed_network_length, 2),
            connections: format_number(r.executed_connections, 0),
        })
        .collect()
}

pub fn print_report(report: &DashboardReport) {
    println!("Universalização | Visão Geral");
    println!("{}", header_line(report));
    println!("---");
    for (label, value) in metric_lines(&report.totals) {
        println!("{:<26} {}", label, value);
    }
    println!("---\n");

    print_table("Evolução Acumulada (Período Selecionado)", &s_curve_rows(&report.s_curve));
    print_table("Extensão de Rede por Bacia", &comparison_rows(&report.basin_comparison));
    print_table(
        "Extensão de Rede por Categoria de Planejamento",
        &category_rows(&report.category_breakdown),
    );

    if report.basin_summary.is_empty() {
        println!("Resumo Executado por Bacia\n");
        println!("Nenhum dado executado encontrado para os filtros selecionados.\n");
    } else {
        print_table("Resumo Executado por Bacia", &summary_rows(&report.basin_summary));
    }
}

fn export_step<F>(path: PathBuf, write: F) -> Result<PathBuf, DashboardError>
where
    F: FnOnce(&Path) -> Result<(), Box<dyn Error>>,
{
    write(&path).map_err(|e| DashboardError::Export {
        path: path.clone(),
        message: e.to_string(),
    })?;
    Ok(path)
}

/// Write every table plus the JSON bundle into `out_dir`.
pub fn export_report(report: &DashboardReport, out_dir: &Path) -> Result<Vec<PathBuf>, DashboardError> {
    std::fs::create_dir_all(out_dir)?;
    Ok(vec![
        export_step(out_dir.join(S_CURVE_FILE), |p| {
            write_csv(p, &s_curve_rows(&report.s_curve))
        })?,
        export_step(out_dir.join(COMPARISON_FILE), |p| {
            write_csv(p, &comparison_rows(&report.basin_comparison))
        })?,
        export_step(out_dir.join(CATEGORY_FILE), |p| {
            write_csv(p, &category_rows(&report.category_breakdown))
        })?,
        export_step(out_dir.join(SUMMARY_FILE), |p| {
            write_csv(p, &summary_rows(&report.basin_summary))
        })?,
        export_step(out_dir.join(JSON_FILE), |p| write_json(p, report))?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExecutedPoint, PlannedPoint};
    use tempfile::tempdir;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn report() -> DashboardReport {
        DashboardReport {
            start: ymd(2025, 1, 1),
            end: ymd(2025, 2, 28),
            selected_basins: vec![],
            totals: PeriodTotals {
                planned_network_length: 12_500.0,
                planned_connections: 340.0,
                executed_network_length: 150.0,
                executed_connections: 4.0,
                physical_advance_pct: 1.2,
            },
            s_curve: SCurve {
                planned: vec![
                    PlannedPoint { date: ymd(2025, 1, 1), cumulative: 6000.0 },
                    PlannedPoint { date: ymd(2025, 2, 1), cumulative: 12_500.0 },
                ],
                executed: vec![
                    ExecutedPoint { month: ymd(2025, 1, 1), monthly: 100.0, cumulative: 100.0 },
                    ExecutedPoint { month: ymd(2025, 3, 1), monthly: 50.0, cumulative: 150.0 },
                ],
            },
            basin_comparison: vec![BasinComparisonRow {
                basin: "Bacia Barreto".into(),
                planned_total: 500.0,
                executed_total: 150.0,
            }],
            category_breakdown: vec![],
            basin_summary: vec![BasinSummaryRow {
                basin: "Bacia Barreto".into(),
                executed_network_length: 1234.5,
                executed_connections: 4.0,
            }],
        }
    }

    #[test]
    fn header_names_all_basins_when_none_selected() {
        let mut r = report();
        assert_eq!(header_line(&r), "Período: 01/01/2025 a 28/02/2025 | Bacias: Todas");
        r.selected_basins = vec!["Icaraí".into(), "Sapê".into()];
        assert!(header_line(&r).ends_with("Bacias: Icaraí, Sapê"));
    }

    #[test]
    fn metrics_use_pt_br_formatting() {
        let lines = metric_lines(&report().totals);
        assert_eq!(lines[0], ("Previsto Rede (Período)", "12.500".to_string()));
        assert_eq!(lines[2].1, "1,20%");
    }

    #[test]
    fn s_curve_rows_merge_both_axes() {
        let rows = s_curve_rows(&report().s_curve);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].planned_cumulative, "6.000");
        assert_eq!(rows[0].executed_cumulative, "100");
        assert_eq!(rows[1].executed_monthly, "-");
        assert_eq!(rows[2].planned_cumulative, "-");
        assert_eq!(rows[2].executed_cumulative, "150");
    }

    #[test]
    fn summary_rows_keep_two_decimals_for_length() {
        let rows = summary_rows(&report().basin_summary);
        assert_eq!(rows[0].length, "1.234,50");
        assert_eq!(rows[0].connections, "4");
    }

    #[test]
    fn export_writes_every_file() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("saida");
        let written = export_report(&report(), &out).unwrap();
        assert_eq!(written.len(), 5);
        for p in &written {
            assert!(p.is_file(), "{} missing", p.display());
        }
        let csv_text = std::fs::read_to_string(out.join(COMPARISON_FILE)).unwrap();
        assert!(csv_text.starts_with("Bacia,Previsto,Executado"));
        assert!(csv_text.contains("Bacia Barreto,500,150"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(JSON_FILE)).unwrap()).unwrap();
        assert_eq!(json["totals"]["executed_network_length"], 150.0);
        assert_eq!(json["start"], "2025-01-01");
    }
}
