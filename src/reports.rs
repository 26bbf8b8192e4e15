use crate::classify::{MatchBy, Reconciler, Variant};
use crate::error::DashboardError;
use crate::filter::{filter_execution, filter_planning, BasinSelection, DateRange};
use crate::types::{
    BasinComparisonRow, BasinSummaryRow, CategoryBreakdownRow, DashboardReport, Dataset,
    ExecutedPoint, ExecutionTaskRecord, PeriodTotals, PlannedPoint, PlanningBasinTable,
    PlanningYearRecord, SCurve,
};
use crate::util::month_start;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Executed over planned length, in percent. Zero when nothing is planned.
pub fn physical_advance(executed: f64, planned: f64) -> f64 {
    if planned > 0.0 {
        executed / planned * 100.0
    } else {
        0.0
    }
}

pub fn period_totals(plan: &[PlanningYearRecord], exec: &[ExecutionTaskRecord]) -> PeriodTotals {
    // Fold from +0.0: summing no floats yields -0.0.
    let planned_network_length = plan.iter().fold(0.0, |acc, r| acc + r.planned_network_length);
    let planned_connections = plan.iter().fold(0.0, |acc, r| acc + r.planned_connections);
    let executed_network_length = exec.iter().fold(0.0, |acc, r| acc + r.executed_network_length);
    let executed_connections = exec.iter().fold(0.0, |acc, r| acc + r.executed_connections);
    PeriodTotals {
        planned_network_length,
        planned_connections,
        executed_network_length,
        executed_connections,
        physical_advance_pct: physical_advance(executed_network_length, planned_network_length),
    }
}

/// Planned curve: the sheet's own cumulative column, sorted by date.
/// Executed curve: monthly sums of the filtered rows, accumulated from zero.
pub fn cumulative_series(plan: &[PlanningYearRecord], exec: &[ExecutionTaskRecord]) -> SCurve {
    let mut planned: Vec<PlannedPoint> = plan
        .iter()
        .filter_map(|r| {
            r.date.map(|date| PlannedPoint {
                date,
                cumulative: r.cumulative_planned_network_length,
            })
        })
        .collect();
    planned.sort_by_key(|p| p.date);

    let mut monthly: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for r in exec {
        if let Some(d) = r.date {
            *monthly.entry(month_start(d)).or_insert(0.0) += r.executed_network_length;
        }
    }
    let mut running = 0.0;
    let executed = monthly
        .into_iter()
        .map(|(month, sum)| {
            running += sum;
            ExecutedPoint {
                month,
                monthly: sum,
                cumulative: running,
            }
        })
        .collect();

    SCurve { planned, executed }
}

/// Sum of each planning category column, attributed to its canonical basin.
/// Categories that match no basin are dropped.
fn planned_by_basin<'r>(
    planning: &PlanningBasinTable,
    reconciler: &'r Reconciler,
) -> HashMap<&'r str, f64> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for (idx, category) in planning.categories.iter().enumerate() {
        match reconciler.resolve(category) {
            Some(basin) => *totals.entry(basin).or_insert(0.0) += planning.category_total(idx),
            None => debug!("planning category '{}' matches no basin", category),
        }
    }
    totals
}

/// Canonical basin an execution row counts towards.
fn execution_basin<'r>(
    row: &ExecutionTaskRecord,
    planning: &PlanningBasinTable,
    reconciler: &'r Reconciler,
    match_by: MatchBy,
) -> Option<&'r str> {
    match match_by {
        MatchBy::Basin => reconciler.resolve(&row.basin_label),
        MatchBy::SubBasin => {
            let sub = row.sub_basin_label.as_deref()?.trim();
            if sub.is_empty() {
                return None;
            }
            // Sub-basin names rarely contain the basin name; bridge through
            // the first planning category that mentions the sub-basin.
            reconciler.resolve(sub).or_else(|| {
                let needle = sub.to_lowercase();
                planning
                    .categories
                    .iter()
                    .find(|c| c.to_lowercase().contains(&needle))
                    .and_then(|c| reconciler.resolve(c))
            })
        }
    }
}

/// Planned versus executed length per canonical basin.
///
/// One row per selected basin (every basin when the selection is empty).
/// The small variant orders rows by planned total ascending; the grouped
/// variant keeps the canonical order.
pub fn basin_comparison(
    planning: &PlanningBasinTable,
    exec: &[ExecutionTaskRecord],
    reconciler: &Reconciler,
    selection: &BasinSelection,
    variant: Variant,
    match_by: MatchBy,
) -> Vec<BasinComparisonRow> {
    let planned = planned_by_basin(planning, reconciler);

    let mut executed: HashMap<&str, f64> = HashMap::new();
    for row in exec {
        match execution_basin(row, planning, reconciler, match_by) {
            Some(basin) => *executed.entry(basin).or_insert(0.0) += row.executed_network_length,
            None => debug!(
                "execution row '{}' from {} matches no basin",
                row.basin_label, row.source
            ),
        }
    }

    let mut rows: Vec<BasinComparisonRow> = reconciler
        .labels()
        .filter(|l| selection.admits(l))
        .map(|l| BasinComparisonRow {
            basin: l.to_string(),
            planned_total: planned.get(l).copied().unwrap_or(0.0),
            executed_total: executed.get(l).copied().unwrap_or(0.0),
        })
        .collect();

    if variant == Variant::Small {
        rows.sort_by(|a, b| {
            a.planned_total
                .partial_cmp(&b.planned_total)
                .unwrap_or(Ordering::Equal)
        });
    }
    rows
}

/// Per planning category detail for the selected basins. Executed length is
/// attributed by sub-basin: a row counts towards the first category whose
/// label contains its sub-basin name.
pub fn category_breakdown(
    planning: &PlanningBasinTable,
    exec: &[ExecutionTaskRecord],
    reconciler: &Reconciler,
    selection: &BasinSelection,
) -> Vec<CategoryBreakdownRow> {
    let mut rows: Vec<CategoryBreakdownRow> = planning
        .categories
        .iter()
        .enumerate()
        .filter_map(|(idx, category)| {
            let basin = reconciler.resolve(category)?;
            selection.admits(basin).then(|| CategoryBreakdownRow {
                category: category.clone(),
                basin: basin.to_string(),
                planned_total: planning.category_total(idx),
                executed_total: 0.0,
            })
        })
        .collect();

    let lowered: Vec<String> = rows.iter().map(|r| r.category.to_lowercase()).collect();
    for r in exec {
        let Some(sub) = r.sub_basin_label.as_deref().map(str::trim) else {
            continue;
        };
        if sub.is_empty() {
            continue;
        }
        let needle = sub.to_lowercase();
        if let Some(i) = lowered.iter().position(|c| c.contains(&needle)) {
            rows[i].executed_total += r.executed_network_length;
        }
    }

    rows.sort_by(|a, b| {
        a.planned_total
            .partial_cmp(&b.planned_total)
            .unwrap_or(Ordering::Equal)
    });
    rows
}

/// Executed length and connections per basin label, sorted by label.
pub fn basin_summary(exec: &[ExecutionTaskRecord]) -> Vec<BasinSummaryRow> {
    let mut map: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for r in exec {
        let e = map.entry(r.basin_label.as_str()).or_insert((0.0, 0.0));
        e.0 += r.executed_network_length;
        e.1 += r.executed_connections;
    }
    map.into_iter()
        .map(|(basin, (len, conn))| BasinSummaryRow {
            basin: basin.to_string(),
            executed_network_length: len,
            executed_connections: conn,
        })
        .collect()
}

/// Filter the dataset and compute every dashboard output.
///
/// Fails only when there is no planning and no execution data at all.
pub fn build_report(
    dataset: &Dataset,
    range: &DateRange,
    selection: &BasinSelection,
    variant: Variant,
    match_by: MatchBy,
) -> Result<DashboardReport, DashboardError> {
    if dataset.is_empty() {
        return Err(DashboardError::NoData);
    }
    let plan = filter_planning(&dataset.planning_years, range);
    let exec = filter_execution(&dataset.execution, range, selection);
    let reconciler = Reconciler::for_variant(variant, &dataset.execution);
    debug!(
        planning_rows = plan.len(),
        execution_rows = exec.len(),
        "filters applied"
    );

    Ok(DashboardReport {
        start: range.start(),
        end: range.end(),
        selected_basins: selection.labels().map(str::to_string).collect(),
        totals: period_totals(&plan, &exec),
        s_curve: cumulative_series(&plan, &exec),
        basin_comparison: basin_comparison(
            &dataset.planning_basins,
            &exec,
            &reconciler,
            selection,
            variant,
            match_by,
        ),
        category_breakdown: category_breakdown(
            &dataset.planning_basins,
            &exec,
            &reconciler,
            selection,
        ),
        basin_summary: basin_summary(&exec),
    })
}
