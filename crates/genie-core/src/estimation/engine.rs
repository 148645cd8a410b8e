// Use-Case-Point cost estimation.
//
// Converts actor and use-case inventories into man-months and a role-based
// cost breakdown:
//
//   UAW + UUCW = UUCP
//   UCP        = UUCP * TCF * ECF
//   PHM        = UCP * phm_multiplier            (person-hours)
//   ManMonths  = PHM / hours_per_day / days_per_month
//
// Each activity receives `ManMonths * share` of effort, priced at the
// monthly rate of its role. Warranty is added to the total effort cost and
// tax is charged on that subtotal.
//
// The whole breakdown is rebuilt on every call; there is no incremental
// path.

use serde::Serialize;
use tracing::debug;

use crate::config::{Calibration, EstimationConfig, Markup};
use crate::estimation::records::{ActorRecord, UseCaseRecord};
use crate::money::{format_idr, Money};

/// Column headers of a rendered cost breakdown, in their fixed order.
pub const BREAKDOWN_HEADERS: [&str; 6] = [
    "Activity",
    "Effort (%)",
    "Effort (MM)",
    "Role",
    "Rate (IDR)",
    "Cost (IDR)",
];

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Intermediate Use-Case-Point metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UcpMetrics {
    pub uaw: f64,
    pub uucw: f64,
    pub uucp: f64,
    pub ucp: f64,
    /// Person-hours.
    pub phm: f64,
    pub work_days: f64,
    pub man_months: f64,
}

/// Cost of one activity from the effort distribution table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostLine {
    pub activity: String,
    /// Fraction (0..=1) of total effort.
    pub share: f64,
    pub effort_man_months: f64,
    pub role: String,
    pub rate: Money,
    pub cost: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostSummary {
    pub total_effort_cost: Money,
    pub warranty: Money,
    pub subtotal: Money,
    pub tax: Money,
    pub grand_total: Money,
}

/// Which line of a rendered breakdown a row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowKind {
    Activity,
    TotalEffort,
    Warranty,
    Subtotal,
    Tax,
    GrandTotal,
}

/// One rendered row: an activity line or one of the five summary lines.
/// Columns that do not apply to a summary line are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub kind: RowKind,
    pub label: String,
    pub share: Option<f64>,
    pub effort_man_months: Option<f64>,
    pub role: Option<String>,
    pub rate: Option<Money>,
    pub cost: Money,
}

impl BreakdownRow {
    /// Display cells in `BREAKDOWN_HEADERS` order.
    pub fn display_cells(&self) -> Vec<String> {
        let dash = || "-".to_string();
        let effort_digits = if self.kind == RowKind::TotalEffort { 2 } else { 3 };
        vec![
            self.label.clone(),
            self.share.map(format_share).unwrap_or_else(dash),
            self.effort_man_months
                .map(|mm| format!("{mm:.effort_digits$}"))
                .unwrap_or_else(dash),
            self.role.clone().unwrap_or_else(dash),
            self.rate.map(format_idr).unwrap_or_else(dash),
            format_idr(self.cost),
        ]
    }
}

/// Complete result of one estimation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    /// Complexity factors the metrics were computed with.
    pub calibration: Calibration,
    pub metrics: UcpMetrics,
    pub lines: Vec<CostLine>,
    pub summary: CostSummary,
    pub markup: MarkupRates,
}

/// Markup rates the summary was computed with, kept for row labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkupRates {
    pub warranty_rate: f64,
    pub tax_rate: f64,
}

impl From<Markup> for MarkupRates {
    fn from(m: Markup) -> Self {
        Self {
            warranty_rate: m.warranty_rate,
            tax_rate: m.tax_rate,
        }
    }
}

impl Estimate {
    /// Activity rows followed by Total Effort, Warranty, Sub Total, Tax and
    /// Grand Total.
    pub fn rows(&self) -> Vec<BreakdownRow> {
        let mut rows: Vec<BreakdownRow> = self
            .lines
            .iter()
            .map(|line| BreakdownRow {
                kind: RowKind::Activity,
                label: line.activity.clone(),
                share: Some(line.share),
                effort_man_months: Some(line.effort_man_months),
                role: Some(line.role.clone()),
                rate: Some(line.rate),
                cost: line.cost,
            })
            .collect();

        let total_share: f64 = self.lines.iter().map(|l| l.share).sum();
        let summary_row = |kind, label: String, cost| BreakdownRow {
            kind,
            label,
            share: None,
            effort_man_months: None,
            role: None,
            rate: None,
            cost,
        };

        rows.push(BreakdownRow {
            share: Some(total_share),
            effort_man_months: Some(self.metrics.man_months),
            ..summary_row(
                RowKind::TotalEffort,
                "Total Effort Cost".to_string(),
                self.summary.total_effort_cost,
            )
        });
        rows.push(summary_row(
            RowKind::Warranty,
            format!("Warranty ({})", format_rate_label(self.markup.warranty_rate)),
            self.summary.warranty,
        ));
        rows.push(summary_row(
            RowKind::Subtotal,
            "Sub Total".to_string(),
            self.summary.subtotal,
        ));
        rows.push(summary_row(
            RowKind::Tax,
            format!("PPN ({})", format_rate_label(self.markup.tax_rate)),
            self.summary.tax,
        ));
        rows.push(summary_row(
            RowKind::GrandTotal,
            "TOTAL BIAYA (RAB)".to_string(),
            self.summary.grand_total,
        ));
        rows
    }

    /// Display rows, ready to drop into a document table.
    pub fn table_rows(&self) -> Vec<Vec<String>> {
        self.rows().iter().map(BreakdownRow::display_cells).collect()
    }
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Compute UAW through man-months.
///
/// Empty inventories yield zero for every metric.
pub fn compute_metrics(
    actors: &[ActorRecord],
    use_cases: &[UseCaseRecord],
    config: &EstimationConfig,
) -> UcpMetrics {
    let uaw: f64 = actors.iter().map(|a| a.weight).sum();
    let uucw: f64 = use_cases.iter().map(|u| u.weight).sum();
    let uucp = uaw + uucw;
    let ucp = uucp * config.calibration.tcf * config.calibration.ecf;
    let phm = ucp * config.workload.phm_multiplier;
    let work_days = phm / config.workload.hours_per_day;
    let man_months = work_days / config.workload.days_per_month;

    UcpMetrics {
        uaw,
        uucw,
        uucp,
        ucp,
        phm,
        work_days,
        man_months,
    }
}

/// Spread `man_months` over the effort distribution table and price each
/// activity at its role's monthly rate.
///
/// A role missing from the rate table prices at zero; validated configs
/// never contain one.
pub fn distribute_cost(man_months: f64, config: &EstimationConfig) -> Vec<CostLine> {
    config
        .activities
        .iter()
        .map(|activity| {
            let effort_man_months = man_months * activity.share;
            let rate = config.rate_for(&activity.role).unwrap_or(Money::ZERO);
            let cost = Money::from_major_f64(effort_man_months * rate.as_major_f64());
            CostLine {
                activity: activity.name.clone(),
                share: activity.share,
                effort_man_months,
                role: activity.role.clone(),
                rate,
                cost,
            }
        })
        .collect()
}

/// Total the activity costs, then add warranty and tax in that order.
pub fn summarize(lines: &[CostLine], markup: &Markup) -> CostSummary {
    let total_effort_cost: Money = lines.iter().map(|l| l.cost).sum();
    let warranty = total_effort_cost.scale(markup.warranty_rate);
    let subtotal = total_effort_cost + warranty;
    let tax = subtotal.scale(markup.tax_rate);
    let grand_total = subtotal + tax;

    CostSummary {
        total_effort_cost,
        warranty,
        subtotal,
        tax,
        grand_total,
    }
}

/// Run the full estimation pipeline. Pure and deterministic: identical
/// inputs always produce identical output.
pub fn estimate(
    actors: &[ActorRecord],
    use_cases: &[UseCaseRecord],
    config: &EstimationConfig,
) -> Estimate {
    let metrics = compute_metrics(actors, use_cases, config);
    let lines = distribute_cost(metrics.man_months, config);
    let summary = summarize(&lines, &config.markup);

    debug!(
        actors = actors.len(),
        use_cases = use_cases.len(),
        ucp = metrics.ucp,
        man_months = metrics.man_months,
        grand_total = summary.grand_total.minor(),
        "estimate recomputed"
    );

    Estimate {
        calibration: config.calibration,
        metrics,
        lines,
        summary,
        markup: config.markup.into(),
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// `0.016` -> `1.6%`.
pub fn format_share(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

/// `0.25` -> `25%`, `0.115` -> `11.5%`.
fn format_rate_label(rate: f64) -> String {
    let pct = rate * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("{pct:.0}%")
    } else {
        format!("{pct:.1}%")
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
