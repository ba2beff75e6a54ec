//! Report input: the period, the pre-computed variance figures and the visuals
//! to capture.
//!
//! Row records mirror the rows produced by the payroll aggregation layer. They
//! deserialize from snake_case keys as well as from the human-readable labels
//! the dashboard API uses ("Employee ID", "Variance %", ...). Everything is
//! validated once, when the [`ReportContext`] is built; the layout code trusts
//! the values afterwards.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::capture::VisualSource;
use crate::error::ReportError;

/// Marker contained in the name of aggregate rows mixed into employee listings.
pub const DEPARTMENT_TOTAL_SENTINEL: &str = "DEPARTMENT TOTAL";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Reporting period and the length of the historical window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "PeriodInput")]
pub struct Period {
    year: i32,
    month: u32,
    window_months: u32,
}

#[derive(Deserialize)]
struct PeriodInput {
    year: i32,
    month: i64,
    #[serde(alias = "months", default = "default_window")]
    window_months: i64,
}

fn default_window() -> i64 {
    1
}

impl TryFrom<PeriodInput> for Period {
    type Error = ReportError;

    fn try_from(input: PeriodInput) -> Result<Self, Self::Error> {
        Period::new(input.year, input.month, input.window_months)
    }
}

impl Period {
    /// Creates a validated period.
    ///
    /// `month` must be in `1..=12` and `window_months` at least 1; there is no
    /// sensible default for a zero or negative window, so both are rejected.
    pub fn new(year: i32, month: i64, window_months: i64) -> Result<Self, ReportError> {
        if !(1..=12).contains(&month) {
            return Err(ReportError::InvalidContext(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        if window_months < 1 {
            return Err(ReportError::InvalidContext(format!(
                "historical window must be at least one month, got {window_months}"
            )));
        }
        let window_months = u32::try_from(window_months).map_err(|_| {
            ReportError::InvalidContext(format!("historical window {window_months} is too large"))
        })?;
        Ok(Self {
            year,
            month: month as u32,
            window_months,
        })
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month, 1-based.
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Number of months covered by the trend rows.
    pub fn window_months(&self) -> u32 {
        self.window_months
    }

    /// Whether more than the current month was requested.
    pub fn is_historical(&self) -> bool {
        self.window_months > 1
    }

    /// English month name, e.g. `"October"`.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

/// Output filename for a period: `Variance_Report_With_Charts_<year>_<MM>.pdf`.
pub fn report_filename(period: &Period) -> String {
    format!(
        "Variance_Report_With_Charts_{}_{:02}.pdf",
        period.year(),
        period.month()
    )
}

/// Budget-vs-actual figures of one department.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DepartmentRow {
    /// Department name.
    #[serde(alias = "Department")]
    pub department: String,
    /// Budgeted payroll.
    #[serde(alias = "Budget", default)]
    pub budget: f64,
    /// Actual payroll.
    #[serde(alias = "Actual", default)]
    pub actual: f64,
    /// `actual - budget`.
    #[serde(alias = "Variance", default)]
    pub variance: f64,
    /// Variance relative to budget, in percent.
    #[serde(alias = "Variance %", default)]
    pub variance_percent: f64,
}

/// Budget-vs-actual figures of one employee, or a department total pseudo-row.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EmployeeRow {
    /// Employee identifier.
    #[serde(alias = "Employee ID", default)]
    pub employee_id: String,
    /// Display name; contains [`DEPARTMENT_TOTAL_SENTINEL`] on aggregate rows.
    #[serde(alias = "Employee Name")]
    pub employee_name: String,
    /// Department the employee belongs to.
    #[serde(alias = "Department", default)]
    pub department: Option<String>,
    /// Budgeted payroll.
    #[serde(alias = "Budget", default)]
    pub budget: f64,
    /// Actual payroll.
    #[serde(alias = "Actual", default)]
    pub actual: f64,
    /// `actual - budget`.
    #[serde(alias = "Variance", default)]
    pub variance: f64,
    /// Variance relative to budget, in percent.
    #[serde(alias = "Variance %", default)]
    pub variance_percent: f64,
}

impl EmployeeRow {
    /// Whether this row is a department aggregate rather than a person.
    pub fn is_department_total(&self) -> bool {
        self.employee_name.contains(DEPARTMENT_TOTAL_SENTINEL)
    }
}

/// Company-wide totals of one month in the historical window.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TrendRow {
    /// Month label as supplied, e.g. `"2024-03"`.
    #[serde(alias = "Month")]
    pub month: String,
    /// Budgeted payroll.
    #[serde(alias = "Total Budget", default)]
    pub total_budget: f64,
    /// Actual payroll.
    #[serde(alias = "Total Actual", default)]
    pub total_actual: f64,
    /// `total_actual - total_budget`.
    #[serde(alias = "Total Variance", default)]
    pub total_variance: f64,
    /// Variance relative to budget, in percent.
    #[serde(alias = "Variance %", default)]
    pub variance_percent: f64,
}

impl TrendRow {
    /// Builds a row from budget and actual, deriving variance and percent.
    pub fn from_totals(month: impl Into<String>, total_budget: f64, total_actual: f64) -> Self {
        let total_variance = total_actual - total_budget;
        let variance_percent = if total_budget == 0.0 {
            0.0
        } else {
            total_variance / total_budget * 100.0
        };
        Self {
            month: month.into(),
            total_budget,
            total_actual,
            total_variance,
            variance_percent,
        }
    }
}

/// Mean variance over the historical window.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct PeriodAverage {
    /// Mean of the trend rows' variance.
    pub variance: f64,
    /// Mean of the trend rows' variance percent.
    pub variance_percent: f64,
}

impl PeriodAverage {
    /// Arithmetic means over `trends`, or `None` when there are no rows.
    pub fn from_trends(trends: &[TrendRow]) -> Option<Self> {
        if trends.is_empty() {
            return None;
        }
        let count = trends.len() as f64;
        let variance = trends.iter().map(|row| row.total_variance).sum::<f64>() / count;
        let variance_percent = trends.iter().map(|row| row.variance_percent).sum::<f64>() / count;
        Some(Self {
            variance,
            variance_percent,
        })
    }
}

/// Aggregate figures shown in the executive summary.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "SummaryInput")]
pub struct Summary {
    /// Number of employees covered.
    pub employee_count: usize,
    /// Budget of the reporting month.
    pub total_budget: f64,
    /// Actual of the reporting month.
    pub total_actual: f64,
    /// Variance of the reporting month.
    pub total_variance: f64,
    /// Variance percent of the reporting month.
    pub total_variance_percent: f64,
    /// Window averages, present when they were computed.
    pub average: Option<PeriodAverage>,
}

/// Accepts the averages either nested under `average` or as the flat
/// `avgVariance` / `avgVariancePercent` pair the dashboard sends.
#[derive(Deserialize)]
struct SummaryInput {
    #[serde(alias = "totalEmployees", default)]
    employee_count: usize,
    #[serde(alias = "totalBudget", default)]
    total_budget: f64,
    #[serde(alias = "totalActual", default)]
    total_actual: f64,
    #[serde(alias = "totalVariance", default)]
    total_variance: f64,
    #[serde(alias = "totalVariancePercent", default)]
    total_variance_percent: f64,
    #[serde(default)]
    average: Option<PeriodAverage>,
    #[serde(alias = "avgVariance", default)]
    average_variance: Option<f64>,
    #[serde(alias = "avgVariancePercent", default)]
    average_variance_percent: Option<f64>,
}

impl From<SummaryInput> for Summary {
    fn from(input: SummaryInput) -> Self {
        let flat = input
            .average_variance
            .map(|variance| PeriodAverage {
                variance,
                variance_percent: input.average_variance_percent.unwrap_or(0.0),
            });
        Self {
            employee_count: input.employee_count,
            total_budget: input.total_budget,
            total_actual: input.total_actual,
            total_variance: input.total_variance,
            total_variance_percent: input.total_variance_percent,
            average: input.average.or(flat),
        }
    }
}

impl Summary {
    /// Derives the summary from trend rows: totals come from the latest row,
    /// averages span all rows. Returns `None` without trend data.
    pub fn from_trends(trends: &[TrendRow], employee_count: usize) -> Option<Self> {
        let latest = trends.last()?;
        Some(Self {
            employee_count,
            total_budget: latest.total_budget,
            total_actual: latest.total_actual,
            total_variance: latest.total_variance,
            total_variance_percent: latest.variance_percent,
            average: PeriodAverage::from_trends(trends),
        })
    }
}

/// Serializable part of the report input, as produced by the aggregation layer.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ReportData {
    /// Reporting period.
    pub period: Period,
    /// Executive summary; derived from the trend rows when absent.
    #[serde(default)]
    pub summary: Option<Summary>,
    /// Per-department aggregates.
    #[serde(default, alias = "departmentData")]
    pub department_rows: Vec<DepartmentRow>,
    /// Per-employee rows, possibly interleaved with department totals.
    #[serde(default, alias = "employeeData")]
    pub employee_rows: Vec<EmployeeRow>,
    /// One row per month of the historical window.
    #[serde(default, alias = "trends")]
    pub trend_rows: Vec<TrendRow>,
}

impl ReportData {
    /// Parses report data from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A titled reference to an already-rendered visual.
#[derive(Clone)]
pub struct VisualRef {
    title: String,
    source: Arc<dyn VisualSource>,
}

impl VisualRef {
    /// Pairs a title with a visual source.
    pub fn new(title: impl Into<String>, source: Arc<dyn VisualSource>) -> Self {
        Self {
            title: title.into(),
            source,
        }
    }

    /// Title printed above the captured image.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The visual to capture.
    pub fn source(&self) -> &dyn VisualSource {
        self.source.as_ref()
    }
}

impl fmt::Debug for VisualRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualRef")
            .field("title", &self.title)
            .field("source", &self.source.name())
            .finish()
    }
}

/// Validated, immutable input of one export request.
#[derive(Clone, Debug)]
pub struct ReportContext {
    period: Period,
    summary: Option<Summary>,
    department_rows: Vec<DepartmentRow>,
    employee_rows: Vec<EmployeeRow>,
    trend_rows: Vec<TrendRow>,
    visuals: Vec<VisualRef>,
}

impl ReportContext {
    /// Starts building a context for `period`.
    pub fn builder(period: Period) -> ReportContextBuilder {
        ReportContextBuilder::new(period)
    }

    /// Validates deserialized data and attaches the visuals to capture.
    pub fn from_data(data: ReportData, visuals: Vec<VisualRef>) -> Result<Self, ReportError> {
        ReportContextBuilder {
            period: data.period,
            summary: data.summary,
            department_rows: data.department_rows,
            employee_rows: data.employee_rows,
            trend_rows: data.trend_rows,
            visuals,
        }
        .build()
    }

    /// Reporting period.
    pub fn period(&self) -> &Period {
        &self.period
    }

    /// Executive summary figures, if any data was available.
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// All department rows, unfiltered.
    pub fn department_rows(&self) -> &[DepartmentRow] {
        &self.department_rows
    }

    /// All employee rows, including department total pseudo-rows.
    pub fn employee_rows(&self) -> &[EmployeeRow] {
        &self.employee_rows
    }

    /// Employee rows with department total pseudo-rows removed.
    pub fn employee_rows_without_totals(&self) -> impl Iterator<Item = &EmployeeRow> {
        self.employee_rows
            .iter()
            .filter(|row| !row.is_department_total())
    }

    /// Trend rows in chronological order.
    pub fn trend_rows(&self) -> &[TrendRow] {
        &self.trend_rows
    }

    /// Visuals in display order.
    pub fn visuals(&self) -> &[VisualRef] {
        &self.visuals
    }
}

/// Builder for [`ReportContext`] values.
pub struct ReportContextBuilder {
    period: Period,
    summary: Option<Summary>,
    department_rows: Vec<DepartmentRow>,
    employee_rows: Vec<EmployeeRow>,
    trend_rows: Vec<TrendRow>,
    visuals: Vec<VisualRef>,
}

impl ReportContextBuilder {
    /// Creates an empty builder for `period`.
    pub fn new(period: Period) -> Self {
        Self {
            period,
            summary: None,
            department_rows: Vec::new(),
            employee_rows: Vec::new(),
            trend_rows: Vec::new(),
            visuals: Vec::new(),
        }
    }

    /// Sets pre-computed summary figures.
    pub fn summary(mut self, summary: Summary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Sets the department rows.
    pub fn department_rows(mut self, rows: impl Into<Vec<DepartmentRow>>) -> Self {
        self.department_rows = rows.into();
        self
    }

    /// Sets the employee rows.
    pub fn employee_rows(mut self, rows: impl Into<Vec<EmployeeRow>>) -> Self {
        self.employee_rows = rows.into();
        self
    }

    /// Sets the trend rows.
    pub fn trend_rows(mut self, rows: impl Into<Vec<TrendRow>>) -> Self {
        self.trend_rows = rows.into();
        self
    }

    /// Appends a visual to capture.
    pub fn visual(mut self, title: impl Into<String>, source: Arc<dyn VisualSource>) -> Self {
        self.visuals.push(VisualRef::new(title, source));
        self
    }

    /// Validates the collected input and freezes it.
    pub fn build(self) -> Result<ReportContext, ReportError> {
        for row in &self.department_rows {
            if row.department.trim().is_empty() {
                return Err(ReportError::InvalidContext(
                    "department row without a department name".to_string(),
                ));
            }
            ensure_finite(
                &row.department,
                &[row.budget, row.actual, row.variance, row.variance_percent],
            )?;
        }
        for row in &self.employee_rows {
            ensure_finite(
                &row.employee_name,
                &[row.budget, row.actual, row.variance, row.variance_percent],
            )?;
        }
        for row in &self.trend_rows {
            if row.month.trim().is_empty() {
                return Err(ReportError::InvalidContext(
                    "trend row without a month label".to_string(),
                ));
            }
            ensure_finite(
                &row.month,
                &[
                    row.total_budget,
                    row.total_actual,
                    row.total_variance,
                    row.variance_percent,
                ],
            )?;
        }
        if let Some(summary) = &self.summary {
            let mut values = vec![
                summary.total_budget,
                summary.total_actual,
                summary.total_variance,
                summary.total_variance_percent,
            ];
            if let Some(average) = summary.average {
                values.extend([average.variance, average.variance_percent]);
            }
            ensure_finite("summary", &values)?;
        }

        let summary = match self.summary {
            Some(mut summary) => {
                if summary.average.is_none() {
                    summary.average = PeriodAverage::from_trends(&self.trend_rows);
                }
                Some(summary)
            }
            None => {
                let employees = self
                    .employee_rows
                    .iter()
                    .filter(|row| !row.is_department_total())
                    .count();
                Summary::from_trends(&self.trend_rows, employees)
            }
        };

        Ok(ReportContext {
            period: self.period,
            summary,
            department_rows: self.department_rows,
            employee_rows: self.employee_rows,
            trend_rows: self.trend_rows,
            visuals: self.visuals,
        })
    }
}

fn ensure_finite(label: &str, values: &[f64]) -> Result<(), ReportError> {
    if values.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(ReportError::InvalidContext(format!(
            "row \"{label}\" contains a non-finite number"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trends() -> Vec<TrendRow> {
        vec![
            TrendRow::from_totals("2024-01", 100_000.0, 105_000.0),
            TrendRow::from_totals("2024-02", 110_000.0, 108_000.0),
            TrendRow::from_totals("2024-03", 120_000.0, 115_000.0),
        ]
    }

    #[test]
    fn rejects_zero_and_negative_windows() {
        assert!(matches!(
            Period::new(2024, 3, 0),
            Err(ReportError::InvalidContext(_))
        ));
        assert!(Period::new(2024, 3, -6).is_err());
        assert!(Period::new(2024, 13, 3).is_err());
        assert!(Period::new(2024, 3, 1).is_ok());
    }

    #[test]
    fn negative_window_in_json_is_rejected() {
        let result =
            ReportData::from_json(r#"{ "period": { "year": 2024, "month": 3, "months": -1 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn filename_pads_month() {
        let period = Period::new(2024, 3, 6).expect("valid period");
        assert_eq!(
            report_filename(&period),
            "Variance_Report_With_Charts_2024_03.pdf"
        );
        assert_eq!(period.to_string(), "March 2024");
    }

    #[test]
    fn average_is_arithmetic_mean() {
        let average = PeriodAverage::from_trends(&trends()).expect("average");
        assert!((average.variance - (-2000.0 / 3.0)).abs() < 1e-9);
        let expected_pct =
            (5.0 + (-2000.0 / 110_000.0 * 100.0) + (-5000.0 / 120_000.0 * 100.0)) / 3.0;
        assert!((average.variance_percent - expected_pct).abs() < 1e-9);
        assert_eq!(PeriodAverage::from_trends(&trends()), Some(average));
        assert_eq!(PeriodAverage::from_trends(&[]), None);
    }

    #[test]
    fn summary_takes_totals_from_latest_row() {
        let summary = Summary::from_trends(&trends(), 12).expect("summary");
        assert_eq!(summary.employee_count, 12);
        assert_eq!(summary.total_budget, 120_000.0);
        assert_eq!(summary.total_variance, -5000.0);
    }

    #[test]
    fn deserializes_dashboard_labels() {
        let data = ReportData::from_json(
            r#"{
                "period": { "year": 2024, "month": 3, "months": 3 },
                "employeeData": [
                    { "Employee ID": "E1", "Employee Name": "Ada", "Department": "Eng",
                      "Budget": 10.0, "Actual": 12.0, "Variance": 2.0, "Variance %": 20.0 },
                    { "Employee Name": "Eng DEPARTMENT TOTAL", "Variance": 2.0 }
                ],
                "trends": [
                    { "Month": "2024-03", "Total Budget": 10.0, "Total Actual": 12.0,
                      "Total Variance": 2.0, "Variance %": 20.0 }
                ]
            }"#,
        )
        .expect("parse data");
        let context = ReportContext::from_data(data, Vec::new()).expect("valid context");
        assert_eq!(context.employee_rows().len(), 2);
        assert_eq!(context.employee_rows_without_totals().count(), 1);
        let summary = context.summary().expect("derived summary");
        assert_eq!(summary.employee_count, 1);
        assert_eq!(summary.total_variance, 2.0);
    }

    #[test]
    fn rejects_non_finite_values() {
        let period = Period::new(2024, 3, 1).expect("valid period");
        let result = ReportContext::builder(period)
            .department_rows(vec![DepartmentRow {
                department: "Ops".into(),
                budget: f64::NAN,
                actual: 0.0,
                variance: 0.0,
                variance_percent: 0.0,
            }])
            .build();
        assert!(matches!(result, Err(ReportError::InvalidContext(_))));
    }

    #[test]
    fn summary_accepts_flat_average_keys() {
        let data = ReportData::from_json(
            r#"{
                "period": { "year": 2024, "month": 3, "months": 3 },
                "summary": { "totalEmployees": 4, "totalBudget": 120000.0,
                             "totalActual": 115000.0, "totalVariance": -5000.0,
                             "totalVariancePercent": -4.17,
                             "avgVariance": -666.67, "avgVariancePercent": -0.5 }
            }"#,
        )
        .expect("parse data");
        let summary = data.summary.expect("summary");
        assert_eq!(summary.employee_count, 4);
        assert_eq!(
            summary.average,
            Some(PeriodAverage {
                variance: -666.67,
                variance_percent: -0.5,
            })
        );
    }

    #[test]
    fn summary_without_average_takes_it_from_trends() {
        let summary = Summary {
            employee_count: 3,
            total_budget: 120_000.0,
            total_actual: 115_000.0,
            total_variance: -5000.0,
            total_variance_percent: -4.17,
            average: None,
        };
        let context = ReportContext::builder(Period::new(2024, 3, 3).expect("period"))
            .summary(summary)
            .trend_rows(trends())
            .build()
            .expect("context");
        let average = context.summary().and_then(|summary| summary.average);
        assert_eq!(average, PeriodAverage::from_trends(&trends()));
        assert_eq!(context.summary().map(|summary| summary.employee_count), Some(3));
    }
}
