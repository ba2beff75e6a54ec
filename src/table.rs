//! Table rendering: fixed-width columns, truncated text cells and
//! sign-coloured variance cells.
//!
//! The three report tables (departments, employees, trends) are all produced by
//! [`TableRenderer::render`] so the colour rule is applied identically to each
//! of them. Row filtering happens before rows reach the renderer.

use crate::block::{CellStyle, Column, TableBlock, TableRow};
use crate::config::{Spacing, TruncationLimits};
use crate::error::ReportError;
use crate::model::{DepartmentRow, EmployeeRow, TrendRow};
use crate::richtext::Color;

const HEADER_FONT_SIZE_PT: f64 = 9.0;
const DATA_FONT_SIZE_PT: f64 = 8.0;

/// Sign classification of a variance value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarianceClass {
    /// Spent more than budgeted.
    Over,
    /// Spent less than budgeted.
    Under,
    /// Exactly on budget.
    On,
}

impl VarianceClass {
    /// Three-way sign comparison against zero.
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            VarianceClass::Over
        } else if value < 0.0 {
            VarianceClass::Under
        } else {
            VarianceClass::On
        }
    }

    /// Text colour for the class.
    pub fn color(self) -> Color {
        match self {
            VarianceClass::Over => Color::RED,
            VarianceClass::Under => Color::GREEN,
            VarianceClass::On => Color::GREY,
        }
    }
}

/// A cell value before formatting.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    /// Free text, cut to at most `max_chars` characters.
    Text {
        /// Original text.
        value: String,
        /// Character budget.
        max_chars: usize,
    },
    /// A currency amount in default colour.
    Money(f64),
    /// A variance amount, sign-coloured.
    Variance(f64),
    /// A variance percentage, sign-coloured.
    VariancePercent(f64),
}

impl Cell {
    /// Text cell helper.
    pub fn text(value: impl Into<String>, max_chars: usize) -> Self {
        Cell::Text {
            value: value.into(),
            max_chars,
        }
    }

    fn format(&self) -> (String, CellStyle) {
        match self {
            Cell::Text { value, max_chars } => (truncate(value, *max_chars), CellStyle::Plain),
            Cell::Money(value) => (format_money(*value), CellStyle::Plain),
            Cell::Variance(value) => (
                format_money(*value),
                CellStyle::Colored(VarianceClass::of(*value).color()),
            ),
            Cell::VariancePercent(value) => (
                format_percent(*value),
                CellStyle::Colored(VarianceClass::of(*value).color()),
            ),
        }
    }
}

/// Cuts `text` to at most `max_chars` characters. The result depends only on
/// the input and the budget; no ellipsis is appended.
pub fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// `$` followed by the value with two decimals, e.g. `$-2000.00`.
pub fn format_money(value: f64) -> String {
    format!("${:.2}", value)
}

/// Like [`format_money`] with thousands separators, e.g. `$105,000.00`.
pub fn format_money_grouped(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    // Rounding can turn a tiny negative into "0.00"; do not print "-0.00".
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("${sign}{grouped}.{fraction}")
}

/// Value with two decimals and a percent sign.
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Builds [`TableBlock`]s with the configured row metrics.
#[derive(Clone, Copy, Debug)]
pub struct TableRenderer {
    header_row_height_mm: f64,
    data_row_height_mm: f64,
    limits: TruncationLimits,
}

impl TableRenderer {
    /// Creates a renderer using the row heights from `spacing`.
    pub fn new(spacing: &Spacing, limits: TruncationLimits) -> Self {
        Self {
            header_row_height_mm: spacing.header_row_height_mm,
            data_row_height_mm: spacing.data_row_height_mm,
            limits,
        }
    }

    /// Formats and styles `rows` under `columns`.
    ///
    /// Every row must have exactly one cell per column; anything else is a
    /// structural error in the input and aborts composition.
    pub fn render<I>(&self, columns: Vec<Column>, rows: I) -> Result<TableBlock, ReportError>
    where
        I: IntoIterator<Item = Vec<Cell>>,
    {
        let mut table_rows = Vec::new();
        for (index, cells) in rows.into_iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(ReportError::Layout(format!(
                    "table row {} has {} cells but the table has {} columns",
                    index,
                    cells.len(),
                    columns.len()
                )));
            }
            let (cells, style_hints) = cells.iter().map(Cell::format).unzip();
            table_rows.push(TableRow { cells, style_hints });
        }

        Ok(TableBlock {
            columns,
            rows: table_rows,
            header_row_height_mm: self.header_row_height_mm,
            data_row_height_mm: self.data_row_height_mm,
            header_font_size_pt: HEADER_FONT_SIZE_PT,
            data_font_size_pt: DATA_FONT_SIZE_PT,
        })
    }

    /// Department breakdown: every row, unfiltered.
    pub fn department_table(&self, rows: &[DepartmentRow]) -> Result<TableBlock, ReportError> {
        let columns = vec![
            Column::new("Department", 40.0),
            Column::new("Budget", 35.0),
            Column::new("Actual", 35.0),
            Column::new("Variance", 35.0),
            Column::new("Var %", 30.0),
        ];
        let limit = self.limits.department_name;
        self.render(
            columns,
            rows.iter().map(|row| {
                vec![
                    Cell::text(row.department.as_str(), limit),
                    Cell::Money(row.budget),
                    Cell::Money(row.actual),
                    Cell::Variance(row.variance),
                    Cell::VariancePercent(row.variance_percent),
                ]
            }),
        )
    }

    /// Employee variance listing. Callers pass rows with department totals
    /// already removed.
    pub fn employee_table<'a, I>(&self, rows: I) -> Result<TableBlock, ReportError>
    where
        I: IntoIterator<Item = &'a EmployeeRow>,
    {
        let columns = vec![
            Column::new("ID", 20.0),
            Column::new("Employee Name", 43.0),
            Column::new("Dept", 25.0),
            Column::new("Budget", 28.0),
            Column::new("Actual", 28.0),
            Column::new("Variance", 28.0),
            Column::new("Var %", 18.0),
        ];
        let limits = self.limits;
        self.render(
            columns,
            rows.into_iter().map(|row| {
                vec![
                    Cell::text(row.employee_id.as_str(), limits.employee_id),
                    Cell::text(row.employee_name.as_str(), limits.employee_name),
                    Cell::text(
                        row.department.as_deref().unwrap_or("N/A"),
                        limits.employee_department,
                    ),
                    Cell::Money(row.budget),
                    Cell::Money(row.actual),
                    Cell::Variance(row.variance),
                    Cell::VariancePercent(row.variance_percent),
                ]
            }),
        )
    }

    /// Historical trend table, one row per month.
    pub fn trend_table(&self, rows: &[TrendRow]) -> Result<TableBlock, ReportError> {
        let columns = vec![
            Column::new("Month", 30.0),
            Column::new("Budget", 38.0),
            Column::new("Actual", 38.0),
            Column::new("Variance", 38.0),
            Column::new("Var %", 30.0),
        ];
        let limit = self.limits.month_label;
        self.render(
            columns,
            rows.iter().map(|row| {
                vec![
                    Cell::text(row.month.as_str(), limit),
                    Cell::Money(row.total_budget),
                    Cell::Money(row.total_actual),
                    Cell::Variance(row.total_variance),
                    Cell::VariancePercent(row.variance_percent),
                ]
            }),
        )
    }
}
