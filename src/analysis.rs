use crate::error::{PipelineError, Result};
use crate::structs::{EnrichedRecord, TempCategory, month_name, weekday_name};
use chrono::{Datelike, Weekday};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Fewest paired observations the t test is defined for (n - 2 >= 1).
pub const MIN_CORRELATION_ROWS: usize = 3;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Pearson correlation coefficient with its two-tailed p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub coefficient: f64,
    pub p_value: f64,
    pub n: usize,
}

/// Verdict of a correlation test at a fixed significance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Significance {
    Significant,
    NotSignificant,
}

impl Significance {
    pub fn from_p_value(p_value: f64, alpha: f64) -> Self {
        if p_value < alpha {
            Significance::Significant
        } else {
            Significance::NotSignificant
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Significance::Significant => {
                "There is a significant correlation between precipitation and number of crashes."
            }
            Significance::NotSignificant => {
                "There is no significant correlation between precipitation and number of crashes."
            }
        }
    }
}

/// Computes the Pearson product-moment correlation between `x` and `y`.
///
/// The p-value comes from the t statistic `r * sqrt((n - 2) / (1 - r^2))`
/// under a Student t distribution with `n - 2` degrees of freedom.
///
/// # Errors
///
/// Returns `PipelineError::InsufficientData` when the slices differ in
/// length or hold fewer than three pairs, and `PipelineError::ZeroVariance`
/// when either column is constant.
pub fn pearson(
    x: &[f64],
    y: &[f64],
    x_name: &'static str,
    y_name: &'static str,
) -> Result<Correlation> {
    if x.len() != y.len() || x.len() < MIN_CORRELATION_ROWS {
        return Err(PipelineError::InsufficientData {
            needed: MIN_CORRELATION_ROWS,
            found: x.len().min(y.len()),
        });
    }

    if is_constant(x) {
        return Err(PipelineError::ZeroVariance(x_name));
    }
    if is_constant(y) {
        return Err(PipelineError::ZeroVariance(y_name));
    }

    let n = x.len();
    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 {
        return Err(PipelineError::ZeroVariance(x_name));
    }
    if var_y == 0.0 {
        return Err(PipelineError::ZeroVariance(y_name));
    }

    let coefficient = (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0);
    let p_value = two_tailed_p_value(coefficient, n)?;
    Ok(Correlation {
        coefficient,
        p_value,
        n,
    })
}

/// Every value equal to the first. Checked on the raw values since a
/// rounded mean leaves a tiny non-zero sum of squares.
fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

fn two_tailed_p_value(r: f64, n: usize) -> Result<f64> {
    let df = (n - 2) as f64;
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return Ok(0.0);
    }
    let t = r * (df / denom).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| PipelineError::Data(format!("Student t distribution: {}", e)))?;
    Ok((2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
}

/// Correlation between daily precipitation and daily crash count.
pub fn precipitation_crash_correlation(records: &[EnrichedRecord]) -> Result<Correlation> {
    let precipitation: Vec<f64> = records.iter().map(|r| r.precipitation).collect();
    let crashes: Vec<f64> = records.iter().map(|r| f64::from(r.num_crashes)).collect();
    pearson(&precipitation, &crashes, "precipitation", "num_crashes")
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean crashes per day for each calendar month, January first. Months
/// with no records are `None`.
pub fn monthly_average_crashes(records: &[EnrichedRecord]) -> [Option<f64>; 12] {
    let mut buckets: [Vec<f64>; 12] = Default::default();
    for r in records {
        buckets[r.date.month0() as usize].push(f64::from(r.num_crashes));
    }
    buckets.map(|b| mean(&b))
}

/// Mean crashes per day by weekday (rows, Monday first) and month
/// (columns, January first).
pub fn weekday_month_pivot(records: &[EnrichedRecord]) -> [[Option<f64>; 12]; 7] {
    let mut cells: [[Vec<f64>; 12]; 7] = Default::default();
    for r in records {
        let row = r.date.weekday().num_days_from_monday() as usize;
        cells[row][r.date.month0() as usize].push(f64::from(r.num_crashes));
    }
    cells.map(|row| row.map(|values| mean(&values)))
}

/// Five-number summary of daily crash counts for one temperature band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategorySummary {
    pub category: TempCategory,
    pub count: usize,
    pub min: f64,
    pub percentile_25: f64,
    pub median: f64,
    pub percentile_75: f64,
    pub max: f64,
}

/// Crash-count distribution per temperature category, coldest first.
/// Categories without records are omitted.
pub fn temp_category_distribution(records: &[EnrichedRecord]) -> Vec<CategorySummary> {
    TempCategory::ALL
        .iter()
        .filter_map(|&category| {
            let mut counts: Vec<f64> = records
                .iter()
                .filter(|r| r.temp_category == category)
                .map(|r| f64::from(r.num_crashes))
                .collect();
            if counts.is_empty() {
                return None;
            }
            counts.sort_by(f64::total_cmp);
            Some(CategorySummary {
                category,
                count: counts.len(),
                min: counts[0],
                percentile_25: calculate_percentile(&counts, 25.0),
                median: calculate_percentile(&counts, 50.0),
                percentile_75: calculate_percentile(&counts, 75.0),
                max: counts[counts.len() - 1],
            })
        })
        .collect()
}

/// Percentile of already sorted data using linear interpolation between
/// the closest ranks. Returns 0.0 for empty input.
fn calculate_percentile(sorted_data: &[f64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        let weight = index - lower as f64;
        sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight
    }
}

/// Correlation test outcome at the configured significance level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Analysis {
    pub correlation: Correlation,
    pub significance: Significance,
    pub alpha: f64,
}

impl Analysis {
    pub fn new(correlation: Correlation, alpha: f64) -> Self {
        Self {
            correlation,
            significance: Significance::from_p_value(correlation.p_value, alpha),
            alpha,
        }
    }
}

/// Printed statistics and verdict for one correlation test.
pub fn correlation_report(analysis: &Analysis) -> String {
    format!(
        "Pearson correlation coefficient: {}\nP-value: {}\n\n {}",
        analysis.correlation.coefficient,
        analysis.correlation.p_value,
        analysis.significance.message()
    )
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v))
}

/// Plain-text rendering of the tables the charts are drawn from.
pub fn chart_tables(records: &[EnrichedRecord]) -> String {
    let mut out = String::from("Monthly Average Number of Crashes\n");
    for (i, avg) in monthly_average_crashes(records).iter().enumerate() {
        out.push_str(&format!(
            "  {:<10} {:>8}\n",
            month_name(i as u32 + 1),
            cell(*avg)
        ));
    }

    out.push_str("\nAverage Crashes by Weekday and Month\n");
    out.push_str(&format!("  {:<10}", ""));
    for m in 1..=12 {
        out.push_str(&format!(" {:>7}", &month_name(m)[..3]));
    }
    out.push('\n');
    for (weekday, row) in WEEKDAYS.iter().zip(weekday_month_pivot(records)) {
        out.push_str(&format!("  {:<10}", weekday_name(*weekday)));
        for value in row {
            out.push_str(&format!(" {:>7}", cell(value)));
        }
        out.push('\n');
    }

    out.push_str("\nCrash Distribution by Temperature Category\n");
    out.push_str(&format!(
        "  {:<10} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
        "category", "days", "min", "p25", "median", "p75", "max"
    ));
    for s in temp_category_distribution(records) {
        out.push_str(&format!(
            "  {:<10} {:>6} {:>8.1} {:>8.1} {:>8.1} {:>8.1} {:>8.1}\n",
            s.category.label(),
            s.count,
            s.min,
            s.percentile_25,
            s.median,
            s.percentile_75,
            s.max
        ));
    }
    out
}
