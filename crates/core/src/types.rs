use crate::error::AnalysisError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A calendar month, ordered chronologically and rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Build a key from a year and a 1-based month.
    pub fn new(year: i32, month: u32) -> Result<Self, AnalysisError> {
        if !(1..=12).contains(&month) {
            return Err(AnalysisError::InvalidMonthKey(format!(
                "{year:04}-{month:02}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Months elapsed since year 0, used for shifting and distances.
    fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }

    /// The key `months` later (earlier when negative).
    pub fn shift(&self, months: i32) -> Self {
        Self::from_ordinal(self.ordinal() + months as i64)
    }

    /// Signed number of month steps from `self` to `other`.
    pub fn months_until(&self, other: &MonthKey) -> i64 {
        other.ordinal() - self.ordinal()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
            .map(Self::from_date)
            .map_err(|_| AnalysisError::InvalidMonthKey(s.to_string()))
    }
}

impl TryFrom<String> for MonthKey {
    type Error = AnalysisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// What kind of quantity a metric measures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Currency,
    Count,
    Percentage,
    Ratio,
    Custom(String),
}

/// One tracked business metric with a sparse month → value mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub id: String,
    pub name: String,
    /// Source or category tag, e.g. `stripe` or `google_ads`.
    pub source: String,
    pub metric_type: MetricType,
    #[serde(default)]
    pub values: BTreeMap<MonthKey, f64>,
}

impl MetricSeries {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
        metric_type: MetricType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source: source.into(),
            metric_type,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert of a single month.
    pub fn with_value(mut self, month: MonthKey, value: f64) -> Self {
        self.values.insert(month, value);
        self
    }

    /// Fill consecutive months starting at `start`.
    pub fn with_values(mut self, start: MonthKey, values: &[f64]) -> Self {
        for (offset, value) in values.iter().enumerate() {
            self.values.insert(start.shift(offset as i32), *value);
        }
        self
    }

    pub fn get(&self, month: &MonthKey) -> Option<f64> {
        self.values.get(month).copied()
    }

    pub fn first_month(&self) -> Option<MonthKey> {
        self.values.keys().next().copied()
    }

    pub fn last_month(&self) -> Option<MonthKey> {
        self.values.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn metric_ref(&self) -> MetricRef {
        MetricRef {
            id: self.id.clone(),
            name: self.name.clone(),
            source: self.source.clone(),
        }
    }
}

/// Identity of a series carried by analysis results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricRef {
    pub id: String,
    pub name: String,
    pub source: String,
}
