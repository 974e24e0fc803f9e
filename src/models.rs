use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::DashboardError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Postgres expression that turns `created_date` into this granularity's bucket key.
    pub fn bucket_sql(self) -> &'static str {
        match self {
            Self::Daily => "to_char(created_date, 'YYYY-MM-DD')",
            Self::Weekly => {
                "CAST(EXTRACT(YEAR FROM created_date) AS INTEGER)::text || '-W' || \
                 CAST(EXTRACT(WEEK FROM created_date) AS INTEGER)::text"
            }
            Self::Monthly => "to_char(created_date, 'YYYY-MM')",
        }
    }

    /// Same bucketing as [`Granularity::bucket_sql`], computed locally.
    pub fn bucket_key(self, created_date: NaiveDateTime) -> String {
        match self {
            Self::Daily => created_date.format("%Y-%m-%d").to_string(),
            Self::Weekly => format!(
                "{}-W{}",
                created_date.year(),
                created_date.iso_week().week()
            ),
            Self::Monthly => created_date.format("%Y-%m").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = DashboardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|granularity| granularity.as_str() == value)
            .ok_or_else(|| {
                DashboardError::InvalidSelection(format!(
                    "unknown granularity '{value}', expected daily, weekly or monthly"
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountRow {
    pub bucket: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSpec {
    pub buckets: Vec<String>,
    pub counts: Vec<u64>,
    pub title: String,
}

impl ChartSpec {
    pub fn to_figure(&self) -> Figure {
        Figure {
            data: vec![BarTrace {
                x: self.buckets.clone(),
                y: self.counts.clone(),
                kind: "bar",
            }],
            layout: Layout {
                title: self.title.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<BarTrace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Serialize)]
pub struct BarTrace {
    pub x: Vec<String>,
    pub y: Vec<u64>,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub unique_key: String,
    pub complaint_description: String,
    pub created_date: NaiveDateTime,
}
