use crate::error::DashboardError;
use crate::models::{ChartSpec, CountRow, Granularity};
use crate::source::ComplaintSource;

pub fn chart_title(category: &str) -> String {
    format!("Number of {category} complaints over time")
}

pub fn build_chart(category: &str, rows: Vec<CountRow>) -> ChartSpec {
    let (buckets, counts): (Vec<String>, Vec<u64>) = rows
        .into_iter()
        .map(|row| (row.bucket, row.count))
        .unzip();
    ChartSpec {
        buckets,
        counts,
        title: chart_title(category),
    }
}

/// Runs one bucket query and shapes the rows into a chart. Unknown
/// categories produce an empty chart.
pub async fn render(
    source: &dyn ComplaintSource,
    category: &str,
    granularity: Granularity,
) -> Result<ChartSpec, DashboardError> {
    let rows = source.counts_by_bucket(category, granularity).await?;
    Ok(build_chart(category, rows))
}
