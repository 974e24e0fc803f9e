use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::error::DashboardError;
use crate::models::{CategoryCount, CountRow, Granularity, ServiceRequest};

/// Read-only access to the complaints dataset.
///
/// Implementations return rows already ordered: categories by descending
/// frequency (ties by name), buckets ascending in byte order.
#[async_trait]
pub trait ComplaintSource: Send + Sync {
    async fn top_categories(&self, limit: u32) -> Result<Vec<CategoryCount>, DashboardError>;

    async fn counts_by_bucket(
        &self,
        category: &str,
        granularity: Granularity,
    ) -> Result<Vec<CountRow>, DashboardError>;
}

pub struct MemoryComplaintSource {
    requests: Vec<ServiceRequest>,
}

impl MemoryComplaintSource {
    pub fn new(requests: Vec<ServiceRequest>) -> Self {
        Self { requests }
    }
}

#[async_trait]
impl ComplaintSource for MemoryComplaintSource {
    async fn top_categories(&self, limit: u32) -> Result<Vec<CategoryCount>, DashboardError> {
        let mut map: HashMap<&str, u64> = HashMap::new();
        for request in &self.requests {
            *map.entry(request.complaint_description.as_str()).or_insert(0) += 1;
        }

        let mut counts: Vec<CategoryCount> = map
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
        counts.truncate(limit as usize);
        Ok(counts)
    }

    async fn counts_by_bucket(
        &self,
        category: &str,
        granularity: Granularity,
    ) -> Result<Vec<CountRow>, DashboardError> {
        let mut buckets: BTreeMap<String, u64> = BTreeMap::new();
        for request in self
            .requests
            .iter()
            .filter(|request| request.complaint_description == category)
        {
            *buckets
                .entry(granularity.bucket_key(request.created_date))
                .or_insert(0) += 1;
        }

        Ok(buckets
            .into_iter()
            .map(|(bucket, count)| CountRow { bucket, count })
            .collect())
    }
}
