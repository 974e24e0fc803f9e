use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::DashboardError;
use crate::lister;
use crate::models::{CategoryCount, ChartSpec, Granularity};
use crate::render;
use crate::source::ComplaintSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub category: Option<String>,
    pub granularity: Granularity,
}

/// Query-service handle plus the category list loaded once at startup.
///
/// Every update hands its chart back to the caller. Updates are numbered,
/// and the shared current-chart slot only takes a chart if no newer update
/// was started while it was being rendered.
pub struct Dashboard {
    source: Arc<dyn ComplaintSource>,
    categories: Arc<[CategoryCount]>,
    generation: AtomicU64,
    current: RwLock<Option<Arc<ChartSpec>>>,
}

impl Dashboard {
    pub async fn start(
        source: Arc<dyn ComplaintSource>,
        category_limit: u32,
    ) -> Result<Self, DashboardError> {
        let categories = lister::list_top_categories(source.as_ref(), category_limit).await?;
        if categories.is_empty() {
            warn!("complaints dataset returned no categories");
        }

        Ok(Self {
            source,
            categories: categories.into(),
            generation: AtomicU64::new(0),
            current: RwLock::new(None),
        })
    }

    pub fn categories(&self) -> &[CategoryCount] {
        &self.categories
    }

    pub fn default_selection(&self) -> Selection {
        Selection {
            category: self.categories.first().map(|c| c.category.clone()),
            granularity: Granularity::default(),
        }
    }

    pub async fn update(
        &self,
        category: &str,
        granularity: Granularity,
    ) -> Result<Arc<ChartSpec>, DashboardError> {
        let ticket = self.begin();
        let chart = match render::render(self.source.as_ref(), category, granularity).await {
            Ok(chart) => Arc::new(chart),
            Err(err) => {
                warn!(
                    category,
                    %granularity,
                    error = %err,
                    "chart update failed, keeping previous chart"
                );
                return Err(err);
            }
        };

        let committed = self.commit(ticket, Arc::clone(&chart)).await;
        info!(
            category,
            %granularity,
            points = chart.buckets.len(),
            committed,
            "chart update finished"
        );
        Ok(chart)
    }

    pub async fn current(&self) -> Option<Arc<ChartSpec>> {
        self.current.read().await.clone()
    }

    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn commit(&self, ticket: u64, chart: Arc<ChartSpec>) -> bool {
        let mut current = self.current.write().await;
        if self.generation.load(Ordering::SeqCst) != ticket {
            return false;
        }

        *current = Some(chart);
        true
    }
}
