use tracing::info;

use crate::error::DashboardError;
use crate::models::CategoryCount;
use crate::source::ComplaintSource;

pub const DEFAULT_CATEGORY_LIMIT: u32 = 20;

pub async fn list_top_categories(
    source: &dyn ComplaintSource,
    limit: u32,
) -> Result<Vec<CategoryCount>, DashboardError> {
    if limit == 0 {
        return Err(DashboardError::InvalidSelection(
            "category limit must be a positive integer".to_string(),
        ));
    }

    let categories = source.top_categories(limit).await?;
    info!(limit, returned = categories.len(), "loaded top complaint categories");
    Ok(categories)
}
