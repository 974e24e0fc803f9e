use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::DashboardError;
use crate::models::{CategoryCount, CountRow, Granularity, ServiceRequest};
use crate::sample;
use crate::source::ComplaintSource;

const TABLE: &str = "austin_311.service_requests";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let mut inserted = 0usize;
    for request in sample::requests() {
        if insert_request(pool, &request).await? {
            inserted += 1;
        }
    }
    Ok(inserted)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        unique_key: String,
        complaint_description: String,
        created_date: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let created_date = parse_created_date(&row.created_date).with_context(|| {
            format!(
                "row {}: unreadable created_date '{}'",
                line + 1,
                row.created_date
            )
        })?;

        let request = ServiceRequest {
            unique_key: row.unique_key,
            complaint_description: row.complaint_description,
            created_date,
        };
        if insert_request(pool, &request).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}

async fn insert_request(pool: &PgPool, request: &ServiceRequest) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO austin_311.service_requests
        (unique_key, complaint_description, created_date)
        VALUES ($1, $2, $3)
        ON CONFLICT (unique_key) DO NOTHING
        "#,
    )
    .bind(&request.unique_key)
    .bind(&request.complaint_description)
    .bind(request.created_date)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub fn parse_created_date(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_utc());
    }

    let trimmed = trimmed
        .strip_suffix(" UTC")
        .or_else(|| trimmed.strip_suffix('Z'))
        .unwrap_or(trimmed);
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
}

fn top_categories_sql() -> String {
    format!(
        "SELECT complaint_description, COUNT(complaint_description) AS count \
         FROM {TABLE} \
         WHERE complaint_description IS NOT NULL \
         GROUP BY complaint_description \
         ORDER BY count DESC, complaint_description \
         LIMIT $1"
    )
}

// Only the static bucket expression is spliced in; the category is bound.
// The collation sits on the select item because ORDER BY only resolves a
// bare output alias.
fn bucket_counts_sql(granularity: Granularity) -> String {
    format!(
        "SELECT ({bucket}) COLLATE \"C\" AS bucket, COUNT(*) AS count \
         FROM {TABLE} \
         WHERE complaint_description = $1 \
         GROUP BY bucket \
         ORDER BY bucket",
        bucket = granularity.bucket_sql()
    )
}

pub struct PgComplaintSource {
    pool: PgPool,
}

impl PgComplaintSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ComplaintSource for PgComplaintSource {
    async fn top_categories(&self, limit: u32) -> Result<Vec<CategoryCount>, DashboardError> {
        let query = top_categories_sql();
        let rows = sqlx::query(&query)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let mut categories = Vec::with_capacity(rows.len());
        for row in rows {
            let count: i64 = row.try_get("count")?;
            categories.push(CategoryCount {
                category: row.try_get("complaint_description")?,
                count: count.max(0) as u64,
            });
        }

        Ok(categories)
    }

    async fn counts_by_bucket(
        &self,
        category: &str,
        granularity: Granularity,
    ) -> Result<Vec<CountRow>, DashboardError> {
        let query = bucket_counts_sql(granularity);
        debug!(%granularity, "running bucket query");

        let rows = sqlx::query(&query)
            .bind(category)
            .fetch_all(&self.pool)
            .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let count: i64 = row.try_get("count")?;
            counts.push(CountRow {
                bucket: row.try_get("bucket")?,
                count: count.max(0) as u64,
            });
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn expected(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 3, 14)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .expect("valid timestamp")
    }

    #[test]
    fn parses_common_export_formats() {
        let want = expected(9, 26, 53);
        assert_eq!(parse_created_date("2021-03-14 09:26:53"), Some(want));
        assert_eq!(parse_created_date("2021-03-14T09:26:53"), Some(want));
        assert_eq!(parse_created_date("2021-03-14 09:26:53 UTC"), Some(want));
        assert_eq!(parse_created_date("2021-03-14T09:26:53Z"), Some(want));
        assert_eq!(parse_created_date(" 2021-03-14 09:26:53.000 "), Some(want));
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        assert_eq!(
            parse_created_date("2021-03-14T04:26:53-05:00"),
            Some(expected(9, 26, 53))
        );
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_created_date("14/03/2021"), None);
        assert_eq!(parse_created_date(""), None);
    }

    #[test]
    fn bucket_query_orders_by_bare_alias() {
        for granularity in Granularity::ALL {
            let query = bucket_counts_sql(granularity);
            assert!(query.contains(&format!(
                "SELECT ({}) COLLATE \"C\" AS bucket",
                granularity.bucket_sql()
            )));
            assert!(query.ends_with("GROUP BY bucket ORDER BY bucket"));
            assert!(query.contains("WHERE complaint_description = $1"));
        }
    }

    #[test]
    fn top_categories_query_binds_limit() {
        let query = top_categories_sql();
        assert!(query.contains("ORDER BY count DESC, complaint_description"));
        assert!(query.ends_with("LIMIT $1"));
    }

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(10, 30, 0))
            .expect("valid timestamp")
    }

    async fn insert_all(pool: &PgPool, rows: &[(&str, &str, NaiveDateTime)]) {
        for (key, category, created_date) in rows {
            let request = ServiceRequest {
                unique_key: key.to_string(),
                complaint_description: category.to_string(),
                created_date: *created_date,
            };
            assert!(insert_request(pool, &request).await.expect("insert"));
        }
    }

    async fn animal_control(pool: &PgPool) -> PgComplaintSource {
        insert_all(
            pool,
            &[
                ("a1", "Animal Control", at(2021, 1, 1)),
                ("a2", "Animal Control", at(2021, 3, 5)),
                ("a3", "Animal Control", at(2021, 3, 15)),
                ("a4", "Animal Control", at(2021, 3, 31)),
                ("a5", "Animal Control", at(2021, 4, 20)),
                ("g1", "Graffiti", at(2021, 3, 5)),
            ],
        )
        .await;
        PgComplaintSource::new(pool.clone())
    }

    fn buckets(rows: &[CountRow]) -> Vec<(&str, u64)> {
        rows.iter().map(|row| (row.bucket.as_str(), row.count)).collect()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a scratch Postgres server"]
    async fn postgres_buckets_match_each_granularity(pool: PgPool) {
        let source = animal_control(&pool).await;

        let monthly = source
            .counts_by_bucket("Animal Control", Granularity::Monthly)
            .await
            .expect("monthly");
        assert_eq!(
            buckets(&monthly),
            vec![("2021-01", 1), ("2021-03", 3), ("2021-04", 1)]
        );

        let weekly = source
            .counts_by_bucket("Animal Control", Granularity::Weekly)
            .await
            .expect("weekly");
        assert_eq!(
            buckets(&weekly),
            vec![("2021-W11", 1), ("2021-W13", 1), ("2021-W16", 1), ("2021-W53", 1), ("2021-W9", 1)]
        );

        let daily = source
            .counts_by_bucket("Animal Control", Granularity::Daily)
            .await
            .expect("daily");
        assert_eq!(
            buckets(&daily),
            vec![
                ("2021-01-01", 1),
                ("2021-03-05", 1),
                ("2021-03-15", 1),
                ("2021-03-31", 1),
                ("2021-04-20", 1),
            ]
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a scratch Postgres server"]
    async fn postgres_matches_local_bucketing(pool: PgPool) {
        let source = animal_control(&pool).await;
        for granularity in Granularity::ALL {
            let rows = source
                .counts_by_bucket("Animal Control", granularity)
                .await
                .expect("rows");
            let mut local: Vec<String> = [
                at(2021, 1, 1),
                at(2021, 3, 5),
                at(2021, 3, 15),
                at(2021, 3, 31),
                at(2021, 4, 20),
            ]
            .into_iter()
            .map(|created| granularity.bucket_key(created))
            .collect();
            local.sort();
            local.dedup();
            let remote: Vec<String> = rows.into_iter().map(|row| row.bucket).collect();
            assert_eq!(remote, local, "{granularity}");
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a scratch Postgres server"]
    async fn postgres_unknown_category_is_empty(pool: PgPool) {
        let source = animal_control(&pool).await;
        let rows = source
            .counts_by_bucket("Nonexistent Category", Granularity::Daily)
            .await
            .expect("rows");
        assert!(rows.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a scratch Postgres server"]
    async fn postgres_top_categories_sorted_and_limited(pool: PgPool) {
        insert_all(
            &pool,
            &[
                ("l1", "Loose Dog", at(2021, 3, 1)),
                ("l2", "Loose Dog", at(2021, 3, 2)),
                ("l3", "Loose Dog", at(2021, 3, 3)),
                ("g1", "Graffiti", at(2021, 3, 1)),
                ("g2", "Graffiti", at(2021, 3, 2)),
                ("b1", "Bulky Item", at(2021, 3, 1)),
                ("b2", "Bulky Item", at(2021, 3, 2)),
                ("p1", "Pothole Repair", at(2021, 3, 1)),
            ],
        )
        .await;
        sqlx::query(
            "INSERT INTO austin_311.service_requests (unique_key, complaint_description, created_date) \
             VALUES ('n1', NULL, '2021-03-01 00:00:00'), ('n2', NULL, '2021-03-02 00:00:00')",
        )
        .execute(&pool)
        .await
        .expect("null rows");

        let source = PgComplaintSource::new(pool);
        let top = source.top_categories(3).await.expect("categories");
        assert_eq!(
            top,
            vec![
                CategoryCount { category: "Loose Dog".to_string(), count: 3 },
                CategoryCount { category: "Bulky Item".to_string(), count: 2 },
                CategoryCount { category: "Graffiti".to_string(), count: 2 },
            ]
        );

        let all = source.top_categories(20).await.expect("categories");
        assert_eq!(all.len(), 4);
    }
}
