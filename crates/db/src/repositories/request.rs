use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use tracing::debug;

use gatepass_core::domain::request::{Request, RequestId, RequesterId};
use gatepass_core::query::{RequestFilter, RequestSelector, Worklist};
use gatepass_core::workflow::{RequestStore, StoreError};

use super::{decode_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

const SELECT_REQUEST: &str = "SELECT
        id,
        requester_id,
        requester_role,
        title,
        description,
        staff_status,
        hod_status,
        final_status,
        created_at,
        staff_updated_at,
        hod_updated_at
     FROM request";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM request").fetch_one(&self.pool).await?)
    }

    async fn insert_row(&self, request: &Request) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO request (
                id,
                requester_id,
                requester_role,
                title,
                description,
                staff_status,
                hod_status,
                final_status,
                created_at,
                staff_updated_at,
                hod_updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(&request.requester_id.0)
        .bind(request.requester_role.as_str())
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.staff_status.as_str())
        .bind(request.hod_status.as_str())
        .bind(request.final_status.as_str())
        .bind(encode_timestamp(request.created_at))
        .bind(request.staff_updated_at.map(encode_timestamp))
        .bind(request.hod_updated_at.map(encode_timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn select_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_REQUEST} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(request_from_row).transpose()
    }

    async fn select(&self, selector: &RequestSelector) -> Result<Vec<Request>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_REQUEST);
        builder.push(" WHERE 1 = 1");
        push_selector(&mut builder, selector);
        builder.push(" ORDER BY created_at DESC, id DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(request_from_row).collect()
    }

    async fn compare_and_swap(
        &self,
        expected: &Request,
        updated: &Request,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE request SET
                staff_status = ?,
                hod_status = ?,
                final_status = ?,
                staff_updated_at = ?,
                hod_updated_at = ?
             WHERE id = ? AND staff_status = ? AND hod_status = ? AND final_status = ?",
        )
        .bind(updated.staff_status.as_str())
        .bind(updated.hod_status.as_str())
        .bind(updated.final_status.as_str())
        .bind(updated.staff_updated_at.map(encode_timestamp))
        .bind(updated.hod_updated_at.map(encode_timestamp))
        .bind(&expected.id.0)
        .bind(expected.staff_status.as_str())
        .bind(expected.hod_status.as_str())
        .bind(expected.final_status.as_str())
        .execute(&self.pool)
        .await?;

        let swapped = result.rows_affected() == 1;
        if !swapped {
            debug!(
                event_name = "db.request.cas_miss",
                request_id = %expected.id,
                "stored statuses no longer match the expected snapshot"
            );
        }
        Ok(swapped)
    }
}

#[async_trait]
impl RequestStore for SqlRequestRepository {
    async fn insert(&self, request: &Request) -> Result<(), StoreError> {
        Ok(self.insert_row(request).await?)
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, StoreError> {
        Ok(self.select_by_id(id).await?)
    }

    async fn find(&self, selector: &RequestSelector) -> Result<Vec<Request>, StoreError> {
        Ok(self.select(selector).await?)
    }

    async fn update_if_unchanged(
        &self,
        expected: &Request,
        updated: &Request,
    ) -> Result<bool, StoreError> {
        Ok(self.compare_and_swap(expected, updated).await?)
    }
}

fn push_selector(builder: &mut QueryBuilder<'_, Sqlite>, selector: &RequestSelector) {
    match selector {
        RequestSelector::Worklist(Worklist::Staff) => {
            builder.push(" AND requester_role = 'student' AND staff_status = 'pending'");
        }
        RequestSelector::Worklist(Worklist::Hod) => {
            builder.push(
                " AND hod_status = 'pending'
                  AND ((requester_role = 'student' AND staff_status = 'approved')
                       OR requester_role = 'staff')",
            );
        }
        RequestSelector::Requester(requester_id) => {
            builder.push(" AND requester_id = ").push_bind(requester_id.0.clone());
        }
        RequestSelector::Filter(filter) => push_filter(builder, filter),
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &RequestFilter) {
    if let Some(RequesterId(requester_id)) = &filter.requester_id {
        builder.push(" AND requester_id = ").push_bind(requester_id.clone());
    }
    if let Some(role) = filter.requester_role {
        builder.push(" AND requester_role = ").push_bind(role.as_str());
    }
    if let Some(status) = filter.final_status {
        builder.push(" AND final_status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.created_from {
        builder.push(" AND created_at >= ").push_bind(encode_timestamp(from));
    }
    if let Some(to) = filter.created_to {
        builder.push(" AND created_at <= ").push_bind(encode_timestamp(to));
    }
}

fn request_from_row(row: SqliteRow) -> Result<Request, RepositoryError> {
    let id: String = row.try_get("id")?;
    let requester_role: String = row.try_get("requester_role")?;
    let staff_status: String = row.try_get("staff_status")?;
    let hod_status: String = row.try_get("hod_status")?;
    let final_status: String = row.try_get("final_status")?;
    let created_at: String = row.try_get("created_at")?;
    let staff_updated_at: Option<String> = row.try_get("staff_updated_at")?;
    let hod_updated_at: Option<String> = row.try_get("hod_updated_at")?;

    let decode = |column: &str, error: gatepass_core::ValidationError| {
        RepositoryError::Decode(format!("request {id}: {column}: {error}"))
    };

    let request = Request {
        requester_id: RequesterId(row.try_get("requester_id")?),
        requester_role: requester_role
            .parse()
            .map_err(|error| decode("requester_role", error))?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        staff_status: staff_status.parse().map_err(|error| decode("staff_status", error))?,
        hod_status: hod_status.parse().map_err(|error| decode("hod_status", error))?,
        final_status: final_status.parse().map_err(|error| decode("final_status", error))?,
        created_at: decode_timestamp("created_at", &created_at)?,
        staff_updated_at: staff_updated_at
            .as_deref()
            .map(|raw| decode_timestamp("staff_updated_at", raw))
            .transpose()?,
        hod_updated_at: hod_updated_at
            .as_deref()
            .map(|raw| decode_timestamp("hod_updated_at", raw))
            .transpose()?,
        id: RequestId(id.clone()),
    };

    request.check_invariants().map_err(|error| RepositoryError::Decode(error.to_string()))?;
    Ok(request)
}
