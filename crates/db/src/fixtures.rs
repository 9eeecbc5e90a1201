use serde::Serialize;

use gatepass_core::domain::request::RequestId;
use gatepass_core::workflow::RequestStore;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlRequestRepository};

/// Expected state of each seeded record, one per reachable state of both tracks.
const SEED_REQUESTS: &[SeedContract] = &[
    SeedContract {
        id: "seed-student-pending",
        state: "student awaiting staff",
        statuses: ("pending", "pending", "pending"),
    },
    SeedContract {
        id: "seed-student-awaiting-hod",
        state: "student cleared by staff, awaiting HOD",
        statuses: ("approved", "pending", "pending"),
    },
    SeedContract {
        id: "seed-student-staff-rejected",
        state: "student rejected at staff gate",
        statuses: ("rejected", "pending", "rejected"),
    },
    SeedContract {
        id: "seed-student-approved",
        state: "student fully approved",
        statuses: ("approved", "approved", "approved"),
    },
    SeedContract {
        id: "seed-student-hod-rejected",
        state: "student rejected by HOD",
        statuses: ("approved", "rejected", "rejected"),
    },
    SeedContract {
        id: "seed-staff-self-pending",
        state: "staff self-request awaiting HOD",
        statuses: ("approved", "pending", "pending"),
    },
    SeedContract {
        id: "seed-staff-self-approved",
        state: "staff self-request approved",
        statuses: ("approved", "approved", "approved"),
    },
];

/// Deterministic demo data for local runs and the CLI `seed` command.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_requests.sql");

    /// Loads the dataset. Records that already exist are left alone.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        let outcome = sqlx::query(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        let requests_seeded = SEED_REQUESTS
            .iter()
            .map(|contract| SeededRequest { id: contract.id, state: contract.state })
            .collect();

        Ok(SeedResult { inserted: outcome.rows_affected(), requests_seeded })
    }

    /// Checks every seeded record exists with its expected statuses and still decodes
    /// cleanly through the repository.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let repository = SqlRequestRepository::new(pool.clone());
        let mut checks = Vec::with_capacity(SEED_REQUESTS.len());

        for contract in SEED_REQUESTS {
            let (staff, hod, final_status) = contract.statuses;
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                    SELECT 1 FROM request
                    WHERE id = ?1 AND staff_status = ?2 AND hod_status = ?3 AND final_status = ?4
                 )",
            )
            .bind(contract.id)
            .bind(staff)
            .bind(hod)
            .bind(final_status)
            .fetch_one(pool)
            .await?;

            let decodes = matches!(
                repository.find_by_id(&RequestId(contract.id.to_string())).await,
                Ok(Some(_))
            );

            checks.push((contract.id, present == 1 && decodes));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded records from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let ids = SEED_REQUESTS.iter().map(|contract| contract.id).collect::<Vec<_>>();
        sqlx::query(&format!("DELETE FROM request WHERE id IN {}", sql_array_from_ids(&ids)))
            .execute(pool)
            .await?;
        Ok(())
    }

    pub fn ids() -> impl Iterator<Item = &'static str> {
        SEED_REQUESTS.iter().map(|contract| contract.id)
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedContract {
    id: &'static str,
    state: &'static str,
    /// (staff, hod, final)
    statuses: (&'static str, &'static str, &'static str),
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub inserted: u64,
    pub requests_seeded: Vec<SeededRequest>,
}

#[derive(Debug, Serialize)]
pub struct SeededRequest {
    pub id: &'static str,
    pub state: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
