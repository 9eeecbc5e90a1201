//! Read-side predicates: worklists, reporting filters and aggregate counters.
//!
//! Everything here is a pure function of the record set handed in. Stores that can
//! push predicates down (SQL) must agree with [`Worklist::matches`] and
//! [`RequestFilter::matches`]; the in-memory store uses them directly.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::{GateStatus, Request, RequesterId, RequesterRole};
use crate::errors::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Worklist {
    /// Student requests still waiting on the staff gate.
    Staff,
    /// Student requests cleared by staff plus staff self-requests, waiting on the HOD.
    Hod,
}

impl Worklist {
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            Self::Staff => request.awaits_staff(),
            Self::Hod => request.awaits_hod(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilter {
    pub requester_id: Option<RequesterId>,
    pub requester_role: Option<RequesterRole>,
    pub final_status: Option<GateStatus>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl RequestFilter {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(start), Some(end)) = (self.created_from, self.created_to) {
            if start > end {
                return Err(ValidationError::InvertedDateRange {
                    start: start.to_rfc3339(),
                    end: end.to_rfc3339(),
                });
            }
        }
        Ok(())
    }

    pub fn matches(&self, request: &Request) -> bool {
        self.requester_id.as_ref().map_or(true, |id| &request.requester_id == id)
            && self.requester_role.map_or(true, |role| request.requester_role == role)
            && self.final_status.map_or(true, |status| request.final_status == status)
            && self.created_from.map_or(true, |from| request.created_at >= from)
            && self.created_to.map_or(true, |to| request.created_at <= to)
    }
}

/// Reporting filter as it arrives from a query string or the command line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRequestFilter {
    #[serde(alias = "studentId")]
    pub requester_id: Option<String>,
    pub requester_role: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl RawRequestFilter {
    /// Parses and validates every field. Blank values mean "no constraint".
    pub fn parse(self) -> Result<RequestFilter, ValidationError> {
        let filter = RequestFilter {
            requester_id: non_blank(self.requester_id).map(RequesterId),
            requester_role: non_blank(self.requester_role).map(|raw| raw.parse()).transpose()?,
            final_status: non_blank(self.status).map(|raw| raw.parse()).transpose()?,
            created_from: non_blank(self.start_date)
                .map(|raw| parse_date_bound("startDate", &raw))
                .transpose()?,
            created_to: non_blank(self.end_date)
                .map(|raw| parse_date_bound("endDate", &raw))
                .transpose()?,
        };
        filter.validate()?;
        Ok(filter)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty())
}

/// Accepts an RFC 3339 timestamp or a bare date, which means midnight UTC.
pub fn parse_date_bound(field: &'static str, raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| ValidationError::InvalidDate { field, value: raw.to_string() })
}

/// What a store lookup should return. Every variant is ordered most-recent-first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestSelector {
    Worklist(Worklist),
    Requester(RequesterId),
    Filter(RequestFilter),
}

impl RequestSelector {
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            Self::Worklist(worklist) => worklist.matches(request),
            Self::Requester(id) => &request.requester_id == id,
            Self::Filter(filter) => filter.matches(request),
        }
    }
}

/// Newest first; equal timestamps fall back to descending id so output is stable.
pub fn most_recent_first(a: &Request, b: &Request) -> Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub staff_pending: usize,
    pub hod_pending: usize,
}

impl RequestStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Request>) -> Self {
        records.into_iter().fold(Self::default(), |mut stats, request| {
            stats.total += 1;
            match request.final_status {
                GateStatus::Pending => stats.pending += 1,
                GateStatus::Approved => stats.approved += 1,
                GateStatus::Rejected => stats.rejected += 1,
            }
            if Worklist::Staff.matches(request) {
                stats.staff_pending += 1;
            }
            if Worklist::Hod.matches(request) {
                stats.hod_pending += 1;
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{
        most_recent_first, RawRequestFilter, RequestFilter, RequestSelector, RequestStats,
        Worklist,
    };
    use crate::errors::ValidationError;
    use crate::domain::request::{
        Decision, GateStatus, Request, RequestId, RequesterId, RequesterRole,
    };

    fn at(minute: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().expect("valid timestamp")
            + Duration::minutes(minute)
    }

    fn request(id: &str, requester: &str, role: RequesterRole, minute: i64) -> Request {
        let mut request =
            Request::submit(RequesterId(requester.to_string()), role, "Title", "Body", at(minute))
                .expect("valid submission");
        request.id = RequestId(id.to_string());
        request
    }

    /// One record in every reachable state of both tracks.
    fn every_state() -> Vec<Request> {
        let student_pending = request("r-1", "alice", RequesterRole::Student, 1);
        let student_staff_approved = request("r-2", "bob", RequesterRole::Student, 2)
            .staff_decide(Decision::Approved, at(10))
            .expect("staff approves");
        let student_staff_rejected = request("r-3", "alice", RequesterRole::Student, 3)
            .staff_decide(Decision::Rejected, at(10))
            .expect("staff rejects");
        let student_approved = request("r-4", "bob", RequesterRole::Student, 4)
            .staff_decide(Decision::Approved, at(10))
            .and_then(|r| r.hod_decide(Decision::Approved, at(11)))
            .expect("fully approved");
        let staff_pending = request("r-5", "jane", RequesterRole::Staff, 5);
        let staff_rejected = request("r-6", "jane", RequesterRole::Staff, 6)
            .hod_decide(Decision::Rejected, at(12))
            .expect("HOD rejects");

        vec![
            student_pending,
            student_staff_approved,
            student_staff_rejected,
            student_approved,
            staff_pending,
            staff_rejected,
        ]
    }

    fn ids<'a>(records: impl IntoIterator<Item = &'a Request>) -> Vec<&'a str> {
        records.into_iter().map(|r| r.id.0.as_str()).collect()
    }

    #[test]
    fn staff_worklist_only_holds_pending_student_requests() {
        let records = every_state();
        let staff = records.iter().filter(|r| Worklist::Staff.matches(r));
        assert_eq!(ids(staff), vec!["r-1"]);
    }

    #[test]
    fn hod_worklist_is_the_union_of_both_tracks() {
        let records = every_state();
        let hod = records.iter().filter(|r| Worklist::Hod.matches(r));
        assert_eq!(ids(hod), vec!["r-2", "r-5"]);
    }

    #[test]
    fn worklists_never_overlap() {
        for record in every_state() {
            assert!(
                !(Worklist::Staff.matches(&record) && Worklist::Hod.matches(&record)),
                "{} appears in both worklists",
                record.id
            );
        }
    }

    #[test]
    fn stats_partition_total_by_final_status() {
        let records = every_state();
        let stats = RequestStats::from_records(&records);

        assert_eq!(
            stats,
            RequestStats {
                total: 6,
                pending: 3,
                approved: 1,
                rejected: 2,
                staff_pending: 1,
                hod_pending: 2,
            }
        );
        assert_eq!(stats.total, stats.pending + stats.approved + stats.rejected);
        assert_eq!(RequestStats::from_records(std::iter::empty()), RequestStats::default());
    }

    #[test]
    fn filters_are_anded_with_inclusive_time_bounds() {
        let records = every_state();

        let alice_rejected = RequestFilter {
            requester_id: Some(RequesterId("alice".to_string())),
            final_status: Some(GateStatus::Rejected),
            ..RequestFilter::default()
        };
        assert_eq!(ids(records.iter().filter(|r| alice_rejected.matches(r))), vec!["r-3"]);

        let window = RequestFilter {
            created_from: Some(at(2)),
            created_to: Some(at(4)),
            ..RequestFilter::default()
        };
        assert_eq!(ids(records.iter().filter(|r| window.matches(r))), vec!["r-2", "r-3", "r-4"]);

        let staff_only = RequestSelector::Filter(RequestFilter {
            requester_role: Some(RequesterRole::Staff),
            ..RequestFilter::default()
        });
        assert_eq!(ids(records.iter().filter(|r| staff_only.matches(r))), vec!["r-5", "r-6"]);

        let unconstrained = RequestFilter::default();
        assert_eq!(records.iter().filter(|r| unconstrained.matches(r)).count(), records.len());
    }

    #[test]
    fn inverted_date_range_is_rejected() {
        let filter = RequestFilter {
            created_from: Some(at(5)),
            created_to: Some(at(1)),
            ..RequestFilter::default()
        };
        assert!(filter.validate().is_err());
        assert!(RequestFilter::default().validate().is_ok());
    }

    #[test]
    fn ordering_is_newest_first_with_stable_ties() {
        let mut records = every_state();
        records.push(request("r-0", "carol", RequesterRole::Student, 6));
        records.sort_by(most_recent_first);

        assert_eq!(ids(&records), vec!["r-6", "r-0", "r-5", "r-4", "r-3", "r-2", "r-1"]);
    }

    #[test]
    fn raw_filters_parse_dates_and_ignore_blank_fields() {
        let filter = RawRequestFilter {
            requester_id: Some("  ".to_string()),
            requester_role: Some("staff".to_string()),
            status: Some("Rejected".to_string()),
            start_date: Some("2026-03-02".to_string()),
            end_date: Some("2026-03-02T09:06:00Z".to_string()),
        }
        .parse()
        .expect("valid filter");

        assert_eq!(filter.requester_id, None);
        assert_eq!(filter.requester_role, Some(RequesterRole::Staff));
        assert_eq!(filter.final_status, Some(GateStatus::Rejected));
        assert_eq!(filter.created_from, Some(at(-540)));
        assert_eq!(filter.created_to, Some(at(6)));

        let matched = every_state().into_iter().filter(|r| filter.matches(r)).collect::<Vec<_>>();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, RequestId("r-6".to_string()));
    }

    #[test]
    fn raw_filters_reject_unparseable_values() {
        let bad_date = RawRequestFilter {
            start_date: Some("last tuesday".to_string()),
            ..RawRequestFilter::default()
        };
        assert_eq!(
            bad_date.parse(),
            Err(ValidationError::InvalidDate {
                field: "startDate",
                value: "last tuesday".to_string()
            })
        );

        let inverted = RawRequestFilter {
            start_date: Some("2026-03-03".to_string()),
            end_date: Some("2026-03-02".to_string()),
            ..RawRequestFilter::default()
        };
        assert!(matches!(inverted.parse(), Err(ValidationError::InvertedDateRange { .. })));

        let bad_status =
            RawRequestFilter { status: Some("maybe".to_string()), ..RawRequestFilter::default() };
        assert!(bad_status.parse().is_err());
    }

    #[test]
    fn student_id_is_accepted_as_a_requester_id_alias() {
        let raw: RawRequestFilter =
            serde_json::from_str(r#"{"studentId":"alice"}"#).expect("deserialize");
        assert_eq!(raw.requester_id.as_deref(), Some("alice"));
    }
}
