//! Maintenance request lifecycle: creation, scoped listing, and guarded updates.
//!
//! Ownership is checked on every read and write. Consumers may only edit the
//! title and description of their own requests while they are still pending
//! approval; status moves are administrator-only and must follow
//! [`RequestStatus::successors`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use tracker_db::Store;
use tracker_db::models::NewRequest;
use tracker_types::models::{Identity, MaintenanceRequest, RequestKind, RequestPatch, RequestStatus};

use crate::error::{Result, ServiceError};

pub struct Lifecycle {
    store: Arc<dyn Store>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn create_request(
        &self,
        identity: &Identity,
        title: &str,
        description: &str,
        kind: RequestKind,
    ) -> Result<MaintenanceRequest> {
        let title = required("title", title)?;
        let description = required("description", description)?;

        let request = self.store.save_request(&NewRequest {
            user_id: identity.user_id,
            kind,
            title,
            description,
            requested_by: identity.email.clone(),
            date_requested: Utc::now(),
        })?;

        info!("Request {} created by user {}", request.id, identity.user_id);
        Ok(request)
    }

    /// Administrators see everything; consumers see their own. Ordered by id.
    pub fn list_requests(&self, identity: &Identity) -> Result<Vec<MaintenanceRequest>> {
        let requests = if identity.is_admin() {
            self.store.get_requests()?
        } else {
            self.store.get_my_requests(identity.user_id)?
        };
        Ok(requests)
    }

    pub fn get_request(&self, identity: &Identity, request_id: i64) -> Result<MaintenanceRequest> {
        let request = self.load(request_id)?;
        ensure_visible(identity, &request)?;
        Ok(request)
    }

    /// Apply `changes` to a request, writing only the fields that differ.
    ///
    /// `expected_version`, when given, must match the stored version or the
    /// call fails with a conflict before anything is written.
    pub fn update_request(
        &self,
        identity: &Identity,
        request_id: i64,
        changes: RequestPatch,
        expected_version: Option<i64>,
    ) -> Result<MaintenanceRequest> {
        let current = self.load(request_id)?;
        ensure_visible(identity, &current)?;

        if let Some(version) = expected_version {
            if version != current.version {
                return Err(ServiceError::Conflict(format!(
                    "request {} is at version {}, not {}",
                    request_id, current.version, version
                )));
            }
        }

        let changes = RequestPatch {
            title: changes.title.map(|t| t.trim().to_string()),
            description: changes.description.map(|d| d.trim().to_string()),
            ..changes
        };
        let diff = changes.diff_against(&current);
        if diff.is_empty() {
            return Ok(current);
        }

        if !identity.is_admin() {
            if diff.status.is_some() {
                warn!("User {} tried to change status of request {}", identity.user_id, request_id);
                return Err(ServiceError::Forbidden(
                    "only administrators can change a request's status".into(),
                ));
            }
            if !diff.is_content_only() {
                return Err(ServiceError::Forbidden(
                    "only the title and description of a request can be edited".into(),
                ));
            }
            if current.status != RequestStatus::PendingApproval {
                warn!("User {} tried to edit request {} after review", identity.user_id, request_id);
                return Err(ServiceError::Forbidden(format!(
                    "request {} can no longer be edited, it is {}",
                    request_id, current.status
                )));
            }
        }

        if diff.title.as_deref() == Some("") {
            return Err(ServiceError::Validation("title must not be empty".into()));
        }
        if diff.description.as_deref() == Some("") {
            return Err(ServiceError::Validation("description must not be empty".into()));
        }

        if let Some(next) = diff.status {
            if !current.status.can_transition_to(next) {
                return Err(ServiceError::Validation(format!(
                    "cannot move request {} from {} to {}",
                    request_id, current.status, next
                )));
            }
        }

        let updated = self
            .store
            .update_request(request_id, &diff, current.version, Utc::now())?
            .ok_or_else(|| not_found(request_id))?;

        match diff.status {
            Some(status) => info!(
                "Request {} moved {} -> {} by user {}",
                request_id, current.status, status, identity.user_id
            ),
            None => info!("Request {} edited by user {}", request_id, identity.user_id),
        }
        Ok(updated)
    }

    fn load(&self, request_id: i64) -> Result<MaintenanceRequest> {
        self.store
            .get_request_by_id(request_id)?
            .ok_or_else(|| not_found(request_id))
    }
}

fn ensure_visible(identity: &Identity, request: &MaintenanceRequest) -> Result<()> {
    if identity.is_admin() || request.user_id == identity.user_id {
        Ok(())
    } else {
        warn!("User {} denied access to request {}", identity.user_id, request.id);
        Err(ServiceError::Forbidden(format!(
            "request {} belongs to another user",
            request.id
        )))
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}

fn not_found(request_id: i64) -> ServiceError {
    ServiceError::NotFound(format!("request {} does not exist", request_id))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::testing::Fixture;

    fn title(t: &str) -> RequestPatch {
        RequestPatch {
            title: Some(t.into()),
            ..Default::default()
        }
    }

    fn status(s: RequestStatus) -> RequestPatch {
        RequestPatch {
            status: Some(s),
            ..Default::default()
        }
    }

    #[test]
    fn create_sets_owner_and_defaults() {
        let fx = Fixture::new();
        let alice = fx.consumer("a@x.com");

        let req = fx
            .lifecycle
            .create_request(&alice, "Leaky sink", "Kitchen", RequestKind::Repair)
            .unwrap();

        assert_eq!(req.user_id, alice.user_id);
        assert_eq!(req.requested_by, "a@x.com");
        assert_eq!(req.status, RequestStatus::PendingApproval);
        assert_eq!(req.kind, RequestKind::Repair);
    }

    #[test]
    fn create_rejects_blank_fields() {
        let fx = Fixture::new();
        let alice = fx.consumer("a@x.com");

        for (t, d) in [("", "Kitchen"), ("Leaky sink", "   ")] {
            let err = fx
                .lifecycle
                .create_request(&alice, t, d, RequestKind::Repair)
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert!(fx.lifecycle.list_requests(&alice).unwrap().is_empty());
    }

    #[test]
    fn consumers_cannot_see_each_others_requests() {
        let fx = Fixture::new();
        let alice = fx.consumer("a@x.com");
        let bob = fx.consumer("b@x.com");
        let req = fx.request(&alice, "Leaky sink");

        let err = fx.lifecycle.get_request(&bob, req.id).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = fx.lifecycle.update_request(&bob, req.id, title("Mine now"), None).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        assert_eq!(fx.lifecycle.get_request(&alice, req.id).unwrap(), req);
        let admin = fx.admin("root@x.com");
        assert_eq!(fx.lifecycle.get_request(&admin, req.id).unwrap(), req);
    }

    #[test]
    fn missing_request_is_not_found() {
        let fx = Fixture::new();
        let admin = fx.admin("root@x.com");
        assert!(matches!(
            fx.lifecycle.get_request(&admin, 404).unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            fx.lifecycle.update_request(&admin, 404, title("x"), None).unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[test]
    fn admin_listing_is_union_of_consumer_listings() {
        let fx = Fixture::new();
        let consumers = [fx.consumer("a@x.com"), fx.consumer("b@x.com"), fx.consumer("c@x.com")];
        for (i, c) in consumers.iter().enumerate() {
            for n in 0..=i {
                fx.request(c, &format!("request {n}"));
            }
        }
        let admin = fx.admin("root@x.com");

        let all: Vec<i64> = fx
            .lifecycle
            .list_requests(&admin)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        let mut sorted = all.clone();
        sorted.sort();
        assert_eq!(all, sorted);

        let mut union = BTreeSet::new();
        let mut total = 0;
        for c in &consumers {
            let mine = fx.lifecycle.list_requests(c).unwrap();
            assert!(mine.iter().all(|r| r.user_id == c.user_id));
            total += mine.len();
            union.extend(mine.into_iter().map(|r| r.id));
        }
        assert_eq!(total, union.len());
        assert_eq!(all.into_iter().collect::<BTreeSet<_>>(), union);
    }

    #[test]
    fn identical_update_is_a_no_op() {
        let fx = Fixture::new();
        let alice = fx.consumer("a@x.com");
        let req = fx.request(&alice, "Leaky sink");

        let same = RequestPatch {
            kind: Some(req.kind),
            title: Some(req.title.clone()),
            description: Some(req.description.clone()),
            status: Some(req.status),
        };
        let after = fx.lifecycle.update_request(&alice, req.id, same, None).unwrap();
        assert_eq!(after, req);
        assert_eq!(after.last_modified, req.last_modified);
        assert_eq!(after.version, req.version);
    }

    #[test]
    fn approval_scenario() {
        let fx = Fixture::new();
        let alice = fx.consumer("a@x.com");
        let admin = fx.admin("root@x.com");
        let req = fx.request(&alice, "Leaky sink");

        let approved = fx
            .lifecycle
            .update_request(&admin, req.id, status(RequestStatus::Approved), None)
            .unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(approved.last_modified > req.last_modified);
        assert_eq!(approved.title, req.title);
        assert_eq!(approved.description, req.description);

        let err = fx
            .lifecycle
            .update_request(&alice, req.id, title("Very leaky sink"), None)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert_eq!(fx.lifecycle.get_request(&alice, req.id).unwrap().title, "Leaky sink");
    }

    #[test]
    fn owner_edits_content_while_pending() {
        let fx = Fixture::new();
        let alice = fx.consumer("a@x.com");
        let req = fx.request(&alice, "Leaky sink");

        let patch = RequestPatch {
            title: Some("Leaky sink".into()),
            description: Some("Kitchen, under the counter".into()),
            ..Default::default()
        };
        let edited = fx.lifecycle.update_request(&alice, req.id, patch, None).unwrap();
        assert_eq!(edited.description, "Kitchen, under the counter");
        assert_eq!(edited.version, req.version + 1);

        let err = fx.lifecycle.update_request(&alice, req.id, title("  "), None).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn consumers_cannot_move_status_or_type() {
        let fx = Fixture::new();
        let alice = fx.consumer("a@x.com");
        let req = fx.request(&alice, "Leaky sink");

        let err = fx
            .lifecycle
            .update_request(&alice, req.id, status(RequestStatus::Approved), None)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let kind = RequestPatch {
            kind: Some(RequestKind::Maintenance),
            ..Default::default()
        };
        let err = fx.lifecycle.update_request(&alice, req.id, kind, None).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn illegal_transition_leaves_status_unchanged() {
        let fx = Fixture::new();
        let alice = fx.consumer("a@x.com");
        let admin = fx.admin("root@x.com");
        let req = fx.request(&alice, "Leaky sink");

        for next in [RequestStatus::Approved, RequestStatus::InProgress, RequestStatus::Resolved] {
            fx.lifecycle.update_request(&admin, req.id, status(next), None).unwrap();
        }

        let err = fx
            .lifecycle
            .update_request(&admin, req.id, status(RequestStatus::PendingApproval), None)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let stored = fx.lifecycle.get_request(&admin, req.id).unwrap();
        assert_eq!(stored.status, RequestStatus::Resolved);
    }

    #[test]
    fn skipping_a_step_is_rejected() {
        let fx = Fixture::new();
        let alice = fx.consumer("a@x.com");
        let admin = fx.admin("root@x.com");
        let req = fx.request(&alice, "Leaky sink");

        let err = fx
            .lifecycle
            .update_request(&admin, req.id, status(RequestStatus::Resolved), None)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn stale_version_conflicts() {
        let fx = Fixture::new();
        let alice = fx.consumer("a@x.com");
        let admin = fx.admin("root@x.com");
        let req = fx.request(&alice, "Leaky sink");

        fx.lifecycle
            .update_request(&admin, req.id, status(RequestStatus::Approved), Some(req.version))
            .unwrap();
        let err = fx
            .lifecycle
            .update_request(&admin, req.id, status(RequestStatus::InProgress), Some(req.version))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}
