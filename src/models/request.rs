//! Exchange request model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::user::Actor;
use crate::repository::{CollectionName, Record};

/// Lifecycle state of an exchange request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

/// Exchange request record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub requester_id: Uuid,
    pub requester_name: String,
    pub owner_id: Uuid,
    pub status: RequestStatus,
    pub safe_zone: Option<String>,
    /// Six decimal digits, issued on accept
    pub meeting_code: Option<String>,
    pub owner_confirmed: bool,
    pub requester_confirmed: bool,
    pub rated: bool,
    pub reported: bool,
    pub report_reason: Option<String>,
    pub reported_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// State transitions of a request.
///
/// The confirmation patches complete the request when the other side has
/// already confirmed.
#[derive(Debug, Clone)]
pub enum RequestPatch {
    Accept {
        safe_zone: String,
        meeting_code: String,
    },
    Reject,
    ConfirmRequester,
    ConfirmOwner,
    MarkRated,
    Report {
        reason: String,
        reporter: Uuid,
    },
}

impl ExchangeRequest {
    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    pub fn is_requester(&self, user_id: Uuid) -> bool {
        self.requester_id == user_id
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.is_owner(user_id) || self.is_requester(user_id)
    }

    /// True when every field the state machine drives is unchanged
    pub fn same_state(&self, other: &ExchangeRequest) -> bool {
        self.status == other.status
            && self.owner_confirmed == other.owner_confirmed
            && self.requester_confirmed == other.requester_confirmed
            && self.rated == other.rated
            && self.reported == other.reported
    }
}

impl Record for ExchangeRequest {
    const COLLECTION: CollectionName = CollectionName::Requests;
    type Patch = RequestPatch;

    fn id(&self) -> Uuid {
        self.id
    }

    fn apply(&mut self, patch: RequestPatch) {
        match patch {
            RequestPatch::Accept {
                safe_zone,
                meeting_code,
            } => {
                self.status = RequestStatus::Accepted;
                self.safe_zone = Some(safe_zone);
                self.meeting_code = Some(meeting_code);
                self.owner_confirmed = false;
                self.requester_confirmed = false;
            }
            RequestPatch::Reject => self.status = RequestStatus::Rejected,
            RequestPatch::ConfirmRequester => {
                self.requester_confirmed = true;
                if self.owner_confirmed {
                    self.status = RequestStatus::Completed;
                }
            }
            RequestPatch::ConfirmOwner => {
                self.owner_confirmed = true;
                if self.requester_confirmed {
                    self.status = RequestStatus::Completed;
                }
            }
            RequestPatch::MarkRated => self.rated = true,
            RequestPatch::Report { reason, reporter } => {
                self.reported = true;
                self.report_reason = Some(reason);
                self.reported_by = Some(reporter);
            }
        }
    }
}

/// Request as returned to a viewer.
///
/// The meeting code is only disclosed to the requester (who shows it) and to
/// admins; the owner must obtain it in person.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub requester_id: Uuid,
    pub requester_name: String,
    pub owner_id: Uuid,
    pub status: RequestStatus,
    pub safe_zone: Option<String>,
    pub meeting_code: Option<String>,
    pub owner_confirmed: bool,
    pub requester_confirmed: bool,
    pub rated: bool,
    pub reported: bool,
    pub report_reason: Option<String>,
    pub reported_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl RequestView {
    pub fn for_viewer(request: ExchangeRequest, viewer: &Actor) -> Self {
        let reveal = request.is_requester(viewer.user_id) || viewer.is_admin();
        Self {
            id: request.id,
            item_id: request.item_id,
            item_name: request.item_name,
            requester_id: request.requester_id,
            requester_name: request.requester_name,
            owner_id: request.owner_id,
            status: request.status,
            safe_zone: request.safe_zone,
            meeting_code: if reveal { request.meeting_code } else { None },
            owner_confirmed: request.owner_confirmed,
            requester_confirmed: request.requester_confirmed,
            rated: request.rated,
            reported: request.reported,
            report_reason: request.report_reason,
            reported_by: request.reported_by,
            created_at: request.created_at,
        }
    }
}

/// Create request body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub item_id: Uuid,
}

/// Accept request body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRequest {
    pub safe_zone: String,
}

/// Owner's entry of the code shown by the requester
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyCode {
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateRequest {
    /// 1 to 5
    pub stars: u8,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReportRequest {
    pub reason: String,
}
