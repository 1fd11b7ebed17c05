use rorm::fields::types::ForeignModel;
use rorm::{DbEnum, Model, Patch};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::User;

/// The state of a partner request
#[derive(DbEnum, Serialize, Deserialize, ToSchema, Copy, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PartnerRequestStatus {
    /// The recipient has not responded yet
    Pending,
    /// The recipient accepted, a partnership was formed
    Accepted,
    /// The recipient declined
    Rejected,
    /// Retracted by the sender or superseded by another accepted request
    Cancelled,
}

/// A directed invitation to become partners.
///
/// The recipient is addressed by email and may not be registered yet;
/// `recipient` is resolved to a user as soon as one exists for the address.
#[derive(Model)]
pub struct PartnerRequest {
    /// The primary key of a partner request
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The user that sent the request
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub sender: ForeignModel<User>,

    /// The address the request was sent to
    #[rorm(max_length = 255)]
    pub recipient_email: String,

    /// The addressed user, if they were registered at any point so far
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub recipient: Option<ForeignModel<User>>,

    /// The state of the request
    pub status: PartnerRequestStatus,

    /// The point in time the request was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,

    /// The point in time the request was last updated
    #[rorm(auto_create_time, auto_update_time)]
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "PartnerRequest")]
pub(crate) struct PartnerRequestInsert {
    pub(crate) uuid: Uuid,
    pub(crate) sender: ForeignModel<User>,
    pub(crate) recipient_email: String,
    pub(crate) recipient: Option<ForeignModel<User>>,
    pub(crate) status: PartnerRequestStatus,
}

/// An exclusive pairing of two users.
///
/// `user_one` always holds the smaller uuid (see
/// [`ordered_pair`](crate::models::ordered_pair)), so one canonical row
/// represents the pair no matter who initiated. The unique constraint on
/// each column keeps every user in at most one partnership; concurrent
/// accepts involving the same user collide here instead of corrupting state.
#[derive(Model)]
pub struct Partnership {
    /// The primary key of a partnership
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The partner with the smaller uuid
    #[rorm(unique, on_delete = "Cascade", on_update = "Cascade")]
    pub user_one: ForeignModel<User>,

    /// The partner with the larger uuid
    #[rorm(unique, on_delete = "Cascade", on_update = "Cascade")]
    pub user_two: ForeignModel<User>,

    /// The point in time the partnership was formed
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "Partnership")]
pub(crate) struct PartnershipInsert {
    pub(crate) uuid: Uuid,
    pub(crate) user_one: ForeignModel<User>,
    pub(crate) user_two: ForeignModel<User>,
}
