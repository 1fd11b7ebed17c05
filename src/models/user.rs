use rorm::{Model, Patch};
use uuid::Uuid;

/// A registered user.
///
/// Accounts are created on the first successful verification of an emailed
/// login code, so there is no password.
#[derive(Model)]
pub struct User {
    /// The primary key of a user
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The email address the user logs in with
    #[rorm(max_length = 255, unique)]
    pub email: String,

    /// The name that is displayed to the partner
    #[rorm(max_length = 255)]
    pub display_name: String,

    /// Whether the email address was confirmed through a login code
    pub email_verified: bool,

    /// The point in time the user was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,

    /// The point in time the user was last updated
    #[rorm(auto_create_time, auto_update_time)]
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "User")]
pub(crate) struct UserInsert {
    pub(crate) uuid: Uuid,
    pub(crate) email: String,
    pub(crate) display_name: String,
    pub(crate) email_verified: bool,
}
