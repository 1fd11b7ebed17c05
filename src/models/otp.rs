use rorm::{Model, Patch};
use uuid::Uuid;

/// A one-time login code that was emailed to an address.
///
/// The address doesn't have to belong to a registered user yet: the user
/// record is created on the first successful verification.
#[derive(Model)]
pub struct OneTimeCode {
    /// The primary key of a login code
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The address the code was issued for
    #[rorm(max_length = 255)]
    pub email: String,

    /// The code itself
    #[rorm(max_length = 8)]
    pub code: String,

    /// The point in time the code stops being accepted
    pub expires_at: chrono::NaiveDateTime,

    /// Whether the code has already been redeemed
    pub used: bool,

    /// The point in time the code was issued
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,
}

impl OneTimeCode {
    /// Whether the code's deadline has passed
    pub fn is_expired(&self, now: chrono::NaiveDateTime) -> bool {
        now > self.expires_at
    }
}

#[derive(Patch)]
#[rorm(model = "OneTimeCode")]
pub(crate) struct OneTimeCodeInsert {
    pub(crate) uuid: Uuid,
    pub(crate) email: String,
    pub(crate) code: String,
    pub(crate) expires_at: chrono::NaiveDateTime,
    pub(crate) used: bool,
}
