use rorm::fields::types::{ForeignModel, Json};
use rorm::{insert, query, Database, DbEnum, FieldAccess, Model, Patch};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::{uuid, Uuid};

use crate::models::User;
use crate::rules::PlayData;

/// The stable catalog uuid of Bulls and Cows
pub const BULLS_AND_COWS_GAME: Uuid = uuid!("550e8400-e29b-41d4-a716-446655440001");

/// Discriminator selecting the rules engine that governs a game's plays
#[derive(Serialize, Deserialize, ToSchema, Copy, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    /// Take turns guessing the partner's secret 4-digit number
    BullsAndCows,
}

/// Catalog metadata of a game
#[derive(Serialize, Deserialize, ToSchema, Clone, Debug)]
pub struct GameDetails {
    /// Which rules engine governs plays of this game
    #[serde(rename = "type")]
    pub game_type: GameType,
}

/// A static catalog entry of a playable game
#[derive(Model)]
pub struct Game {
    /// The primary key of a game
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// Name of the game
    #[rorm(max_length = 255)]
    pub name: String,

    /// A short description shown in the catalog
    #[rorm(max_length = 1024)]
    pub description: String,

    /// An icon for the catalog, e.g. an emoji
    #[rorm(max_length = 16)]
    pub icon: String,

    /// Metadata of the game, most importantly the rules engine selector
    pub details: Json<GameDetails>,

    /// The point in time the entry was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,

    /// The point in time the entry was last updated
    #[rorm(auto_create_time, auto_update_time)]
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "Game")]
pub(crate) struct GameInsert {
    pub(crate) uuid: Uuid,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) icon: String,
    pub(crate) details: Json<GameDetails>,
}

/// Ensure the static game catalog exists.
///
/// Entries are keyed by fixed uuids, so repeated startups are idempotent.
pub async fn seed_catalog(db: &Database) -> Result<(), rorm::Error> {
    let existing = query!(db, Game)
        .condition(Game::F.uuid.equals(BULLS_AND_COWS_GAME))
        .optional()
        .await?;

    if existing.is_none() {
        insert!(db, GameInsert)
            .single(&GameInsert {
                uuid: BULLS_AND_COWS_GAME,
                name: "Bulls and Cows".to_string(),
                description: "Set a secret 4-digit number and take turns guessing your partner's."
                    .to_string(),
                icon: "🐮".to_string(),
                details: Json(GameDetails {
                    game_type: GameType::BullsAndCows,
                }),
            })
            .await?;
    }

    Ok(())
}

/// The state of a game request
#[derive(DbEnum, Serialize, Deserialize, ToSchema, Copy, Clone, Debug, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum GameRequestStatus {
    /// The partner has not responded yet
    Pending,
    /// Accepted, a play was spawned
    Accepted,
    /// The partner declined
    Rejected,
    /// The deadline passed before the partner responded
    Expired,
}

/// A directed invitation to start a specific game with the current partner.
///
/// Requests expire 24 hours after creation. Expiry is lazy: rows are flipped
/// to [GameRequestStatus::Expired] when pending requests are read, there is
/// no background sweep.
#[derive(Model)]
pub struct GameRequest {
    /// The primary key of a game request
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The requested game
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub game: ForeignModel<Game>,

    /// The user that wants to play
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub requester: ForeignModel<User>,

    /// The partner that has to respond
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub partner: ForeignModel<User>,

    /// The state of the request
    pub status: GameRequestStatus,

    /// The point in time the request stops being acceptable
    pub expires_at: chrono::NaiveDateTime,

    /// The point in time the request was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,

    /// The point in time the request was last updated
    #[rorm(auto_create_time, auto_update_time)]
    pub updated_at: chrono::NaiveDateTime,
}

impl GameRequest {
    /// Whether the request's deadline has passed
    pub fn is_expired(&self, now: chrono::NaiveDateTime) -> bool {
        now > self.expires_at
    }
}

#[derive(Patch)]
#[rorm(model = "GameRequest")]
pub(crate) struct GameRequestInsert {
    pub(crate) uuid: Uuid,
    pub(crate) game: ForeignModel<Game>,
    pub(crate) requester: ForeignModel<User>,
    pub(crate) partner: ForeignModel<User>,
    pub(crate) status: GameRequestStatus,
    pub(crate) expires_at: chrono::NaiveDateTime,
}

/// A live or ended game session between two partners.
///
/// `partner_one` is the user whose game request spawned the play and
/// `partner_two` the one who accepted; the columns are deliberately not
/// canonicalized. Lookups for "the live play of a pair" canonicalize first
/// and match both orders, which keeps at most one live row per
/// (game, unordered pair).
#[derive(Model)]
pub struct Play {
    /// The primary key of a play
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The game being played
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub game: ForeignModel<Game>,

    /// The requesting partner
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub partner_one: ForeignModel<User>,

    /// The accepting partner
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub partner_two: ForeignModel<User>,

    /// The state document owned by the game's rules engine
    pub data: Json<PlayData>,

    /// Whether the play is still going on
    pub is_live: bool,

    /// Incremented on every write to `data`.
    ///
    /// Mutations are conditioned on the version they read, so two players
    /// racing on the same play can never silently drop each other's action.
    #[rorm(default = 0)]
    pub version: i64,

    /// The point in time the play was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,

    /// The point in time the play was last updated
    #[rorm(auto_create_time, auto_update_time)]
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "Play")]
pub(crate) struct PlayInsert {
    pub(crate) uuid: Uuid,
    pub(crate) game: ForeignModel<Game>,
    pub(crate) partner_one: ForeignModel<User>,
    pub(crate) partner_two: ForeignModel<User>,
    pub(crate) data: Json<PlayData>,
    pub(crate) is_live: bool,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDateTime, Utc};
    use rorm::fields::types::ForeignModelByField;
    use uuid::Uuid;

    use super::{GameRequest, GameRequestStatus, BULLS_AND_COWS_GAME};

    fn request_expiring_at(expires_at: NaiveDateTime) -> GameRequest {
        let now = Utc::now().naive_utc();
        GameRequest {
            uuid: Uuid::new_v4(),
            game: ForeignModelByField::Key(BULLS_AND_COWS_GAME),
            requester: ForeignModelByField::Key(Uuid::new_v4()),
            partner: ForeignModelByField::Key(Uuid::new_v4()),
            status: GameRequestStatus::Pending,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn requests_expire_once_the_deadline_has_passed() {
        let now = Utc::now().naive_utc();

        assert!(request_expiring_at(now - Duration::seconds(1)).is_expired(now));
        assert!(!request_expiring_at(now + Duration::hours(24)).is_expired(now));
    }

    #[test]
    fn the_deadline_itself_is_still_acceptable() {
        let now = Utc::now().naive_utc();

        assert!(!request_expiring_at(now).is_expired(now));
    }
}
