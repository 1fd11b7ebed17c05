//! This module holds all endpoints regarding running and ended plays

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path};
use actix_web::{get, post};
use chrono::{DateTime, Utc};
use rorm::db::transaction::Transaction;
use rorm::fields::types::Json as DbJson;
use rorm::{and, query, update, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Play;
use crate::rules::{PlayData, RulesError, Seat};
use crate::server::handler::games::{live_play, partner_of};
use crate::server::handler::{ApiError, ApiErrorResponse, ApiResult, PathUuid};

/// A play as served to one of its participants.
///
/// `data` is redacted for the requesting player, their partner's secret is
/// only visible once the play completed.
#[derive(Serialize, ToSchema)]
pub struct PlayResponse {
    uuid: Uuid,
    game_uuid: Uuid,
    partner_one: Uuid,
    partner_two: Uuid,
    is_live: bool,
    /// Incremented on every change, clients can use it to detect staleness
    version: i64,
    data: PlayData,
    created_at: DateTime<Utc>,
}

impl PlayResponse {
    fn from_play(play: &Play, seat: Seat) -> Self {
        Self {
            uuid: play.uuid,
            game_uuid: *play.game.key(),
            partner_one: *play.partner_one.key(),
            partner_two: *play.partner_two.key(),
            is_live: play.is_live,
            version: play.version,
            data: play.data.0.redacted_for(seat),
            created_at: DateTime::from_naive_utc_and_offset(play.created_at, Utc),
        }
    }
}

/// Retrieve the live play of a game with the current partner
#[utoipa::path(
    tag = "Plays",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The live play", body = PlayResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[get("/games/{uuid}/play")]
pub(crate) async fn get_live_play(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<PlayResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let mut tx = db.start_transaction().await?;

    let partner_uuid = partner_of(&mut tx, uuid).await?;

    let play = live_play(&mut tx, path.uuid, uuid, partner_uuid)
        .await?
        .ok_or(ApiError::NotFound)?;

    tx.commit().await?;

    let seat = seat_of(&play, uuid)?;

    Ok(Json(PlayResponse::from_play(&play, seat)))
}

/// Retrieve a single play, live or ended
#[utoipa::path(
    tag = "Plays",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The play", body = PlayResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[get("/plays/{uuid}")]
pub(crate) async fn get_play(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<PlayResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let play = query!(db.as_ref(), Play)
        .condition(Play::F.uuid.equals(path.uuid))
        .optional()
        .await?
        .ok_or(ApiError::NotFound)?;

    let seat = seat_of(&play, uuid)?;

    Ok(Json(PlayResponse::from_play(&play, seat)))
}

/// The request to commit a secret
#[derive(Deserialize, ToSchema)]
pub struct SetSecretRequest {
    #[schema(example = "1234")]
    secret: String,
}

/// Commit the executing user's secret for a play.
///
/// Once both secrets are in the play starts and the requester's partner one
/// has the first turn.
#[utoipa::path(
    tag = "Plays",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The updated play", body = PlayResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    request_body = SetSecretRequest,
    security(("session_cookie" = []))
)]
#[post("/plays/{uuid}/secret")]
pub(crate) async fn set_secret(
    path: Path<PathUuid>,
    req: Json<SetSecretRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<PlayResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let mut tx = db.start_transaction().await?;

    let mut play = query!(&mut tx, Play)
        .condition(Play::F.uuid.equals(path.uuid))
        .optional()
        .await?
        .ok_or(ApiError::NotFound)?;

    let seat = seat_of(&play, uuid)?;

    if !play.is_live {
        return Err(ApiError::Rules(RulesError::WrongPhase));
    }

    let partner_one = *play.partner_one.key();

    let mut data = play.data.0.clone();
    match &mut data {
        PlayData::BullsAndCows(state) => state.set_secret(seat, &req.secret, partner_one)?,
    }

    commit_play_data(&mut tx, &play, data.clone(), true).await?;

    tx.commit().await?;

    play.data = DbJson(data);
    play.version += 1;

    Ok(Json(PlayResponse::from_play(&play, seat)))
}

/// The request to make a guess
#[derive(Deserialize, ToSchema)]
pub struct MakeGuessRequest {
    #[schema(example = "4321")]
    guess: String,
}

/// The outcome of a guess
#[derive(Serialize, ToSchema)]
pub struct GuessResponse {
    #[schema(example = 2)]
    bulls: u8,
    #[schema(example = 1)]
    cows: u8,
    play: PlayResponse,
}

/// Make a guess in a play.
///
/// It has to be the executing user's turn. 4 bulls complete the play.
#[utoipa::path(
    tag = "Plays",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The scored guess", body = GuessResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    request_body = MakeGuessRequest,
    security(("session_cookie" = []))
)]
#[post("/plays/{uuid}/guess")]
pub(crate) async fn make_guess(
    path: Path<PathUuid>,
    req: Json<MakeGuessRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<GuessResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let now = Utc::now();

    let mut tx = db.start_transaction().await?;

    let mut play = query!(&mut tx, Play)
        .condition(Play::F.uuid.equals(path.uuid))
        .optional()
        .await?
        .ok_or(ApiError::NotFound)?;

    let seat = seat_of(&play, uuid)?;

    if !play.is_live {
        return Err(ApiError::Rules(RulesError::WrongPhase));
    }

    let opponent = match seat {
        Seat::PartnerOne => *play.partner_two.key(),
        Seat::PartnerTwo => *play.partner_one.key(),
    };

    let mut data = play.data.0.clone();
    let (bulls, cows) = match &mut data {
        PlayData::BullsAndCows(state) => state.make_guess(seat, uuid, opponent, &req.guess, now)?,
    };

    let still_live = match &data {
        PlayData::BullsAndCows(state) => !state.is_completed(),
    };

    commit_play_data(&mut tx, &play, data.clone(), still_live).await?;

    tx.commit().await?;

    play.data = DbJson(data);
    play.version += 1;
    play.is_live = still_live;

    Ok(Json(GuessResponse {
        bulls,
        cows,
        play: PlayResponse::from_play(&play, seat),
    }))
}

/// The seat the user occupies in the play, [ApiError::MissingPrivileges] for
/// everyone else
fn seat_of(play: &Play, uuid: Uuid) -> ApiResult<Seat> {
    if *play.partner_one.key() == uuid {
        Ok(Seat::PartnerOne)
    } else if *play.partner_two.key() == uuid {
        Ok(Seat::PartnerTwo)
    } else {
        Err(ApiError::MissingPrivileges)
    }
}

/// Write a new state document for the play.
///
/// The write is conditioned on the version the handler has read and on the
/// play still being live, so a concurrent action or an ended play makes it
/// miss. Zero affected rows surface as [ApiError::PlayModified] and the
/// client has to re-read and retry.
async fn commit_play_data(
    tx: &mut Transaction,
    play: &Play,
    data: PlayData,
    still_live: bool,
) -> ApiResult<()> {
    let affected = update!(&mut *tx, Play)
        .condition(and!(
            Play::F.uuid.equals(play.uuid),
            Play::F.version.equals(play.version),
            Play::F.is_live.equals(true)
        ))
        .set(Play::F.data, DbJson(data))
        .set(Play::F.version, play.version + 1)
        .set(Play::F.is_live, still_live)
        .exec()
        .await?;

    if affected == 0 {
        return Err(ApiError::PlayModified);
    }

    Ok(())
}
