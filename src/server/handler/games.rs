//! This module holds all endpoints regarding the game catalog and game
//! requests

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path};
use actix_web::{get, post};
use chrono::{DateTime, Duration, Utc};
use rorm::db::transaction::Transaction;
use rorm::fields::types::Json as DbJson;
use rorm::fields::types::ForeignModelByField;
use rorm::{and, insert, or, query, update, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    ordered_pair, Game, GameRequest, GameRequestInsert, GameRequestStatus, GameType, Partnership,
    Play, PlayInsert, User,
};
use crate::rules::PlayData;
use crate::server::handler::{
    ApiError, ApiErrorResponse, ApiResult, PathUuid, UserResponse, UuidResponse,
};

/// Game requests expire this many hours after creation
const GAME_REQUEST_TTL_HOURS: i64 = 24;

/// A single catalog entry
#[derive(Serialize, ToSchema)]
pub struct GameResponse {
    uuid: Uuid,
    #[schema(example = "Bulls and Cows")]
    name: String,
    description: String,
    #[schema(example = "🐮")]
    icon: String,
    #[serde(rename = "type")]
    game_type: GameType,
}

/// The game catalog
#[derive(Serialize, ToSchema)]
pub struct GetGamesResponse {
    games: Vec<GameResponse>,
}

/// Retrieve the game catalog.
///
/// This endpoint is public.
#[utoipa::path(
    tag = "Games",
    responses(
        (status = 200, description = "The game catalog", body = GetGamesResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
)]
#[get("/api/v1/games")]
pub(crate) async fn get_games(db: Data<Database>) -> ApiResult<Json<GetGamesResponse>> {
    let mut games = query!(db.as_ref(), Game).all().await?;

    games.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(GetGamesResponse {
        games: games
            .into_iter()
            .map(|game| GameResponse {
                uuid: game.uuid,
                name: game.name,
                description: game.description,
                icon: game.icon,
                game_type: game.details.0.game_type,
            })
            .collect(),
    }))
}

/// The outcome of `play_or_request`, exactly one field is set
#[derive(Serialize, ToSchema)]
pub struct PlayOrRequestResponse {
    /// Set if there already is a live play of the game with the partner
    play_uuid: Option<Uuid>,
    /// Set if a game request was created or is still pending
    request_uuid: Option<Uuid>,
}

/// Jump into a game with the current partner.
///
/// If a live play of the game exists it is returned. Otherwise the executing
/// user's pending request for it is returned, or a fresh one is created.
/// Calling this repeatedly is safe, it never spawns duplicates.
#[utoipa::path(
    tag = "Games",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The live play or pending request", body = PlayOrRequestResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[post("/games/{uuid}/play-or-request")]
pub(crate) async fn play_or_request(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<PlayOrRequestResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let now = Utc::now().naive_utc();

    let mut tx = db.start_transaction().await?;

    let game = query!(&mut tx, Game)
        .condition(Game::F.uuid.equals(path.uuid))
        .optional()
        .await?
        .ok_or(ApiError::NotFound)?;

    let partner_uuid = partner_of(&mut tx, uuid).await?;

    if let Some(play) = live_play(&mut tx, game.uuid, uuid, partner_uuid).await? {
        tx.commit().await?;

        return Ok(Json(PlayOrRequestResponse {
            play_uuid: Some(play.uuid),
            request_uuid: None,
        }));
    }

    let pending = query!(&mut tx, GameRequest)
        .condition(and!(
            GameRequest::F.game.equals(game.uuid),
            GameRequest::F.requester.equals(uuid),
            GameRequest::F.partner.equals(partner_uuid),
            GameRequest::F.status.equals(GameRequestStatus::Pending)
        ))
        .optional()
        .await?;

    if let Some(pending) = pending {
        if !pending.is_expired(now) {
            tx.commit().await?;

            return Ok(Json(PlayOrRequestResponse {
                play_uuid: None,
                request_uuid: Some(pending.uuid),
            }));
        }

        // The old request timed out, flip it and issue a fresh one below
        update!(&mut tx, GameRequest)
            .condition(and!(
                GameRequest::F.uuid.equals(pending.uuid),
                GameRequest::F.status.equals(GameRequestStatus::Pending)
            ))
            .set(GameRequest::F.status, GameRequestStatus::Expired)
            .exec()
            .await?;
    }

    let request_uuid = insert!(&mut tx, GameRequestInsert)
        .return_primary_key()
        .single(&GameRequestInsert {
            uuid: Uuid::new_v4(),
            game: ForeignModelByField::Key(game.uuid),
            requester: ForeignModelByField::Key(uuid),
            partner: ForeignModelByField::Key(partner_uuid),
            status: GameRequestStatus::Pending,
            expires_at: now + Duration::hours(GAME_REQUEST_TTL_HOURS),
        })
        .await?;

    tx.commit().await?;

    Ok(Json(PlayOrRequestResponse {
        play_uuid: None,
        request_uuid: Some(request_uuid),
    }))
}

/// The request to invite the partner to a game
#[derive(Deserialize, ToSchema)]
pub struct CreateGameRequest {
    game_uuid: Uuid,
}

/// Invite the current partner to a game.
///
/// Unlike `play-or-request` this fails if the executing user already has a
/// pending request for the game.
#[utoipa::path(
    tag = "Games",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Game request has been created", body = UuidResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CreateGameRequest,
    security(("session_cookie" = []))
)]
#[post("/games/requests")]
pub(crate) async fn create_game_request(
    req: Json<CreateGameRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<UuidResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let now = Utc::now().naive_utc();

    let mut tx = db.start_transaction().await?;

    let game = query!(&mut tx, Game)
        .condition(Game::F.uuid.equals(req.game_uuid))
        .optional()
        .await?
        .ok_or(ApiError::NotFound)?;

    let partner_uuid = partner_of(&mut tx, uuid).await?;

    let pending = query!(&mut tx, GameRequest)
        .condition(and!(
            GameRequest::F.game.equals(game.uuid),
            GameRequest::F.requester.equals(uuid),
            GameRequest::F.partner.equals(partner_uuid),
            GameRequest::F.status.equals(GameRequestStatus::Pending)
        ))
        .optional()
        .await?;

    if let Some(pending) = pending {
        if !pending.is_expired(now) {
            return Err(ApiError::RequestAlreadyPending);
        }

        update!(&mut tx, GameRequest)
            .condition(and!(
                GameRequest::F.uuid.equals(pending.uuid),
                GameRequest::F.status.equals(GameRequestStatus::Pending)
            ))
            .set(GameRequest::F.status, GameRequestStatus::Expired)
            .exec()
            .await?;
    }

    let request_uuid = insert!(&mut tx, GameRequestInsert)
        .return_primary_key()
        .single(&GameRequestInsert {
            uuid: Uuid::new_v4(),
            game: ForeignModelByField::Key(game.uuid),
            requester: ForeignModelByField::Key(uuid),
            partner: ForeignModelByField::Key(partner_uuid),
            status: GameRequestStatus::Pending,
            expires_at: now + Duration::hours(GAME_REQUEST_TTL_HOURS),
        })
        .await?;

    tx.commit().await?;

    Ok(Json(UuidResponse { uuid: request_uuid }))
}

/// A pending game request addressed to the executing user
#[derive(Serialize, ToSchema)]
pub struct GameRequestResponse {
    uuid: Uuid,
    game: GameResponse,
    requester: UserResponse,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

/// The pending game requests addressed to the executing user
#[derive(Serialize, ToSchema)]
pub struct GetGameRequestsResponse {
    requests: Vec<GameRequestResponse>,
}

/// Retrieve the pending game requests addressed to the executing user.
///
/// Requests whose deadline passed are flipped to expired on the way and not
/// returned. The newest request comes first.
#[utoipa::path(
    tag = "Games",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The pending game requests", body = GetGameRequestsResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[get("/games/requests")]
pub(crate) async fn get_game_requests(
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<GetGameRequestsResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let now = Utc::now().naive_utc();

    let mut tx = db.start_transaction().await?;

    let pending = query!(&mut tx, GameRequest)
        .condition(and!(
            GameRequest::F.partner.equals(uuid),
            GameRequest::F.status.equals(GameRequestStatus::Pending)
        ))
        .all()
        .await?;

    let mut alive = Vec::new();
    for request in pending {
        if request.is_expired(now) {
            update!(&mut tx, GameRequest)
                .condition(and!(
                    GameRequest::F.uuid.equals(request.uuid),
                    GameRequest::F.status.equals(GameRequestStatus::Pending)
                ))
                .set(GameRequest::F.status, GameRequestStatus::Expired)
                .exec()
                .await?;
        } else {
            alive.push(request);
        }
    }

    alive.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut requests = Vec::with_capacity(alive.len());
    for request in alive {
        let game = query!(&mut tx, Game)
            .condition(Game::F.uuid.equals(*request.game.key()))
            .one()
            .await?;
        let requester = query!(&mut tx, User)
            .condition(User::F.uuid.equals(*request.requester.key()))
            .one()
            .await?;

        requests.push(GameRequestResponse {
            uuid: request.uuid,
            game: GameResponse {
                uuid: game.uuid,
                name: game.name,
                description: game.description,
                icon: game.icon,
                game_type: game.details.0.game_type,
            },
            requester: UserResponse {
                uuid: requester.uuid,
                email: requester.email,
                display_name: requester.display_name,
            },
            expires_at: DateTime::from_naive_utc_and_offset(request.expires_at, Utc),
            created_at: DateTime::from_naive_utc_and_offset(request.created_at, Utc),
        });
    }

    tx.commit().await?;

    Ok(Json(GetGameRequestsResponse { requests }))
}

/// The response to a game request
#[derive(Deserialize, ToSchema)]
pub struct RespondGameRequest {
    /// `true` accepts the request, `false` rejects it
    accept: bool,
}

/// The outcome of responding to a game request
#[derive(Serialize, ToSchema)]
pub struct RespondGameRequestResponse {
    /// The spawned play, set on accept
    play_uuid: Option<Uuid>,
}

/// Accept or reject a game request.
///
/// Accepting ends every live play of the pair and spawns a fresh play of the
/// requested game in one transaction.
#[utoipa::path(
    tag = "Games",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The request was responded to", body = RespondGameRequestResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    request_body = RespondGameRequest,
    security(("session_cookie" = []))
)]
#[post("/games/requests/{uuid}/respond")]
pub(crate) async fn respond_game_request(
    path: Path<PathUuid>,
    req: Json<RespondGameRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<RespondGameRequestResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let now = Utc::now().naive_utc();

    let mut tx = db.start_transaction().await?;

    let request = query!(&mut tx, GameRequest)
        .condition(GameRequest::F.uuid.equals(path.uuid))
        .optional()
        .await?
        .ok_or(ApiError::NotFound)?;

    if *request.partner.key() != uuid {
        return Err(ApiError::MissingPrivileges);
    }

    if request.status != GameRequestStatus::Pending {
        return Err(ApiError::RequestNotPending);
    }

    if request.is_expired(now) {
        update!(&mut tx, GameRequest)
            .condition(and!(
                GameRequest::F.uuid.equals(request.uuid),
                GameRequest::F.status.equals(GameRequestStatus::Pending)
            ))
            .set(GameRequest::F.status, GameRequestStatus::Expired)
            .exec()
            .await?;
        tx.commit().await?;

        return Err(ApiError::RequestExpired);
    }

    // The pending check above and the status flips below are separate
    // statements, a concurrent responder may take the request in between.
    // Conditioning the flip on the status it read and checking the affected
    // rows makes the loser fail instead of responding a second time.
    if !req.accept {
        let claimed = update!(&mut tx, GameRequest)
            .condition(and!(
                GameRequest::F.uuid.equals(request.uuid),
                GameRequest::F.status.equals(GameRequestStatus::Pending)
            ))
            .set(GameRequest::F.status, GameRequestStatus::Rejected)
            .exec()
            .await?;
        claim_pending(claimed)?;
        tx.commit().await?;

        return Ok(Json(RespondGameRequestResponse { play_uuid: None }));
    }

    let requester_uuid = *request.requester.key();

    let claimed = update!(&mut tx, GameRequest)
        .condition(and!(
            GameRequest::F.uuid.equals(request.uuid),
            GameRequest::F.status.equals(GameRequestStatus::Pending)
        ))
        .set(GameRequest::F.status, GameRequestStatus::Accepted)
        .exec()
        .await?;
    claim_pending(claimed)?;

    // One live play per pair: whatever was running is over now
    end_live_plays(&mut tx, requester_uuid, uuid).await?;

    let game = query!(&mut tx, Game)
        .condition(Game::F.uuid.equals(*request.game.key()))
        .one()
        .await?;

    let play_uuid = insert!(&mut tx, PlayInsert)
        .return_primary_key()
        .single(&PlayInsert {
            uuid: Uuid::new_v4(),
            game: ForeignModelByField::Key(game.uuid),
            partner_one: ForeignModelByField::Key(requester_uuid),
            partner_two: ForeignModelByField::Key(uuid),
            data: DbJson(PlayData::initial(game.details.0.game_type)),
            is_live: true,
        })
        .await?;

    tx.commit().await?;

    Ok(Json(RespondGameRequestResponse {
        play_uuid: Some(play_uuid),
    }))
}

/// Look up the executing user's partner
pub(crate) async fn partner_of(tx: &mut Transaction, uuid: Uuid) -> ApiResult<Uuid> {
    let partnership = query!(&mut *tx, Partnership)
        .condition(or!(
            Partnership::F.user_one.equals(uuid),
            Partnership::F.user_two.equals(uuid)
        ))
        .optional()
        .await?
        .ok_or(ApiError::NoPartner)?;

    Ok(if *partnership.user_one.key() == uuid {
        *partnership.user_two.key()
    } else {
        *partnership.user_one.key()
    })
}

/// The live play of a game between the unordered pair {a, b}, if any
pub(crate) async fn live_play(
    tx: &mut Transaction,
    game: Uuid,
    a: Uuid,
    b: Uuid,
) -> Result<Option<Play>, rorm::Error> {
    let (one, two) = ordered_pair(a, b);

    query!(&mut *tx, Play)
        .condition(and!(
            Play::F.game.equals(game),
            Play::F.is_live.equals(true),
            or!(
                and!(
                    Play::F.partner_one.equals(one),
                    Play::F.partner_two.equals(two)
                ),
                and!(
                    Play::F.partner_one.equals(two),
                    Play::F.partner_two.equals(one)
                )
            )
        ))
        .optional()
        .await
}

/// Interpret the affected-rows count of a pending-conditioned status flip.
///
/// Zero affected rows means a concurrent responder took the request after it
/// was read, the caller lost that race and must not act on the request.
fn claim_pending(affected: u64) -> ApiResult<()> {
    if affected == 0 {
        return Err(ApiError::RequestNotPending);
    }

    Ok(())
}

/// End every live play between the unordered pair {a, b}, regardless of game
pub(crate) async fn end_live_plays(
    tx: &mut Transaction,
    a: Uuid,
    b: Uuid,
) -> Result<(), rorm::Error> {
    let (one, two) = ordered_pair(a, b);

    update!(&mut *tx, Play)
        .condition(and!(
            Play::F.is_live.equals(true),
            or!(
                and!(
                    Play::F.partner_one.equals(one),
                    Play::F.partner_two.equals(two)
                ),
                and!(
                    Play::F.partner_one.equals(two),
                    Play::F.partner_two.equals(one)
                )
            )
        ))
        .set(Play::F.is_live, false)
        .exec()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::claim_pending;
    use crate::server::handler::ApiError;

    #[test]
    fn losing_a_respond_race_is_a_state_conflict() {
        assert!(matches!(
            claim_pending(0),
            Err(ApiError::RequestNotPending)
        ));
        assert!(claim_pending(1).is_ok());
    }
}
