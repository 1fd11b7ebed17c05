//! This module holds the definition of the swagger declaration

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::models::GameType;
use crate::rules::{BullsAndCowsPhase, BullsAndCowsState, Guess, PlayData};
use crate::server::handler;

struct CookieSecurity;

impl Modify for CookieSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("id"))),
            )
        }
    }
}

/// Helper struct for the openapi definitions.
#[derive(OpenApi)]
#[openapi(
    paths(
        handler::request_code,
        handler::verify_code,
        handler::logout,
        handler::get_me,
        handler::update_me,
        handler::create_partner_request,
        handler::get_partner_requests,
        handler::accept_partner_request,
        handler::reject_partner_request,
        handler::cancel_partner_request,
        handler::get_current_partner,
        handler::disconnect_partner,
        handler::get_games,
        handler::play_or_request,
        handler::create_game_request,
        handler::get_game_requests,
        handler::respond_game_request,
        handler::get_live_play,
        handler::get_play,
        handler::set_secret,
        handler::make_guess,
        handler::health_check,
    ),
    components(schemas(
        handler::ApiErrorResponse,
        handler::ApiStatusCode,
        handler::RequestCodeRequest,
        handler::VerifyCodeRequest,
        handler::UserResponse,
        handler::UpdateProfileRequest,
        handler::CreatePartnerRequest,
        handler::UuidResponse,
        handler::SentPartnerRequest,
        handler::ReceivedPartnerRequest,
        handler::GetPartnerRequestsResponse,
        handler::PartnershipResponse,
        handler::GameResponse,
        handler::GetGamesResponse,
        handler::PlayOrRequestResponse,
        handler::CreateGameRequest,
        handler::GameRequestResponse,
        handler::GetGameRequestsResponse,
        handler::RespondGameRequest,
        handler::RespondGameRequestResponse,
        handler::PlayResponse,
        handler::SetSecretRequest,
        handler::MakeGuessRequest,
        handler::GuessResponse,
        handler::HealthResponse,
        GameType,
        PlayData,
        BullsAndCowsState,
        BullsAndCowsPhase,
        Guess,
    )),
    modifiers(&CookieSecurity)
)]
pub struct ApiDoc;
