//! This module holds the server definition

use std::net::SocketAddr;

use actix_toolbox::tb_middleware::{
    setup_logging_mw, DBSessionStore, LoggingMiddlewareConfig, PersistentSession,
    SessionMiddleware,
};
use actix_web::cookie::time::Duration;
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::middleware::{Compress, ErrorHandlers};
use actix_web::web::{scope, Data, JsonConfig, PayloadConfig};
use actix_web::{App, HttpServer};
use log::info;
use rorm::Database;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::mail::MailClient;
use crate::server::error::StartServerError;
use crate::server::handler::{
    accept_partner_request, cancel_partner_request, create_game_request, create_partner_request,
    disconnect_partner, get_current_partner, get_game_requests, get_games, get_live_play, get_me,
    get_partner_requests, get_play, health_check, logout, make_guess, play_or_request,
    reject_partner_request, request_code, respond_game_request, set_secret, update_me, verify_code,
};
use crate::server::middleware::{handle_not_found, json_extractor_error, AuthenticationRequired};
use crate::server::swagger::ApiDoc;

pub mod error;
pub mod handler;
pub mod middleware;
pub mod swagger;

/// Settings the handlers need at runtime, extracted from the config
#[derive(Copy, Clone)]
pub struct RuntimeSettings {
    /// How long an issued login code stays redeemable, in minutes
    pub code_expiry_minutes: i64,
}

/// Start the pairplay server
///
/// **Parameter**:
/// - `config`: Reference to a [Config] struct
/// - `db`: [Database]
pub async fn start_server(config: &Config, db: Database) -> Result<(), StartServerError> {
    let s_addr = SocketAddr::new(config.server.listen_address, config.server.listen_port);

    info!("Starting to listen on {}", s_addr);

    let key = Key::try_from(config.server.secret_key.as_bytes())
        .map_err(|_| StartServerError::InvalidSecretKey)?;

    let mail = MailClient::from_config(config);
    let settings = RuntimeSettings {
        code_expiry_minutes: config.auth.code_expiry_minutes,
    };

    HttpServer::new(move || {
        App::new()
            .app_data(PayloadConfig::default())
            .app_data(JsonConfig::default().error_handler(json_extractor_error))
            .app_data(Data::new(db.clone()))
            .app_data(Data::new(mail.clone()))
            .app_data(Data::new(settings))
            .wrap(setup_logging_mw(LoggingMiddlewareConfig::default()))
            .wrap(
                SessionMiddleware::builder(DBSessionStore::new(db.clone()), key.clone())
                    .session_lifecycle(
                        PersistentSession::default().session_ttl(Duration::days(30)),
                    )
                    .build(),
            )
            .wrap(Compress::default())
            .wrap(ErrorHandlers::new().handler(StatusCode::NOT_FOUND, handle_not_found))
            .service(SwaggerUi::new("/docs/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()))
            // The public routes carry their full path, a scope would shadow
            // the protected one below
            .service(health_check)
            .service(get_games)
            .service(
                scope("/api/v1/auth")
                    .service(request_code)
                    .service(verify_code)
                    .service(logout),
            )
            .service(
                scope("/api/v1")
                    .wrap(AuthenticationRequired)
                    .service(get_me)
                    .service(update_me)
                    .service(create_partner_request)
                    .service(get_partner_requests)
                    .service(accept_partner_request)
                    .service(reject_partner_request)
                    .service(cancel_partner_request)
                    .service(get_current_partner)
                    .service(disconnect_partner)
                    .service(play_or_request)
                    .service(create_game_request)
                    .service(get_game_requests)
                    .service(respond_game_request)
                    .service(get_live_play)
                    .service(get_play)
                    .service(set_secret)
                    .service(make_guess),
            )
    })
    .bind(s_addr)?
    .run()
    .await?;

    Ok(())
}
