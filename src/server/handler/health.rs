use actix_web::get;
use actix_web::web::{Data, Json};
use rorm::{query, Database, Model};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::User;
use crate::server::handler::{ApiErrorResponse, ApiResult};

/// The health data of this server
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = 1337)]
    registered_users: u64,
}

/// Request health data from this server.
///
/// Also serves as a liveness probe, it touches the database.
#[utoipa::path(
    tag = "Server status",
    responses(
        (status = 200, description = "Health data of this server", body = HealthResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
)]
#[get("/api/v1/health-check")]
pub(crate) async fn health_check(db: Data<Database>) -> ApiResult<Json<HealthResponse>> {
    let users = query!(db.as_ref(), (User::F.uuid.count(),)).one().await?.0 as u64;

    Ok(Json(HealthResponse {
        registered_users: users,
    }))
}
