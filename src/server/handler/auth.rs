//! This module holds all endpoints regarding authentication

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json};
use actix_web::{get, post, put, HttpResponse};
use chrono::{Duration, Utc};
use rand::Rng;
use rorm::{and, insert, query, update, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::mail::MailClient;
use crate::models::{OneTimeCode, OneTimeCodeInsert, User, UserInsert};
use crate::server::handler::{ApiError, ApiErrorResponse, ApiResult};
use crate::server::RuntimeSettings;

/// At most this many codes may be issued per address and window
const CODE_REQUEST_LIMIT: usize = 3;
/// The sliding window of the code request rate limit, in minutes
const CODE_REQUEST_WINDOW_MINUTES: i64 = 10;

/// The request to get a login code mailed
#[derive(Deserialize, ToSchema)]
pub struct RequestCodeRequest {
    #[schema(example = "alice@example.com")]
    email: String,
}

/// Request a login code for an email address.
///
/// The code is mailed to the address and has to be submitted to
/// `/verify-code` before it expires. Issuing is rate limited per address.
#[utoipa::path(
    tag = "Authentication",
    context_path = "/api/v1/auth",
    responses(
        (status = 200, description = "A login code was mailed"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse)
    ),
    request_body = RequestCodeRequest,
)]
#[post("/request-code")]
pub(crate) async fn request_code(
    req: Json<RequestCodeRequest>,
    db: Data<Database>,
    settings: Data<RuntimeSettings>,
    mail: Data<MailClient>,
) -> ApiResult<HttpResponse> {
    let email = normalize_email(&req.email)?;

    let now = Utc::now().naive_utc();

    let mut tx = db.start_transaction().await?;

    let issued = query!(&mut tx, OneTimeCode)
        .condition(OneTimeCode::F.email.equals(&email))
        .all()
        .await?;

    let window_start = now - Duration::minutes(CODE_REQUEST_WINDOW_MINUTES);
    let recent = issued
        .iter()
        .filter(|code| code.created_at >= window_start)
        .count();
    if recent >= CODE_REQUEST_LIMIT {
        return Err(ApiError::TooManyCodeRequests);
    }

    let code = format!("{:04}", rand::thread_rng().gen_range(0..10_000));

    insert!(&mut tx, OneTimeCodeInsert)
        .single(&OneTimeCodeInsert {
            uuid: Uuid::new_v4(),
            email: email.clone(),
            code: code.clone(),
            expires_at: now + Duration::minutes(settings.code_expiry_minutes),
            used: false,
        })
        .await?;

    tx.commit().await?;

    // Delivery happens after the commit, a failed mail must not roll back
    // the issued code
    mail.send_code(&email, &code).await;

    Ok(HttpResponse::Ok().finish())
}

/// The request to redeem a login code
#[derive(Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    #[schema(example = "alice@example.com")]
    email: String,
    #[schema(example = "1337")]
    code: String,
}

/// Redeem a login code.
///
/// On success you will retrieve a session cookie. The first successful
/// verification of an address creates the user account.
#[utoipa::path(
    tag = "Authentication",
    context_path = "/api/v1/auth",
    responses(
        (status = 200, description = "Login successful", body = UserResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse)
    ),
    request_body = VerifyCodeRequest,
)]
#[post("/verify-code")]
pub(crate) async fn verify_code(
    req: Json<VerifyCodeRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<UserResponse>> {
    let email = normalize_email(&req.email)?;

    let now = Utc::now().naive_utc();

    let mut tx = db.start_transaction().await?;

    let candidates = query!(&mut tx, OneTimeCode)
        .condition(and!(
            OneTimeCode::F.email.equals(&email),
            OneTimeCode::F.code.equals(&req.code)
        ))
        .all()
        .await?;

    let code = candidates
        .into_iter()
        .filter(|code| !code.used)
        .max_by_key(|code| code.created_at)
        .ok_or(ApiError::LoginFailed)?;

    if code.is_expired(now) {
        return Err(ApiError::LoginFailed);
    }

    update!(&mut tx, OneTimeCode)
        .condition(OneTimeCode::F.uuid.equals(code.uuid))
        .set(OneTimeCode::F.used, true)
        .exec()
        .await?;

    let user = match query!(&mut tx, User)
        .condition(User::F.email.equals(&email))
        .optional()
        .await?
    {
        Some(user) => user,
        None => {
            let uuid = Uuid::new_v4();
            insert!(&mut tx, UserInsert)
                .single(&UserInsert {
                    uuid,
                    email: email.clone(),
                    display_name: display_name_from_email(&email),
                    email_verified: true,
                })
                .await?;

            query!(&mut tx, User)
                .condition(User::F.uuid.equals(uuid))
                .one()
                .await?
        }
    };

    tx.commit().await?;

    session.insert("uuid", user.uuid)?;
    session.insert("logged_in", true)?;

    Ok(Json(UserResponse {
        uuid: user.uuid,
        email: user.email,
        display_name: user.display_name,
    }))
}

/// A single user
#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub(crate) uuid: Uuid,
    #[schema(example = "alice@example.com")]
    pub(crate) email: String,
    #[schema(example = "alice")]
    pub(crate) display_name: String,
}

/// Retrieve the currently logged-in user
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The current user", body = UserResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse)
    ),
    security(("session_cookie" = []))
)]
#[get("/users/me")]
pub(crate) async fn get_me(db: Data<Database>, session: Session) -> ApiResult<Json<UserResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let user = query!(db.as_ref(), User)
        .condition(User::F.uuid.equals(uuid))
        .optional()
        .await?
        .ok_or(ApiError::SessionCorrupt)?;

    Ok(Json(UserResponse {
        uuid: user.uuid,
        email: user.email,
        display_name: user.display_name,
    }))
}

/// The request to change the own profile
#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[schema(example = "alice")]
    display_name: String,
}

/// Update the display name of the currently logged-in user
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Profile was updated"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse)
    ),
    request_body = UpdateProfileRequest,
    security(("session_cookie" = []))
)]
#[put("/users/me")]
pub(crate) async fn update_me(
    req: Json<UpdateProfileRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let display_name = req.display_name.trim();
    if display_name.is_empty() || display_name.chars().count() > 100 {
        return Err(ApiError::InvalidDisplayName);
    }

    update!(db.as_ref(), User)
        .condition(User::F.uuid.equals(uuid))
        .set(User::F.display_name, display_name.to_string())
        .exec()
        .await?;

    Ok(HttpResponse::Ok().finish())
}

/// Log out of this session
#[utoipa::path(
    tag = "Authentication",
    context_path = "/api/v1/auth",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse)
    ),
)]
#[get("/logout")]
pub(crate) async fn logout(session: Session) -> ApiResult<HttpResponse> {
    session.purge();

    Ok(HttpResponse::Ok().finish())
}

/// Lowercase and sanity-check an address.
///
/// This is no full address validation, just enough to reject obvious junk
/// before a mail is sent to it.
fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();

    if email.is_empty() || email.len() > 255 {
        return Err(ApiError::InvalidEmail);
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ApiError::InvalidEmail);
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ApiError::InvalidEmail);
    }

    Ok(email)
}

/// The initial display name of a fresh account, the part before the `@`
fn display_name_from_email(email: &str) -> String {
    email
        .split_once('@')
        .map(|(local, _)| local.to_string())
        .unwrap_or_else(|| email.to_string())
}

#[cfg(test)]
mod tests {
    use super::{display_name_from_email, normalize_email};

    #[test]
    fn addresses_are_normalized() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
    }

    #[test]
    fn junk_addresses_are_rejected() {
        assert!(normalize_email("").is_err());
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("alice@").is_err());
        assert!(normalize_email("alice@localhost").is_err());
    }

    #[test]
    fn display_name_is_the_local_part() {
        assert_eq!(display_name_from_email("alice@example.com"), "alice");
    }
}
