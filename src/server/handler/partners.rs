//! This module holds all endpoints regarding partner requests and the
//! partnership itself

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path};
use actix_web::{delete, get, post, HttpResponse};
use chrono::{DateTime, Utc};
use rorm::fields::types::ForeignModelByField;
use rorm::{and, insert, or, query, update, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    ordered_pair, PartnerRequest, PartnerRequestInsert, PartnerRequestStatus, Partnership,
    PartnershipInsert, User,
};
use crate::server::handler::games::end_live_plays;
use crate::server::handler::{ApiError, ApiErrorResponse, ApiResult, PathUuid, UserResponse};

/// The request to invite another person to become partners
#[derive(Deserialize, ToSchema)]
pub struct CreatePartnerRequest {
    /// The address of the person to invite, they don't have to be
    /// registered yet
    #[schema(example = "bob@example.com")]
    email: String,
}

/// The uuid of a freshly created resource
#[derive(Serialize, ToSchema)]
pub struct UuidResponse {
    pub(crate) uuid: Uuid,
}

/// Send a partner request to an email address.
///
/// The addressed person doesn't have to be registered yet, the request is
/// matched by address until they are.
#[utoipa::path(
    tag = "Partners",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Partner request has been created", body = UuidResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CreatePartnerRequest,
    security(("session_cookie" = []))
)]
#[post("/partners/requests")]
pub(crate) async fn create_partner_request(
    req: Json<CreatePartnerRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<UuidResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let email = req.email.trim().to_lowercase();
    if email.is_empty() || email.len() > 255 || !email.contains('@') {
        return Err(ApiError::InvalidEmail);
    }

    let mut tx = db.start_transaction().await?;

    let me = query!(&mut tx, User)
        .condition(User::F.uuid.equals(uuid))
        .optional()
        .await?
        .ok_or(ApiError::SessionCorrupt)?;

    if me.email == email {
        return Err(ApiError::SelfRequest);
    }

    // The sender must be free
    if query!(&mut tx, Partnership)
        .condition(or!(
            Partnership::F.user_one.equals(uuid),
            Partnership::F.user_two.equals(uuid)
        ))
        .optional()
        .await?
        .is_some()
    {
        return Err(ApiError::AlreadyPartnered);
    }

    // So must the addressed person, if they are registered
    let recipient = query!(&mut tx, User)
        .condition(User::F.email.equals(&email))
        .optional()
        .await?;
    if let Some(recipient) = &recipient {
        if query!(&mut tx, Partnership)
            .condition(or!(
                Partnership::F.user_one.equals(recipient.uuid),
                Partnership::F.user_two.equals(recipient.uuid)
            ))
            .optional()
            .await?
            .is_some()
        {
            return Err(ApiError::AlreadyPartnered);
        }
    }

    // At most one pending request per (sender, address)
    if query!(&mut tx, PartnerRequest)
        .condition(and!(
            PartnerRequest::F.sender.equals(uuid),
            PartnerRequest::F.recipient_email.equals(&email),
            PartnerRequest::F.status.equals(PartnerRequestStatus::Pending)
        ))
        .optional()
        .await?
        .is_some()
    {
        return Err(ApiError::RequestAlreadyPending);
    }

    let request_uuid = insert!(&mut tx, PartnerRequestInsert)
        .return_primary_key()
        .single(&PartnerRequestInsert {
            uuid: Uuid::new_v4(),
            sender: ForeignModelByField::Key(uuid),
            recipient_email: email,
            recipient: recipient.map(|user| ForeignModelByField::Key(user.uuid)),
            status: PartnerRequestStatus::Pending,
        })
        .await?;

    tx.commit().await?;

    Ok(Json(UuidResponse { uuid: request_uuid }))
}

/// A partner request the executing user has sent
#[derive(Serialize, ToSchema)]
pub struct SentPartnerRequest {
    uuid: Uuid,
    #[schema(example = "bob@example.com")]
    recipient_email: String,
    created_at: DateTime<Utc>,
}

/// A partner request the executing user has received
#[derive(Serialize, ToSchema)]
pub struct ReceivedPartnerRequest {
    uuid: Uuid,
    sender: UserResponse,
    created_at: DateTime<Utc>,
}

/// The pending partner requests of the executing user
#[derive(Serialize, ToSchema)]
pub struct GetPartnerRequestsResponse {
    sent: Vec<SentPartnerRequest>,
    received: Vec<ReceivedPartnerRequest>,
}

/// Retrieve the pending partner requests of the executing user.
///
/// Received requests are matched by user as well as by address, so requests
/// that were sent before the user registered show up too.
#[utoipa::path(
    tag = "Partners",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The pending partner requests", body = GetPartnerRequestsResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[get("/partners/requests")]
pub(crate) async fn get_partner_requests(
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<GetPartnerRequestsResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let mut tx = db.start_transaction().await?;

    let me = query!(&mut tx, User)
        .condition(User::F.uuid.equals(uuid))
        .optional()
        .await?
        .ok_or(ApiError::SessionCorrupt)?;

    let mut sent = query!(&mut tx, PartnerRequest)
        .condition(and!(
            PartnerRequest::F.sender.equals(uuid),
            PartnerRequest::F.status.equals(PartnerRequestStatus::Pending)
        ))
        .all()
        .await?;

    let mut received = query!(
        &mut tx,
        (
            PartnerRequest::F.uuid,
            PartnerRequest::F.sender.uuid,
            PartnerRequest::F.sender.email,
            PartnerRequest::F.sender.display_name,
            PartnerRequest::F.created_at
        )
    )
    .condition(and!(
        PartnerRequest::F.status.equals(PartnerRequestStatus::Pending),
        or!(
            PartnerRequest::F.recipient.equals(uuid),
            PartnerRequest::F.recipient_email.equals(&me.email)
        )
    ))
    .all()
    .await?;

    tx.commit().await?;

    sent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    received.sort_by(|a, b| b.4.cmp(&a.4));

    Ok(Json(GetPartnerRequestsResponse {
        sent: sent
            .into_iter()
            .map(|request| SentPartnerRequest {
                uuid: request.uuid,
                recipient_email: request.recipient_email,
                created_at: DateTime::from_naive_utc_and_offset(request.created_at, Utc),
            })
            .collect(),
        received: received
            .into_iter()
            .map(
                |(uuid, sender_uuid, sender_email, sender_display_name, created_at)| {
                    ReceivedPartnerRequest {
                        uuid,
                        sender: UserResponse {
                            uuid: sender_uuid,
                            email: sender_email,
                            display_name: sender_display_name,
                        },
                        created_at: DateTime::from_naive_utc_and_offset(created_at, Utc),
                    }
                },
            )
            .collect(),
    }))
}

/// Accept a partner request.
///
/// Forms the exclusive partnership. Every other pending request involving
/// either of the two users is cancelled in the same transaction.
#[utoipa::path(
    tag = "Partners",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Partnership was formed"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[post("/partners/requests/{uuid}/accept")]
pub(crate) async fn accept_partner_request(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let mut tx = db.start_transaction().await?;

    let me = query!(&mut tx, User)
        .condition(User::F.uuid.equals(uuid))
        .optional()
        .await?
        .ok_or(ApiError::SessionCorrupt)?;

    let request = query!(&mut tx, PartnerRequest)
        .condition(PartnerRequest::F.uuid.equals(path.uuid))
        .optional()
        .await?
        .ok_or(ApiError::NotFound)?;

    let is_recipient = request
        .recipient
        .as_ref()
        .map(|recipient| *recipient.key() == uuid)
        .unwrap_or(false)
        || request.recipient_email == me.email;
    if !is_recipient {
        return Err(ApiError::MissingPrivileges);
    }

    if request.status != PartnerRequestStatus::Pending {
        return Err(ApiError::RequestNotPending);
    }

    let sender_uuid = *request.sender.key();
    if sender_uuid == uuid {
        return Err(ApiError::SelfRequest);
    }

    // Both users must still be free
    for user in [sender_uuid, uuid] {
        if query!(&mut tx, Partnership)
            .condition(or!(
                Partnership::F.user_one.equals(user),
                Partnership::F.user_two.equals(user)
            ))
            .optional()
            .await?
            .is_some()
        {
            return Err(ApiError::AlreadyPartnered);
        }
    }

    let (user_one, user_two) = ordered_pair(sender_uuid, uuid);

    // The unique columns reject a second partnership per user, so a failing
    // insert here usually means a concurrent accept won the race. Only a
    // re-check may say so though, any other failure stays a database error.
    let inserted = insert!(&mut tx, PartnershipInsert)
        .single(&PartnershipInsert {
            uuid: Uuid::new_v4(),
            user_one: ForeignModelByField::Key(user_one),
            user_two: ForeignModelByField::Key(user_two),
        })
        .await;

    if let Err(err) = inserted {
        // The transaction is aborted after the failed statement
        drop(tx);

        for user in [sender_uuid, uuid] {
            if query!(db.as_ref(), Partnership)
                .condition(or!(
                    Partnership::F.user_one.equals(user),
                    Partnership::F.user_two.equals(user)
                ))
                .optional()
                .await?
                .is_some()
            {
                return Err(ApiError::AlreadyPartnered);
            }
        }

        return Err(ApiError::DatabaseError(err));
    }

    update!(&mut tx, PartnerRequest)
        .condition(PartnerRequest::F.uuid.equals(request.uuid))
        .set(
            PartnerRequest::F.status,
            PartnerRequestStatus::Accepted,
        )
        .set(
            PartnerRequest::F.recipient,
            Some(ForeignModelByField::Key(uuid)),
        )
        .exec()
        .await?;

    let sender = query!(&mut tx, User)
        .condition(User::F.uuid.equals(sender_uuid))
        .one()
        .await?;

    // Both users are taken now, their other pending requests are dead.
    // The accepted request itself is safe, it is not pending anymore.
    update!(&mut tx, PartnerRequest)
        .condition(and!(
            PartnerRequest::F.status.equals(PartnerRequestStatus::Pending),
            or!(
                PartnerRequest::F.sender.equals(sender_uuid),
                PartnerRequest::F.recipient.equals(sender_uuid),
                PartnerRequest::F.recipient_email.equals(&sender.email),
                PartnerRequest::F.sender.equals(uuid),
                PartnerRequest::F.recipient.equals(uuid),
                PartnerRequest::F.recipient_email.equals(&me.email)
            )
        ))
        .set(
            PartnerRequest::F.status,
            PartnerRequestStatus::Cancelled,
        )
        .exec()
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// Reject a partner request the executing user has received
#[utoipa::path(
    tag = "Partners",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Request was rejected"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[post("/partners/requests/{uuid}/reject")]
pub(crate) async fn reject_partner_request(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let mut tx = db.start_transaction().await?;

    let me = query!(&mut tx, User)
        .condition(User::F.uuid.equals(uuid))
        .optional()
        .await?
        .ok_or(ApiError::SessionCorrupt)?;

    let request = query!(&mut tx, PartnerRequest)
        .condition(PartnerRequest::F.uuid.equals(path.uuid))
        .optional()
        .await?
        .ok_or(ApiError::NotFound)?;

    let is_recipient = request
        .recipient
        .as_ref()
        .map(|recipient| *recipient.key() == uuid)
        .unwrap_or(false)
        || request.recipient_email == me.email;
    if !is_recipient {
        return Err(ApiError::MissingPrivileges);
    }

    if request.status != PartnerRequestStatus::Pending {
        return Err(ApiError::RequestNotPending);
    }

    update!(&mut tx, PartnerRequest)
        .condition(PartnerRequest::F.uuid.equals(request.uuid))
        .set(
            PartnerRequest::F.status,
            PartnerRequestStatus::Rejected,
        )
        .exec()
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// Retract a partner request the executing user has sent
#[utoipa::path(
    tag = "Partners",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Request was retracted"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[delete("/partners/requests/{uuid}")]
pub(crate) async fn cancel_partner_request(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let mut tx = db.start_transaction().await?;

    let request = query!(&mut tx, PartnerRequest)
        .condition(PartnerRequest::F.uuid.equals(path.uuid))
        .optional()
        .await?
        .ok_or(ApiError::NotFound)?;

    if *request.sender.key() != uuid {
        return Err(ApiError::MissingPrivileges);
    }

    if request.status != PartnerRequestStatus::Pending {
        return Err(ApiError::RequestNotPending);
    }

    update!(&mut tx, PartnerRequest)
        .condition(PartnerRequest::F.uuid.equals(request.uuid))
        .set(
            PartnerRequest::F.status,
            PartnerRequestStatus::Cancelled,
        )
        .exec()
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// The executing user's partnership
#[derive(Serialize, ToSchema)]
pub struct PartnershipResponse {
    uuid: Uuid,
    partner: UserResponse,
    created_at: DateTime<Utc>,
}

/// Retrieve the executing user's current partnership
#[utoipa::path(
    tag = "Partners",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The current partnership", body = PartnershipResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[get("/partners/current")]
pub(crate) async fn get_current_partner(
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<PartnershipResponse>> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let mut tx = db.start_transaction().await?;

    let partnership = query!(&mut tx, Partnership)
        .condition(or!(
            Partnership::F.user_one.equals(uuid),
            Partnership::F.user_two.equals(uuid)
        ))
        .optional()
        .await?
        .ok_or(ApiError::NoPartner)?;

    let partner_uuid = if *partnership.user_one.key() == uuid {
        *partnership.user_two.key()
    } else {
        *partnership.user_one.key()
    };

    let partner = query!(&mut tx, User)
        .condition(User::F.uuid.equals(partner_uuid))
        .one()
        .await?;

    tx.commit().await?;

    Ok(Json(PartnershipResponse {
        uuid: partnership.uuid,
        partner: UserResponse {
            uuid: partner.uuid,
            email: partner.email,
            display_name: partner.display_name,
        },
        created_at: DateTime::from_naive_utc_and_offset(partnership.created_at, Utc),
    }))
}

/// Dissolve the executing user's partnership.
///
/// Live plays of the pair are ended as well.
#[utoipa::path(
    tag = "Partners",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Partnership was dissolved"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[delete("/partners/current")]
pub(crate) async fn disconnect_partner(
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    let mut tx = db.start_transaction().await?;

    let partnership = query!(&mut tx, Partnership)
        .condition(or!(
            Partnership::F.user_one.equals(uuid),
            Partnership::F.user_two.equals(uuid)
        ))
        .optional()
        .await?
        .ok_or(ApiError::NoPartner)?;

    let user_one = *partnership.user_one.key();
    let user_two = *partnership.user_two.key();

    end_live_plays(&mut tx, user_one, user_two).await?;

    rorm::delete!(&mut tx, Partnership).single(&partnership).await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::ResponseError;

    use crate::server::handler::ApiError;

    #[test]
    fn a_lost_accept_race_is_a_client_side_conflict() {
        assert_eq!(
            ApiError::AlreadyPartnered.error_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
