//! Alert management endpoints.
//!
//! - `/alerts/politician/signup` - Politician alert signup form
//! - `/alerts/politician/subscribe/{signed_key}` - Confirm a politician signup
//! - `/alerts/` - List the caller's subscriptions
//! - `/alerts/create` - Subscribe to a saved search query
//! - `/alerts/{subscription_id}/modify` - Enable, disable or delete a subscription
//! - `/alerts/unsubscribe/{key}` - One-click unsubscribe from an email link

use crate::{
    AppResources,
    alerts::NotificationSender,
    entity::{politician, subscription, user},
    error::{AlertError, ErrorBody},
    query::{self, politician_query},
    session::{Identity, SESSION_COOKIE, SessionId, new_session_id},
    signing::{
        BadSignature, SUBSCRIBE_MAX_AGE, SUBSCRIBE_PURPOSE, Signer, UNSUBSCRIBE_PURPOSE,
        politician_subscribe_payload, split_politician_subscribe_payload,
    },
    store::StoreError,
};
use axum::{
    Extension, Form, Json,
    extract::{Path, Query},
    http::header,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const ALERTS_TAG: &str = "Alerts";

pub const ALERTS_LIST_PATH: &str = "/alerts/";
pub const ENABLE_ALERTS_COOKIE: &str = "enable-alerts";
const ENABLE_ALERTS_MAX_AGE: time::Duration = time::Duration::days(90);
const NEVER_CACHE: &str = "max-age=0, no-cache, no-store, must-revalidate, private";

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct SignupParams {
    /// Politician id; any non-digit characters are ignored.
    politician: Option<String>,
}

#[derive(Deserialize, ToSchema)]
struct SignupForm {
    politician: Option<String>,
    email: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct SignupResponse {
    title: String,
    politician: politician::Model,
    /// Prefilled or submitted address.
    email: Option<String>,
    /// `true` once a confirmation email went out or the subscription exists.
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct ActivateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    politician: Option<politician::Model>,
    activating: bool,
    /// Set when the link was tampered with, expired or malformed.
    key_error: bool,
}

#[derive(Serialize, ToSchema)]
struct AlertsListResponse {
    title: String,
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<user::Model>,
    subscriptions: Vec<subscription::Model>,
}

#[derive(Deserialize, ToSchema)]
struct CreateAlertForm {
    /// Saved search query, e.g. `carbon tax MP: "jane-doe"`.
    query: Option<String>,
}

#[derive(Deserialize, ToSchema)]
struct ModifyAlertForm {
    /// One of `enable`, `disable`, `delete`.
    action: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct UnsubscribeResponse {
    title: String,
    /// Topic label of the subscription that was switched off.
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    key_error: bool,
}

/// Creates the alerts router.
#[tracing::instrument(skip_all)]
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(politician_signup_form, politician_signup))
        .routes(routes!(politician_subscribe))
        .routes(routes!(alerts_list))
        .routes(routes!(create_alert))
        .routes(routes!(modify_alert))
        .routes(routes!(unsubscribe))
}

/// Strips every non-digit and parses what is left.
pub fn parse_politician_id(raw: Option<&str>) -> Result<i32, AlertError> {
    let digits: String = raw
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits
        .parse()
        .map_err(|_| AlertError::not_found("Politician not found"))
}

/// Site-relative confirmation link for a politician signup.
pub fn subscribe_path(
    signer: &Signer,
    politician_id: i32,
    email: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let key = politician_subscribe_payload(politician_id, email);
    let signed_key = signer.sign_timestamped(&key, SUBSCRIBE_PURPOSE)?;
    Ok(format!("/alerts/politician/subscribe/{signed_key}"))
}

/// Site-relative, non-expiring unsubscribe link for a subscription.
pub fn unsubscribe_path(
    signer: &Signer,
    subscription_id: i32,
) -> Result<String, jsonwebtoken::errors::Error> {
    let key = signer.sign(&subscription_id.to_string(), UNSUBSCRIBE_PURPOSE)?;
    Ok(format!("/alerts/unsubscribe/{key}"))
}

fn ensure_writable(resources: &AppResources) -> Result<(), AlertError> {
    if resources.config.readonly_db {
        return Err(AlertError::ReadOnly);
    }
    Ok(())
}

async fn load_politician(
    resources: &AppResources,
    politician_id: i32,
) -> Result<politician::Model, AlertError> {
    politician::Entity::find_by_id(politician_id)
        .one(resources.db.as_ref())
        .await?
        .ok_or_else(|| AlertError::not_found("Politician not found"))
}

fn signup_title(politician: &politician::Model) -> String {
    format!("Email alerts for {}", politician.name)
}

#[tracing::instrument(skip(resources, identity, params))]
#[utoipa::path(
    get,
    path = "/alerts/politician/signup",
    tag = ALERTS_TAG,
    operation_id = "Politician Signup Form",
    summary = "Initial state of the politician alert signup form",
    params(SignupParams),
    responses(
        (status = 200, description = "Signup form state", body = SignupResponse),
        (status = 404, description = "Unknown or malformed politician id", body = ErrorBody),
        (status = 503, description = "Database is read-only", body = ErrorBody)
    )
)]
async fn politician_signup_form(
    Extension(resources): Extension<AppResources>,
    identity: Identity,
    Query(params): Query<SignupParams>,
) -> Result<Json<SignupResponse>, AlertError> {
    ensure_writable(&resources)?;
    let politician_id = parse_politician_id(params.politician.as_deref())?;
    let politician = load_politician(&resources, politician_id).await?;
    Ok(Json(SignupResponse {
        title: signup_title(&politician),
        politician,
        email: identity.email,
        success: false,
        message: None,
        redirect: None,
    }))
}

#[tracing::instrument(skip(resources, identity, form))]
#[utoipa::path(
    post,
    path = "/alerts/politician/signup",
    tag = ALERTS_TAG,
    operation_id = "Politician Signup",
    summary = "Sign up for alerts about a politician",
    description = "Subscribes the caller to every debate statement by a politician.\n\n\
                   When the submitted address is the caller's verified email the subscription \
                   is created immediately. Otherwise a confirmation link, valid for 14 days, is \
                   mailed to the address and nothing is stored until it is followed.",
    request_body(content = SignupForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Subscribed, or confirmation email sent", body = SignupResponse),
        (status = 400, description = "Invalid email address", body = ErrorBody),
        (status = 404, description = "Unknown or malformed politician id", body = ErrorBody),
        (status = 503, description = "Database is read-only", body = ErrorBody)
    )
)]
async fn politician_signup(
    Extension(resources): Extension<AppResources>,
    identity: Identity,
    Form(form): Form<SignupForm>,
) -> Result<Json<SignupResponse>, AlertError> {
    ensure_writable(&resources)?;
    let politician_id = parse_politician_id(form.politician.as_deref())?;
    let politician = load_politician(&resources, politician_id).await?;

    let email = form.email.unwrap_or_default().trim().to_lowercase();
    if email.parse::<lettre::Address>().is_err() {
        return Err(AlertError::BadRequest("Enter a valid email address.".into()));
    }

    if identity.is(&email) {
        let store = resources.store();
        let (user, _) = store.get_or_create_user(&email).await?;
        let (subscription, _) = store
            .get_or_create_by_query(&politician_query(&politician.identifier), &user)
            .await?;
        store.set_active(subscription, true).await?;
        return Ok(Json(SignupResponse {
            title: signup_title(&politician),
            message: Some(format!("You're signed up for alerts for {}.", politician.name)),
            politician,
            email: Some(email),
            success: true,
            redirect: Some(ALERTS_LIST_PATH.to_string()),
        }));
    }

    let activate_url = resources
        .config
        .absolute_url(&subscribe_path(&resources.signer(), politician.id, &email)?);
    NotificationSender::from_resources(&resources)
        .send_confirmation(&email, &politician, activate_url)
        .await?;
    tracing::info!(politician_id = politician.id, "Sent alert confirmation email");

    Ok(Json(SignupResponse {
        title: signup_title(&politician),
        politician,
        email: Some(email),
        success: true,
        message: None,
        redirect: None,
    }))
}

#[tracing::instrument(skip(resources, signed_key), fields(key_len = signed_key.len()))]
#[utoipa::path(
    method(get, post),
    path = "/alerts/politician/subscribe/{signed_key}",
    tag = ALERTS_TAG,
    operation_id = "Confirm Politician Signup",
    summary = "Confirm a politician alert signup",
    description = "Follows the link from the confirmation email. Creates (or re-activates) the \
                   subscription for the signed address. An expired or tampered link yields \
                   `key_error: true` and changes nothing.",
    params(
        ("signed_key" = String, Path, description = "Signed politician id and email, valid for 14 days")
    ),
    responses(
        (status = 200, description = "Activation state", body = ActivateResponse),
        (status = 404, description = "Politician unknown or no longer a member", body = ErrorBody),
        (status = 503, description = "Database is read-only", body = ErrorBody)
    )
)]
async fn politician_subscribe(
    Extension(resources): Extension<AppResources>,
    Path(signed_key): Path<String>,
) -> Result<Json<ActivateResponse>, AlertError> {
    ensure_writable(&resources)?;
    let key = match resources.signer().unsign_timestamped(
        &signed_key,
        SUBSCRIBE_PURPOSE,
        SUBSCRIBE_MAX_AGE,
    ) {
        Ok(key) => key,
        Err(BadSignature) => {
            tracing::warn!(
                name = "api.politician_subscribe.invalid_or_expired_key",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                message = "Invalid or expired confirmation link"
            );
            return Ok(Json(ActivateResponse {
                title: None,
                politician: None,
                activating: true,
                key_error: true,
            }));
        }
    };

    let (politician_id, email) = split_politician_subscribe_payload(&key);
    let politician_id: i32 = politician_id
        .parse()
        .map_err(|_| AlertError::not_found("Politician not found"))?;
    let politician = load_politician(&resources, politician_id).await?;
    if !politician.current_member {
        return Err(AlertError::not_found("Politician is no longer a member"));
    }

    let store = resources.store();
    let (user, _) = store.get_or_create_user(email).await?;
    let (subscription, created) = store
        .get_or_create_by_query(&politician_query(&politician.identifier), &user)
        .await?;
    let subscription = store.set_active(subscription, true).await?;
    tracing::info!(
        subscription_id = subscription.id,
        created = created,
        "Confirmed politician alert"
    );

    Ok(Json(ActivateResponse {
        title: Some(signup_title(&politician)),
        politician: Some(politician),
        activating: true,
        key_error: false,
    }))
}

#[tracing::instrument(skip(resources, identity, session))]
#[utoipa::path(
    get,
    path = "/alerts/",
    tag = ALERTS_TAG,
    operation_id = "List Alerts",
    summary = "List the caller's alert subscriptions",
    description = "Returns the subscriptions of the authenticated caller. A query saved while \
                   signed out is turned into a subscription here, once.\n\n\
                   Sets the `enable-alerts=y` cookie (90 days) for authenticated callers.",
    responses(
        (status = 200, description = "Subscriptions, or `authenticated: false`", body = AlertsListResponse)
    )
)]
async fn alerts_list(
    Extension(resources): Extension<AppResources>,
    identity: Identity,
    session: SessionId,
) -> Result<Response, AlertError> {
    let Some(email) = identity.email else {
        let body = AlertsListResponse {
            title: "Email alerts".into(),
            authenticated: false,
            user: None,
            subscriptions: Vec::new(),
        };
        return Ok(([(header::CACHE_CONTROL, NEVER_CACHE)], Json(body)).into_response());
    };

    let store = resources.store();
    let (user, _) = store.get_or_create_user(&email).await?;

    if let Some(query) = session
        .0
        .as_deref()
        .and_then(|id| resources.pending_alerts.take(id))
    {
        match store.get_or_create_by_query(&query, &user).await {
            Ok(_) => {}
            Err(StoreError::InvalidQuery(e)) => {
                tracing::warn!(
                    name = "api.alerts_list.pending_query_invalid",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = %e,
                    message = "Dropping invalid pending alert"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    let subscriptions = store.list_for_user(user.id).await?;
    let body = AlertsListResponse {
        title: "Your email alerts".into(),
        authenticated: true,
        user: Some(user),
        subscriptions,
    };
    let enable_alerts = Cookie::build((ENABLE_ALERTS_COOKIE, "y"))
        .max_age(ENABLE_ALERTS_MAX_AGE)
        .path("/");
    Ok((
        CookieJar::new().add(enable_alerts),
        [(header::CACHE_CONTROL, NEVER_CACHE)],
        Json(body),
    )
        .into_response())
}

#[tracing::instrument(skip(resources, identity, session, form))]
#[utoipa::path(
    post,
    path = "/alerts/create",
    tag = ALERTS_TAG,
    operation_id = "Create Alert",
    summary = "Subscribe to a saved search query",
    description = "Authenticated callers get the subscription immediately (`true`). Anonymous \
                   callers have the query kept for their session and are redirected to the \
                   list view, where it is created after they sign in.",
    request_body(content = CreateAlertForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "`true`, or `{\"redirect\": \"/alerts/\"}` for anonymous callers"),
        (status = 404, description = "No query given", body = ErrorBody),
        (status = 501, description = "Query cannot be handled", body = ErrorBody)
    )
)]
async fn create_alert(
    Extension(resources): Extension<AppResources>,
    identity: Identity,
    session: SessionId,
    Form(form): Form<CreateAlertForm>,
) -> Result<Response, AlertError> {
    let query = form
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AlertError::not_found("No query given"))?;

    let Some(email) = identity.email else {
        // Only well-formed queries are held for anonymous sessions.
        let query = query::normalize(&query).map_err(StoreError::from)?;
        let redirect = Json(json!({ "redirect": ALERTS_LIST_PATH }));
        return Ok(match session.0 {
            Some(session_id) => {
                resources.pending_alerts.stash(&session_id, query);
                redirect.into_response()
            }
            None => {
                let session_id = new_session_id();
                resources.pending_alerts.stash(&session_id, query);
                let cookie = Cookie::build((SESSION_COOKIE, session_id))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax);
                (CookieJar::new().add(cookie), redirect).into_response()
            }
        });
    };

    let store = resources.store();
    let (user, _) = store.get_or_create_user(&email).await?;
    store.get_or_create_by_query(&query, &user).await?;
    Ok(Json(json!(true)).into_response())
}

#[tracing::instrument(skip(resources, identity, form))]
#[utoipa::path(
    post,
    path = "/alerts/{subscription_id}/modify",
    tag = ALERTS_TAG,
    operation_id = "Modify Alert",
    summary = "Enable, disable or delete a subscription",
    description = "Only the owner of the subscription may modify it. Unknown actions are ignored.",
    params(
        ("subscription_id" = i32, Path, description = "Subscription id", example = 42)
    ),
    request_body(content = ModifyAlertForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "`true`"),
        (status = 403, description = "Caller does not own the subscription", body = ErrorBody),
        (status = 404, description = "Subscription not found", body = ErrorBody)
    )
)]
async fn modify_alert(
    Extension(resources): Extension<AppResources>,
    identity: Identity,
    Path(subscription_id): Path<i32>,
    Form(form): Form<ModifyAlertForm>,
) -> Result<Json<serde_json::Value>, AlertError> {
    let store = resources.store();
    let (subscription, owner) = store
        .find_subscription_with_owner(subscription_id)
        .await?
        .ok_or_else(|| AlertError::not_found("Subscription not found"))?;
    if !identity.is(&owner.email) {
        return Err(AlertError::PermissionDenied(
            "You do not own this subscription".into(),
        ));
    }

    match form.action.as_deref() {
        Some("enable") => {
            store.set_active(subscription, true).await?;
        }
        Some("disable") => {
            store.set_active(subscription, false).await?;
        }
        Some("delete") => {
            store.delete_subscription(subscription).await?;
        }
        other => tracing::debug!(action = ?other, "Ignoring unknown alert action"),
    }
    Ok(Json(json!(true)))
}

#[tracing::instrument(skip(resources, key), fields(key_len = key.len()))]
#[utoipa::path(
    get,
    path = "/alerts/unsubscribe/{key}",
    tag = ALERTS_TAG,
    operation_id = "Unsubscribe",
    summary = "Switch off a subscription from an email link",
    description = "Possession of the signed link is the authorization; the link never expires. \
                   In read-only mode the request is also forwarded to the operators.",
    params(
        ("key" = String, Path, description = "Signed subscription id")
    ),
    responses(
        (status = 200, description = "Unsubscribe state", body = UnsubscribeResponse),
        (status = 404, description = "Subscription not found", body = ErrorBody)
    )
)]
async fn unsubscribe(
    Extension(resources): Extension<AppResources>,
    Path(key): Path<String>,
) -> Result<Response, AlertError> {
    let title = "Email alerts".to_string();
    let body = match resources.signer().unsign(&key, UNSUBSCRIBE_PURPOSE) {
        Ok(subscription_id) => {
            let id: i32 = subscription_id
                .parse()
                .map_err(|_| AlertError::not_found("Subscription not found"))?;
            let store = resources.store();
            let subscription = store
                .find_subscription(id)
                .await?
                .ok_or_else(|| AlertError::not_found("Subscription not found"))?;
            let topic = subscription.topic.clone();

            match store.set_active(subscription, false).await {
                Ok(_) => {}
                Err(e) if resources.config.readonly_db => {
                    tracing::warn!(
                        name = "api.unsubscribe.readonly_update_failed",
                        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                        error = %e,
                        subscription_id = id,
                        message = "Could not deactivate subscription on read-only database"
                    );
                }
                Err(e) => return Err(e.into()),
            }
            if resources.config.readonly_db {
                NotificationSender::from_resources(&resources)
                    .mail_admins("Unsubscribe request", &subscription_id)
                    .await;
            }
            UnsubscribeResponse {
                title,
                query: Some(topic),
                key_error: false,
            }
        }
        Err(BadSignature) => {
            tracing::warn!(
                name = "api.unsubscribe.invalid_key",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                message = "Invalid unsubscribe link"
            );
            UnsubscribeResponse {
                title,
                query: None,
                key_error: true,
            }
        }
    };
    Ok(([(header::CACHE_CONTROL, NEVER_CACHE)], Json(body)).into_response())
}
