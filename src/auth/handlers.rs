use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AckResponse, ConfirmResetRequest, LoginRequest, LoginResponse, ProfileResponse,
            PublicUser, RegisterRequest, RegisteredUser, RequestResetRequest,
            UpdateProfileRequest,
        },
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        repo::{unique_violation_constraint, User},
        reset::ResetCodeStore,
    },
    error::{ApiError, ApiResult},
    mailer::Mailer,
    state::AppState,
};

// One message for both unknown-username and wrong-password so login failures
// carry no enumeration signal.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/request-reset", post(request_reset))
        .route("/auth/reset-password", post(reset_password))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile).put(update_profile))
}

/// Usernames are ASCII letters only, at least two of them.
pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[a-zA-Z]{2,}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn require(field: &str, name: &'static str) -> ApiResult<()> {
    if field.trim().is_empty() {
        return Err(ApiError::validation(format!("{name} is required")));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<RegisteredUser>> {
    require(&payload.username, "username")?;
    require(&payload.password, "password")?;
    require(&payload.email, "email")?;
    require(&payload.full_name, "full_name")?;
    require(&payload.phone, "phone")?;

    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err(ApiError::validation(
            "Username must be at least 2 letters (a-z, A-Z only)",
        ));
    }

    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already taken");
        return Err(ApiError::conflict("Username already taken"));
    }

    let hash = hash_password(&state.config.hashing, &payload.password)?;

    // The pre-check above has a race window; the unique index closes it.
    let user = match User::create(
        &state.db,
        &payload.username,
        &payload.email,
        &hash,
        &payload.full_name,
        &payload.phone,
    )
    .await
    {
        Ok(u) => u,
        Err(e) => {
            if let Some(constraint) = unique_violation_constraint(&e) {
                let field = duplicate_field(constraint);
                warn!(username = %payload.username, constraint = %constraint, "concurrent duplicate registration");
                return Err(ApiError::conflict(format!("{field} already taken")));
            }
            error!(error = %e, "create user failed");
            return Err(ApiError::Internal(e));
        }
    };

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(Json(RegisteredUser {
        id: user.id,
        username: user.username,
        email: user.email,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = match User::find_by_username(&state.db, &payload.username).await? {
        Some(u) => u,
        None => {
            warn!(username = %payload.username, "login unknown username");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.username)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: PublicUser {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        },
    }))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<ProfileResponse>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(profile_of(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    require(&payload.email, "email")?;
    require(&payload.full_name, "full_name")?;
    require(&payload.phone, "phone")?;

    // Unconditional overwrite; email uniqueness is not re-checked here,
    // unlike the register path.
    let user = User::update_profile(
        &state.db,
        user_id,
        &payload.email,
        &payload.full_name,
        &payload.phone,
    )
    .await?
    .ok_or(ApiError::NotFound("User"))?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(profile_of(user)))
}

#[instrument(skip(state, payload))]
pub async fn request_reset(
    State(state): State<AppState>,
    Json(payload): Json<RequestResetRequest>,
) -> ApiResult<Json<AckResponse>> {
    require(&payload.email, "email")?;

    if User::find_by_email(&state.db, &payload.email)
        .await?
        .is_none()
    {
        warn!(email = %payload.email, "reset requested for unknown email");
        return Err(ApiError::NotFound("User"));
    }

    issue_and_dispatch(
        state.reset_codes.as_ref(),
        state.mailer.as_ref(),
        &payload.email,
    )
    .await?;

    info!(email = %payload.email, "reset code issued");
    Ok(Json(AckResponse {
        message: "Reset code sent",
    }))
}

/// Issue a fresh code and hand it to the mail collaborator. Delivery failure
/// propagates; the pending code stays registered either way.
async fn issue_and_dispatch(
    codes: &dyn ResetCodeStore,
    mailer: &dyn Mailer,
    email: &str,
) -> anyhow::Result<()> {
    let code = codes.issue(email).await;
    mailer.send_reset_code(email, &code).await
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmResetRequest>,
) -> ApiResult<Json<AckResponse>> {
    require(&payload.email, "email")?;
    require(&payload.code, "code")?;
    require(&payload.new_password, "new_password")?;

    if !state.reset_codes.verify(&payload.email, &payload.code).await {
        warn!(email = %payload.email, "reset code rejected");
        return Err(ApiError::InvalidOrExpiredCode);
    }

    let hash = hash_password(&state.config.hashing, &payload.new_password)?;
    User::update_password_by_email(&state.db, &payload.email, &hash).await?;

    info!(email = %payload.email, "password reset");
    Ok(Json(AckResponse {
        message: "Password updated",
    }))
}

/// Both username and email carry unique indexes; name the one that actually
/// collided rather than blaming the username for an email clash.
fn duplicate_field(constraint: &str) -> &'static str {
    if constraint.contains("email") {
        "Email"
    } else {
        "Username"
    }
}

fn profile_of(user: User) -> ProfileResponse {
    ProfileResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        full_name: user.full_name,
        phone: user.phone,
        role: user.role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::reset::InMemoryResetCodes;
    use crate::mailer::RecordingMailer;
    use time::Duration;

    #[test]
    fn username_rule_accepts_letters_only() {
        assert!(is_valid_username("Yasmen"));
        assert!(is_valid_username("ab"));
        assert!(!is_valid_username("ab1"));
        assert!(!is_valid_username("a"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("under_score"));
        assert!(!is_valid_username("héllo"));
    }

    #[test]
    fn duplicate_field_names_the_colliding_column() {
        assert_eq!(duplicate_field("users_email_key"), "Email");
        assert_eq!(duplicate_field("users_username_key"), "Username");
    }

    #[test]
    fn require_rejects_blank_fields() {
        assert!(require("", "email").is_err());
        assert!(require("   ", "email").is_err());
        assert!(require("a@x.com", "email").is_ok());
    }

    #[tokio::test]
    async fn dispatched_code_is_the_one_that_verifies() {
        let codes = InMemoryResetCodes::new(Duration::minutes(10));
        let mailer = RecordingMailer::default();

        issue_and_dispatch(&codes, &mailer, "e1@x.com")
            .await
            .expect("dispatch");

        let captured = {
            let sent = mailer.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].0, "e1@x.com");
            sent[0].1.clone()
        };

        assert!(codes.verify("e1@x.com", &captured).await);
        // single use
        assert!(!codes.verify("e1@x.com", &captured).await);
    }

    #[tokio::test]
    async fn reissue_invalidates_dispatched_code() {
        let codes = InMemoryResetCodes::new(Duration::minutes(10));
        let mailer = RecordingMailer::default();

        issue_and_dispatch(&codes, &mailer, "e1@x.com").await.unwrap();
        issue_and_dispatch(&codes, &mailer, "e1@x.com").await.unwrap();

        let (first, second) = {
            let sent = mailer.sent.lock().unwrap();
            (sent[0].1.clone(), sent[1].1.clone())
        };

        if first != second {
            assert!(!codes.verify("e1@x.com", &first).await);
        }
        assert!(codes.verify("e1@x.com", &second).await);
    }
}
