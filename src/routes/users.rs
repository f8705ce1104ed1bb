//! User accounts: the resource endpoints plus registration, verification,
//! login and password flows.

use axum::{
    extract::{Path, State},
    response::Response,
};
use serde_json::json;

use crate::{
    auth,
    db::NOW,
    error::{validation, AppError, AppResult, FieldErrors, OptionExt},
    mail::MailMessage,
    middleware::{ip::ClientIp, validation::parse_id, CurrentUser, JsonBody},
    models::User,
    queries,
    state::AppState,
    types::{
        created, ok, AuthLoginRequest, LoginRequest, RecoverPasswordRequest, RegisterRequest, UpdatePasswordRequest,
        UpdateUserRequest,
    },
};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn hash_blocking(password: String) -> AppResult<String> {
    let hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| anyhow::anyhow!("password hashing task failed: {}", e))??;
    Ok(hash)
}

async fn verify_blocking(password: String, hash: String) -> AppResult<bool> {
    let verified = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(|e| anyhow::anyhow!("password verification task failed: {}", e))??;
    Ok(verified)
}

/// Delivery problems are logged, never surfaced: the code can always be resent.
async fn notify(state: &AppState, message: MailMessage) {
    let to = message.to.clone();
    if let Err(e) = state.mailer.send(message).await {
        tracing::error!(%to, "Failed to send mail: {:?}", e);
    }
}

/// Stores a fresh verification code for the user and mails it.
async fn issue_code(state: &AppState, user: &User) -> AppResult<()> {
    let code = auth::generate_verification_code();
    let sql = format!("UPDATE users SET verification_code = ?1, updated_at = {} WHERE id = ?2", NOW);
    sqlx::query(&sql).bind(&code).bind(user.id).execute(&state.db).await?;
    notify(state, MailMessage::verification_code(&state.config.mail, &user.email, &user.name, &code)).await;
    Ok(())
}

async fn find(state: &AppState, id: i64) -> AppResult<User> {
    queries::find_user(&state.db, id).await?.ok_or_not_found("User")
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<Response> {
    Ok(ok("Users", "User list", queries::all_users(&state.db).await?))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let user = find(&state, parse_id(&id, "User")?).await?;
    Ok(ok("User", "User found", queries::user_detail(&state.db, user).await?))
}

pub async fn register(State(state): State<AppState>, JsonBody(req): JsonBody<RegisterRequest>) -> AppResult<Response> {
    let mut errors = FieldErrors::default();
    let name = validation::require_text(&mut errors, "name", &req.name);
    let lastname = validation::require_text(&mut errors, "lastname", &req.lastname);
    if let Some(email) = validation::require_text(&mut errors, "email", &req.email) {
        validation::validate_email(&mut errors, "email", email);
    }
    match req.password.as_deref() {
        Some(password) => {
            validation::validate_password(&mut errors, "password", password, state.config.auth.min_password_len)
        }
        None => errors.add("password", "password is required"),
    }
    errors.finish()?;

    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    if queries::find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::BadRequest("The email is already registered".to_string()));
    }

    let password_hash = hash_blocking(req.password.unwrap_or_default()).await?;
    let id = sqlx::query("INSERT INTO users (name, lastname, email, password_hash) VALUES (?1, ?2, ?3, ?4)")
        .bind(name)
        .bind(lastname)
        .bind(&email)
        .bind(&password_hash)
        .execute(&state.db)
        .await?
        .last_insert_rowid();
    let user = find(&state, id).await?;

    issue_code(&state, &user).await?;
    state.metrics.inc_users_registered();
    tracing::info!(user_id = user.id, "User registered");

    Ok(created(
        "User registered",
        "Check your email for the verification code",
        json!({ "user_id": user.id, "name": user.name, "lastname": user.lastname, "email": user.email }),
    ))
}

/// Re-sends a verification code.
pub async fn send_code(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> AppResult<Response> {
    state.rate_limiter.check_endpoint_limit("code-verify", ip).await?;
    let user = find(&state, parse_id(&id, "User")?).await?;
    issue_code(&state, &user).await?;
    Ok(ok("Code sent", "A new verification code was sent", json!({ "user_id": user.id })))
}

/// Verifies the account with the mailed code.
pub async fn auth_login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(req): JsonBody<AuthLoginRequest>,
) -> AppResult<Response> {
    state.rate_limiter.check_endpoint_limit("auth-login", ip).await?;

    let mut errors = FieldErrors::default();
    let email = validation::require_text(&mut errors, "user_email", &req.user_email).map(normalize_email);
    if req.password.is_none() {
        errors.add("password", "password is required");
    }
    if req.verification_code.is_none() {
        errors.add("verification_code", "verification_code is required");
    }
    errors.finish()?;

    let rejected = || AppError::Unauthorized("Invalid email, password or verification code".to_string());
    let code = req.verification_code.as_ref().map(|c| c.as_text()).unwrap_or_default();
    let user = queries::find_user_by_email(&state.db, &email.unwrap_or_default()).await?.ok_or_else(rejected)?;
    if user.verification_code.as_deref() != Some(code.as_str()) {
        return Err(rejected());
    }
    if !verify_blocking(req.password.unwrap_or_default(), user.password_hash.clone()).await? {
        return Err(rejected());
    }

    let sql = format!("UPDATE users SET verification_code = NULL, updated_at = {} WHERE id = ?1", NOW);
    sqlx::query(&sql).bind(user.id).execute(&state.db).await?;
    let user = find(&state, user.id).await?;
    tracing::info!(user_id = user.id, "Account verified");
    Ok(ok("Account verified", "The account was verified", user))
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AppResult<Response> {
    state.rate_limiter.check_endpoint_limit("login", ip).await?;

    let mut errors = FieldErrors::default();
    let email = validation::require_text(&mut errors, "email", &req.email).map(normalize_email);
    if req.password.is_none() {
        errors.add("password", "password is required");
    }
    errors.finish()?;

    let rejected = || AppError::Unauthorized("Invalid credentials".to_string());
    let user = queries::find_user_by_email(&state.db, &email.unwrap_or_default()).await?.ok_or_else(rejected)?;
    if !verify_blocking(req.password.unwrap_or_default(), user.password_hash.clone()).await? {
        return Err(rejected());
    }
    if !user.is_verified() {
        return Err(AppError::Unauthorized("The account has not been verified".to_string()));
    }

    let issued = auth::issue_token(&state.db, user.id, state.config.auth.token_ttl_hours).await?;
    state.metrics.inc_logins();
    tracing::info!(user_id = user.id, "User logged in");

    let detail = queries::user_detail(&state.db, user).await?;
    Ok(ok(
        "Logged in",
        "Login successful",
        json!({ "token": issued.token, "expires_at": issued.expires_at, "user": detail }),
    ))
}

pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> AppResult<Response> {
    auth::revoke_token(&state.db, &current.token).await?;
    tracing::info!(user_id = current.id(), "User logged out");
    Ok(ok("Logged out", "The token was revoked", json!({ "user_id": current.id() })))
}

/// Mails a new code. Login stays blocked until the account is verified again.
pub async fn recover_password(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    JsonBody(req): JsonBody<RecoverPasswordRequest>,
) -> AppResult<Response> {
    state.rate_limiter.check_endpoint_limit("recuperar-contra", ip).await?;

    let mut errors = FieldErrors::default();
    let email = validation::require_text(&mut errors, "email", &req.email).map(normalize_email);
    errors.finish()?;

    let user = queries::find_user_by_email(&state.db, &email.unwrap_or_default())
        .await?
        .ok_or_not_found("User")?;
    issue_code(&state, &user).await?;
    Ok(ok("Code sent", "A recovery code was sent to your email", json!({ "user_id": user.id })))
}

pub async fn update_password(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(req): JsonBody<UpdatePasswordRequest>,
) -> AppResult<Response> {
    let mut errors = FieldErrors::default();
    if req.old_password.is_none() {
        errors.add("old_password", "old_password is required");
    }
    match req.new_password.as_deref() {
        Some(password) => {
            validation::validate_password(&mut errors, "new_password", password, state.config.auth.min_password_len)
        }
        None => errors.add("new_password", "new_password is required"),
    }
    errors.finish()?;

    let user = find(&state, current.id()).await?;
    if !verify_blocking(req.old_password.unwrap_or_default(), user.password_hash.clone()).await? {
        return Err(AppError::Unauthorized("The current password is wrong".to_string()));
    }

    let password_hash = hash_blocking(req.new_password.unwrap_or_default()).await?;
    let sql = format!("UPDATE users SET password_hash = ?1, updated_at = {} WHERE id = ?2", NOW);
    sqlx::query(&sql).bind(&password_hash).bind(user.id).execute(&state.db).await?;

    notify(&state, MailMessage::password_changed(&state.config.mail, &user.email, &user.name)).await;
    tracing::info!(user_id = user.id, "Password changed");
    Ok(ok("Password updated", "The password was updated", json!({ "user_id": user.id })))
}

/// Merges `req` into the user row. `{}` returns the row unchanged.
async fn apply_update(state: &AppState, user: User, req: UpdateUserRequest) -> AppResult<User> {
    let mut errors = FieldErrors::default();
    validation::optional_text(&mut errors, "name", &req.name);
    validation::optional_text(&mut errors, "lastname", &req.lastname);
    if let Some(email) = req.email.as_deref() {
        validation::validate_email(&mut errors, "email", email.trim());
    }
    errors.finish()?;

    if req.name.is_none() && req.lastname.is_none() && req.email.is_none() {
        return Ok(user);
    }

    let email = req.email.as_deref().map(normalize_email);
    if let Some(email) = email.as_deref() {
        if let Some(other) = queries::find_user_by_email(&state.db, email).await? {
            if other.id != user.id {
                return Err(AppError::BadRequest("The email is already registered".to_string()));
            }
        }
    }

    let sql = format!(
        "UPDATE users SET name = COALESCE(?1, name), lastname = COALESCE(?2, lastname), \
         email = COALESCE(?3, email), updated_at = {} WHERE id = ?4",
        NOW
    );
    sqlx::query(&sql)
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.lastname.as_deref().map(str::trim))
        .bind(email)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    let updated = find(state, user.id).await?;

    notify(state, MailMessage::profile_updated(&state.config.mail, &updated.email, &updated.name)).await;
    Ok(updated)
}

/// Self update for the caller.
pub async fn update_self(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> AppResult<Response> {
    let user = find(&state, current.id()).await?;
    let updated = apply_update(&state, user, req).await?;
    Ok(ok("User updated", "User updated successfully", updated))
}

pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> AppResult<Response> {
    let user = find(&state, parse_id(&id, "User")?).await?;
    if user.id != current.id() {
        return Err(AppError::Unauthorized("You can only update your own account".to_string()));
    }
    let updated = apply_update(&state, user, req).await?;
    Ok(ok("User updated", "User updated successfully", updated))
}

pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let user = find(&state, parse_id(&id, "User")?).await?;
    if user.id != current.id() {
        return Err(AppError::Unauthorized("You can only delete your own account".to_string()));
    }
    sqlx::query("DELETE FROM users WHERE id = ?1").bind(user.id).execute(&state.db).await?;
    tracing::info!(user_id = user.id, "User deleted");
    Ok(ok("User deleted", "User deleted successfully", user))
}
