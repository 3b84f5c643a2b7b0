use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::net::error::Result;
use crate::sec::authn::initiator::{EnrollmentInitiator, Initiator};
use crate::state::ArcShared;

pub fn routes() -> Router<ArcShared> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/mfa-validate", post(verify_otp))
        .route("/mfa-setup", get(mfa_setup))
        .route("/recover-password", post(recover_password))
        .route("/reset-password", post(reset_password))
        .route("/session", get(session))
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(
    State(state): State<ArcShared>,
    axum::Json(json): axum::Json<LoginBody>,
) -> Result<impl IntoResponse> {
    let resp = state.auth()
        .login(&json.email, &json.password)
        .await?;

    Ok((StatusCode::OK, axum::Json(resp)))
}

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
    password: String,
    confirm_password: String,
}

async fn register(
    State(state): State<ArcShared>,
    axum::Json(json): axum::Json<RegisterBody>,
) -> Result<impl IntoResponse> {
    let resp = state.auth()
        .register(&json.name, &json.email, &json.password, &json.confirm_password)
        .await?;

    Ok((StatusCode::CREATED, axum::Json(resp)))
}

#[derive(Deserialize)]
struct VerifyBody {
    token: String,
    email: String,
    code: String,
}

async fn verify_otp(
    State(state): State<ArcShared>,
    axum::Json(json): axum::Json<VerifyBody>,
) -> Result<impl IntoResponse> {
    let resp = state.auth()
        .verify_otp(&json.token, &json.email, &json.code)
        .await?;

    Ok((StatusCode::OK, axum::Json(resp)))
}

async fn mfa_setup(
    State(state): State<ArcShared>,
    initiator: EnrollmentInitiator,
) -> Result<impl IntoResponse> {
    let resp = state.auth()
        .setup_mfa(initiator.email())
        .await?;

    Ok((StatusCode::OK, axum::Json(resp)))
}

#[derive(Deserialize)]
struct RecoverBody {
    name: String,

    #[serde(default)]
    additional_info: String,
}

async fn recover_password(
    State(state): State<ArcShared>,
    axum::Json(json): axum::Json<RecoverBody>,
) -> Result<impl IntoResponse> {
    let resp = state.auth()
        .recover_password(&json.name, &json.additional_info)
        .await?;

    Ok((StatusCode::OK, axum::Json(resp)))
}

#[derive(Deserialize)]
struct ResetBody {
    token: String,
    email: String,
    code: String,
    new_password: String,
    confirm_new_password: String,
}

async fn reset_password(
    State(state): State<ArcShared>,
    axum::Json(json): axum::Json<ResetBody>,
) -> Result<impl IntoResponse> {
    let resp = state.auth()
        .reset_password(
            &json.token,
            &json.email,
            &json.code,
            &json.new_password,
            &json.confirm_new_password,
        )
        .await?;

    Ok((StatusCode::OK, axum::Json(resp)))
}

async fn session(
    State(state): State<ArcShared>,
    initiator: Initiator,
) -> Result<impl IntoResponse> {
    let user = state.auth()
        .profile(initiator.user_id())
        .await?;

    Ok((StatusCode::OK, axum::Json(user)))
}
