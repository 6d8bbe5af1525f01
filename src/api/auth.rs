use actix_web::{web, HttpResponse};

use crate::app::AppState;
use crate::models::UserInfo;
use crate::services::auth_service::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::services::AuthenticatedUser;
use crate::utils::error::{AppError, ErrorBody};

#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 422, description = "Missing or malformed fields", body = ErrorBody)
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let email = request.email.clone().unwrap_or_default();
    log::info!("🔐 POST /login - email: {}", email);

    match state.auth.login(request.into_inner()).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", email);
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = RegisterResponse),
        (status = 409, description = "User already exists", body = ErrorBody),
        (status = 422, description = "Missing or malformed fields", body = ErrorBody)
    )
)]
pub async fn register(
    state: web::Data<AppState>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let email = request.email.clone().unwrap_or_default();
    log::info!("📝 POST /register - email: {}", email);

    match state.auth.register(request.into_inner()).await {
        Ok(response) => {
            log::info!("✅ Registration successful: {}", email);
            Ok(HttpResponse::Created().json(response))
        }
        Err(e) => {
            log::warn!("❌ Registration failed: {} - {}", email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/user",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn current_user(user: web::ReqData<AuthenticatedUser>) -> HttpResponse {
    log::info!("👤 GET /user - {}", user.user_id());
    HttpResponse::Ok().json(UserInfo::from(&user.user))
}
