use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Expense Tracker API",
        version = "1.0.0",
        description = "Personal expense tracking.\n\n**Authentication:** `POST /login` returns an opaque token. Send it as `Authorization: Bearer <token>` on every other endpoint except `/register` and `/health`."
    ),
    paths(
        // Auth endpoints
        crate::api::auth::login,
        crate::api::auth::register,
        crate::api::auth::current_user,

        // Expenses
        crate::api::expenses::index,
        crate::api::expenses::store,
        crate::api::expenses::show,
        crate::api::expenses::update,
        crate::api::expenses::destroy,

        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::LoginResponse,
            crate::services::auth_service::RegisterRequest,
            crate::services::auth_service::RegisterResponse,
            crate::models::UserInfo,
            crate::models::Expense,
            crate::models::ExpensePage,
            crate::models::CreateExpenseRequest,
            crate::utils::error::ErrorBody,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Login, registration and the current user."),
        (name = "Expenses", description = "Expenses owned by the authenticated user."),
        (name = "Health", description = "Service health."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Token returned by POST /login"))
                        .build()
                ),
            );
        }
    }
}
