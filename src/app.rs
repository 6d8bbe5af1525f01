use actix_web::web;
use std::sync::Arc;

use crate::api;
use crate::config::AppConfig;
use crate::database::{ExpenseRepository, TokenRepository, UserRepository};
use crate::middleware::AuthMiddleware;
use crate::services::{AuthService, ExpenseService};
use crate::utils::error::AppError;

/// Shared per-process state handed to handlers as `web::Data<AppState>`.
pub struct AppState {
    pub auth: AuthService,
    pub expenses: ExpenseService,
    /// "memory" or "mongodb", reported by /health
    pub storage: &'static str,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, config: &AppConfig) -> Result<Self, AppError>
    where
        S: UserRepository + TokenRepository + ExpenseRepository + 'static,
    {
        Ok(Self {
            auth: AuthService::new(
                store.clone(),
                store.clone(),
                config.bcrypt_cost,
                config.token_ttl_minutes,
            )?,
            expenses: ExpenseService::new(store),
            storage: if config.uses_memory_store() { "memory" } else { "mongodb" },
        })
    }
}

/// Malformed bodies become a JSON 400 instead of actix's plain-text error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Malformed JSON body: {}", err)).into()
    })
}

/// Route table, shared by the server and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        // Health check
        .route("/health", web::get().to(api::health::health_check))
        // Auth endpoints
        .route("/login", web::post().to(api::auth::login))
        .route("/register", web::post().to(api::auth::register))
        .service(
            web::resource("/user")
                .wrap(AuthMiddleware)
                .route(web::get().to(api::auth::current_user)),
        )
        // Expenses - require a bearer token
        .service(
            web::resource("/expenses")
                .wrap(AuthMiddleware)
                .route(web::get().to(api::expenses::index))
                .route(web::post().to(api::expenses::store)),
        )
        .service(
            web::resource("/expenses/{id}")
                .wrap(AuthMiddleware)
                .route(web::get().to(api::expenses::show))
                .route(web::put().to(api::expenses::update))
                .route(web::delete().to(api::expenses::destroy)),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::services::auth_service::RegisterRequest;
    use actix_web::body::{self, MessageBody};
    use actix_web::dev::ServiceResponse;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use serde_json::{json, Value};

    fn test_config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("memory://".to_string()),
            "BCRYPT_COST" => Some("4".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn test_state() -> web::Data<AppState> {
        let store = Arc::new(MemoryStore::new());
        web::Data::new(AppState::new(store, &test_config()).unwrap())
    }

    /// Registers a user directly through the service and returns its token.
    async fn seed_user(state: &AppState, email: &str, password: &str) -> String {
        state
            .auth
            .register(RegisterRequest {
                email: Some(email.to_string()),
                password: Some(password.to_string()),
                name: None,
            })
            .await
            .unwrap()
            .token
    }

    /// Status and JSON body, also for errors raised by middleware.
    async fn read<B: MessageBody>(result: Result<ServiceResponse<B>, actix_web::Error>) -> (StatusCode, Value) {
        let (status, bytes) = match result {
            Ok(res) => {
                let status = res.status();
                (status, test::read_body(res).await)
            }
            Err(err) => {
                let res = err.error_response();
                let status = res.status();
                (status, body::to_bytes(res.into_body()).await.unwrap_or_default())
            }
        };
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn bearer(token: &str) -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Bearer {}", token))
    }

    macro_rules! init_app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(configure)).await
        };
    }

    #[actix_rt::test]
    async fn test_login_then_create_expense() {
        let state = test_state();
        seed_user(&state, "jane@example.com", "secret-password").await;
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({"email": "jane@example.com", "password": "secret-password"}))
            .to_request();
        let (status, body) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri("/user").insert_header(bearer(&token)).to_request();
        let (status, user) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["email"], "jane@example.com");
        assert!(user.get("password").is_none());

        let req = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&token))
            .set_json(json!({"item_name": "Coffee", "amount": 4.5, "date": "2024-01-15"}))
            .to_request();
        let (status, expense) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(expense["item_name"], "Coffee");
        assert_eq!(expense["amount"], 4.5);
        assert_eq!(expense["date"], "2024-01-15");
        assert_eq!(expense["user_id"], user["id"]);
        assert!(expense["id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[actix_rt::test]
    async fn test_bad_credentials_get_same_401() {
        let state = test_state();
        seed_user(&state, "jane@example.com", "secret-password").await;
        let app = init_app!(state);

        for (email, password) in [
            ("jane@example.com", "wrong-password"),
            ("nobody@example.com", "secret-password"),
        ] {
            let req = test::TestRequest::post()
                .uri("/login")
                .set_json(json!({"email": email, "password": password}))
                .to_request();
            let (status, body) = read(test::try_call_service(&app, req).await).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, json!({"message": "Invalid credentials"}));
        }
    }

    #[actix_rt::test]
    async fn test_login_validation_is_422() {
        let app = init_app!(test_state());

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({"email": "not-an-email"}))
            .to_request();
        let (status, body) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["email"].is_array());
        assert!(body["errors"]["password"].is_array());
    }

    #[actix_rt::test]
    async fn test_protected_routes_need_a_valid_token() {
        let app = init_app!(test_state());

        for req in [
            test::TestRequest::get().uri("/user").to_request(),
            test::TestRequest::get().uri("/expenses").to_request(),
            test::TestRequest::get()
                .uri("/expenses")
                .insert_header(bearer("not-a-real-token"))
                .to_request(),
            test::TestRequest::delete()
                .uri("/expenses/650000000000000000000000")
                .insert_header((header::AUTHORIZATION, "Basic dXNlcjpwYXNz"))
                .to_request(),
        ] {
            let (status, body) = read(test::try_call_service(&app, req).await).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["message"], "Unauthenticated.");
        }
    }

    #[actix_rt::test]
    async fn test_listing_pages_newest_first() {
        let state = test_state();
        let token = seed_user(&state, "jane@example.com", "secret-password").await;
        let app = init_app!(state);

        for n in 1..=16 {
            let req = test::TestRequest::post()
                .uri("/expenses")
                .insert_header(bearer(&token))
                .set_json(json!({"item_name": format!("Item {}", n), "amount": n, "date": "2024-01-15"}))
                .to_request();
            let (status, _) = read(test::try_call_service(&app, req).await).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let req = test::TestRequest::get().uri("/expenses").insert_header(bearer(&token)).to_request();
        let (status, page) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["data"].as_array().unwrap().len(), 15);
        assert_eq!(page["data"][0]["item_name"], "Item 16");
        assert_eq!(page["total"], 16);
        assert_eq!(page["last_page"], 2);
        assert_eq!(page["per_page"], 15);
        assert!(page["next_page_url"].as_str().unwrap().ends_with("/expenses?page=2"));

        let req = test::TestRequest::get()
            .uri("/expenses?page=2")
            .insert_header(bearer(&token))
            .to_request();
        let (_, page) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(page["data"].as_array().unwrap().len(), 1);
        assert_eq!(page["data"][0]["item_name"], "Item 1");
        assert_eq!(page["from"], 16);
        assert_eq!(page["next_page_url"], Value::Null);
    }

    #[actix_rt::test]
    async fn test_page_far_past_the_end() {
        let state = test_state();
        let token = seed_user(&state, "jane@example.com", "secret-password").await;
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&token))
            .set_json(json!({"item_name": "Coffee", "amount": 4.5, "date": "2024-01-15"}))
            .to_request();
        let (status, _) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri("/expenses?page=18446744073709551615")
            .insert_header(bearer(&token))
            .to_request();
        let (status, page) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["data"], json!([]));
        assert_eq!(page["total"], 1);
        assert_eq!(page["last_page"], 1);
    }

    #[actix_rt::test]
    async fn test_listing_only_shows_own_expenses() {
        let state = test_state();
        let jane = seed_user(&state, "jane@example.com", "secret-password").await;
        let john = seed_user(&state, "john@example.com", "secret-password").await;
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&jane))
            .set_json(json!({"item_name": "Coffee", "amount": "4.50", "date": "2024-01-15"}))
            .to_request();
        let (status, _) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::CREATED);

        let req = test::TestRequest::get().uri("/expenses").insert_header(bearer(&john)).to_request();
        let (status, page) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 0);
        assert_eq!(page["data"], json!([]));
    }

    #[actix_rt::test]
    async fn test_delete_rules() {
        let state = test_state();
        let jane = seed_user(&state, "jane@example.com", "secret-password").await;
        let john = seed_user(&state, "john@example.com", "secret-password").await;
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&jane))
            .set_json(json!({"item_name": "Coffee", "amount": 4.5, "date": "2024-01-15"}))
            .to_request();
        let (_, expense) = read(test::try_call_service(&app, req).await).await;
        let uri = format!("/expenses/{}", expense["id"].as_str().unwrap());

        // Someone else's record
        let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&john)).to_request();
        let (status, body) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Forbidden");

        let req = test::TestRequest::get().uri("/expenses").insert_header(bearer(&jane)).to_request();
        let (_, page) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(page["total"], 1);

        let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&jane)).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(test::read_body(res).await.is_empty());

        let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&jane)).to_request();
        let (status, body) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Expense not found");

        let req = test::TestRequest::delete()
            .uri("/expenses/not-an-object-id")
            .insert_header(bearer(&jane))
            .to_request();
        let (status, _) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_create_validation_errors() {
        let state = test_state();
        let token = seed_user(&state, "jane@example.com", "secret-password").await;
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&token))
            .set_json(json!({}))
            .to_request();
        let (status, body) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        for field in ["item_name", "amount", "date"] {
            assert!(body["errors"][field].is_array(), "missing error for {}", field);
        }

        let req = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&token))
            .set_json(json!({"item_name": "Coffee", "amount": -1, "date": "15/01/2024"}))
            .to_request();
        let (status, body) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["amount"].is_array());
        assert!(body["errors"]["date"].is_array());
        assert!(body["errors"].get("item_name").is_none());

        let req = test::TestRequest::get().uri("/expenses").insert_header(bearer(&token)).to_request();
        let (_, page) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(page["total"], 0);
    }

    #[actix_rt::test]
    async fn test_malformed_json_is_400() {
        let state = test_state();
        let token = seed_user(&state, "jane@example.com", "secret-password").await;
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/expenses")
            .insert_header(bearer(&token))
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{\"item_name\": ")
            .to_request();
        let (status, body) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[actix_rt::test]
    async fn test_show_and_update_are_501() {
        let state = test_state();
        let token = seed_user(&state, "jane@example.com", "secret-password").await;
        let app = init_app!(state);

        for req in [
            test::TestRequest::get(),
            test::TestRequest::put(),
        ] {
            let req = req
                .uri("/expenses/650000000000000000000000")
                .insert_header(bearer(&token))
                .to_request();
            let (status, _) = read(test::try_call_service(&app, req).await).await;
            assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        }
    }

    #[actix_rt::test]
    async fn test_register() {
        let app = init_app!(test_state());
        let body = json!({"email": "New@Example.com", "password": "long-enough", "name": "New"});

        let req = test::TestRequest::post().uri("/register").set_json(&body).to_request();
        let (status, created) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["user"]["email"], "new@example.com");
        let token = created["token"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri("/user").insert_header(bearer(&token)).to_request();
        let (status, _) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::OK);

        let req = test::TestRequest::post().uri("/register").set_json(&body).to_request();
        let (status, _) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[actix_rt::test]
    async fn test_health() {
        let app = init_app!(test_state());
        let req = test::TestRequest::get().uri("/health").to_request();
        let (status, body) = read(test::try_call_service(&app, req).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "expense-tracker");
        assert_eq!(body["storage"], "memory");
    }
}
