use actix_web::{web, HttpRequest, HttpResponse};

use crate::app::AppState;
use crate::models::{CreateExpenseRequest, Expense, ExpensePage, PageQuery};
use crate::services::AuthenticatedUser;
use crate::utils::error::{AppError, ErrorBody};

/// Absolute listing URL (no query), used for the paginator links
fn listing_url(req: &HttpRequest) -> String {
    let conn = req.connection_info();
    format!("{}://{}{}", conn.scheme(), conn.host(), req.path())
}

/// GET /expenses - Lista os gastos do usuário (15 por página, mais recentes primeiro)
#[utoipa::path(
    get,
    path = "/expenses",
    tag = "Expenses",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of the caller's expenses", body = ExpensePage),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn index(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: web::ReqData<AuthenticatedUser>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.page();
    log::info!("📋 GET /expenses?page={} - user {}", page, user.user_id());

    let result = state.expenses.list(&user, page, &listing_url(&req)).await?;
    log::info!("✅ Listed {} of {} expenses", result.data.len(), result.total);

    Ok(HttpResponse::Ok().json(result))
}

/// POST /expenses - Cria novo gasto
#[utoipa::path(
    post,
    path = "/expenses",
    tag = "Expenses",
    request_body = CreateExpenseRequest,
    responses(
        (status = 201, description = "Expense created", body = Expense),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn store(
    state: web::Data<AppState>,
    user: web::ReqData<AuthenticatedUser>,
    body: web::Json<CreateExpenseRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("📝 POST /expenses - user {}", user.user_id());

    match state.expenses.create(&user, body.into_inner()).await {
        Ok(expense) => Ok(HttpResponse::Created().json(expense)),
        Err(e) => {
            log::warn!("⚠️ Failed to create expense: {}", e);
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/expenses/{id}",
    tag = "Expenses",
    params(("id" = String, Path, description = "Expense id")),
    responses(
        (status = 501, description = "Not supported yet", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn show(
    state: web::Data<AppState>,
    user: web::ReqData<AuthenticatedUser>,
    expense_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔍 GET /expenses/{} - user {}", expense_id, user.user_id());

    let expense = state.expenses.show(&user, &expense_id).await?;
    Ok(HttpResponse::Ok().json(expense))
}

#[utoipa::path(
    put,
    path = "/expenses/{id}",
    tag = "Expenses",
    params(("id" = String, Path, description = "Expense id")),
    responses(
        (status = 501, description = "Not supported yet", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update(
    state: web::Data<AppState>,
    user: web::ReqData<AuthenticatedUser>,
    expense_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔧 PUT /expenses/{} - user {}", expense_id, user.user_id());

    let expense = state.expenses.update(&user, &expense_id).await?;
    Ok(HttpResponse::Ok().json(expense))
}

/// DELETE /expenses/{id} - Remove gasto (somente o dono)
#[utoipa::path(
    delete,
    path = "/expenses/{id}",
    tag = "Expenses",
    params(("id" = String, Path, description = "Expense id")),
    responses(
        (status = 204, description = "Expense deleted"),
        (status = 401, description = "Unauthenticated", body = ErrorBody),
        (status = 403, description = "Expense belongs to another user", body = ErrorBody),
        (status = 404, description = "Expense not found", body = ErrorBody)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn destroy(
    state: web::Data<AppState>,
    user: web::ReqData<AuthenticatedUser>,
    expense_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    log::info!("🗑️  DELETE /expenses/{} - user {}", expense_id, user.user_id());

    match state.expenses.destroy(&user, &expense_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => {
            log::warn!("⚠️ Failed to delete expense {}: {}", expense_id, e);
            Err(e)
        }
    }
}
