use serde::{Deserialize, Serialize};

use super::expense::Expense;

/// Fixed page size for expense listings
pub const PER_PAGE: u64 = 15;

/// Query de paginação (`?page=N`)
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number. Missing, zero or non-numeric values mean page 1.
    pub page: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> u64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }
}

/// One page of a user's expenses plus paginator metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ExpensePage {
    pub current_page: u64,
    pub data: Vec<Expense>,
    pub first_page_url: String,
    pub from: Option<u64>,
    pub last_page: u64,
    pub last_page_url: String,
    pub next_page_url: Option<String>,
    pub path: String,
    pub per_page: u64,
    pub prev_page_url: Option<String>,
    pub to: Option<u64>,
    pub total: u64,
}

impl ExpensePage {
    /// `path` is the listing URL without query string.
    pub fn new(data: Vec<Expense>, total: u64, page: u64, per_page: u64, path: &str) -> Self {
        let per_page = per_page.max(1);
        let last_page = total.div_ceil(per_page).max(1);
        let page = page.max(1);
        let offset = (page - 1).saturating_mul(per_page);
        let page_url = |n: u64| format!("{}?page={}", path, n);

        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            (
                Some(offset.saturating_add(1)),
                Some(offset.saturating_add(data.len() as u64)),
            )
        };

        ExpensePage {
            current_page: page,
            first_page_url: page_url(1),
            from,
            last_page,
            last_page_url: page_url(last_page),
            next_page_url: (page < last_page).then(|| page_url(page + 1)),
            path: path.to_string(),
            per_page,
            prev_page_url: (page > 1).then(|| page_url(page - 1)),
            to,
            total,
            data,
        }
    }
}
