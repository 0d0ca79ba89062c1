// Catalog, cart and address book
pub mod commerce;

// Order placement, lifecycle and statistics
pub mod orders;

// Checkout arithmetic
pub mod pricing;

use sea_orm::sea_query::{Expr, Func, IntoColumnRef, SimpleExpr};

/// 1-based page request, already clamped by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Zero-based page index as expected by sea-orm's paginator
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// Case-insensitive substring match, portable across Postgres and SQLite.
pub(crate) fn contains_ci<C: IntoColumnRef>(column: C, needle: &str) -> SimpleExpr {
    let pattern = format!("%{}%", needle.trim().to_lowercase());
    Expr::expr(Func::lower(Expr::col(column))).like(pattern)
}
