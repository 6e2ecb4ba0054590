use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::OrderStatus;

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    /// `(page, per_page, offset)` with page ≥ 1 and per_page in 1..=100.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Title,
}

// Query strings are flat; serde's flatten cannot parse numbers out of them,
// so each query repeats the paging fields and exposes them as `Pagination`.
macro_rules! paged_query {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Default, Deserialize, ToSchema)]
        pub struct $name {
            pub page: Option<i64>,
            pub per_page: Option<i64>,
            $(pub $field: $ty,)*
        }

        impl $name {
            pub fn pagination(&self) -> Pagination {
                Pagination {
                    page: self.page,
                    per_page: self.per_page,
                }
            }
        }
    };
}

paged_query!(ProductQuery {
    q: Option<String>,
    category: Option<String>,
    min_price: Option<i64>,
    max_price: Option<i64>,
    sort_by: Option<ProductSortBy>,
    sort_order: Option<SortOrder>,
});

paged_query!(OrderQuery {
    order_number: Option<String>,
});

paged_query!(OrderListQuery {
    status: Option<OrderStatus>,
    sort_order: Option<SortOrder>,
});

paged_query!(LowStockQuery {
    threshold: Option<i32>,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let p = Pagination {
            page: Some(0),
            per_page: Some(500),
        };
        assert_eq!(p.normalize(), (1, 100, 0));
        let p = Pagination {
            page: Some(3),
            per_page: None,
        };
        assert_eq!(p.normalize(), (3, 20, 40));
    }

    #[test]
    fn flat_query_strings_parse() {
        let uri: axum::http::Uri = "/api/products?page=2&per_page=5&category=accessories&sort_by=price"
            .parse()
            .unwrap();
        let axum::extract::Query(q) =
            axum::extract::Query::<ProductQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(q.pagination().normalize(), (2, 5, 5));
        assert_eq!(q.category.as_deref(), Some("accessories"));
        assert!(matches!(q.sort_by, Some(ProductSortBy::Price)));
    }
}
