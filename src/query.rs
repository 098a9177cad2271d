//! Translation of the catalog page's filter controls into a store query.
//!
//! Every parameter arrives as raw query-string text. Nothing here fails:
//! malformed values fall back to their defaults.

use mongodb::bson::{doc, Document};
use serde::Deserialize;

use crate::models::Product;

pub const DEFAULT_MIN_PRICE: f64 = 0.0;
pub const DEFAULT_MAX_PRICE: f64 = 1_000_000.0;
pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 8;

/// Raw `GET /products` query parameters.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Backend natural order.
    #[default]
    Default,
    PriceLow,
    PriceHigh,
    Name,
}

impl SortMode {
    pub fn from_param(raw: &str) -> Self {
        match raw {
            "price-low" => SortMode::PriceLow,
            "price-high" => SortMode::PriceHigh,
            "name" => SortMode::Name,
            _ => SortMode::Default,
        }
    }

    /// Sort document for the store, `None` for natural order. Ties are broken
    /// by `_id` so that consecutive pages neither overlap nor skip.
    pub fn to_document(self) -> Option<Document> {
        match self {
            SortMode::Default => None,
            SortMode::PriceLow => Some(doc! { "price": 1, "_id": 1 }),
            SortMode::PriceHigh => Some(doc! { "price": -1, "_id": 1 }),
            SortMode::Name => Some(doc! { "title": 1, "_id": 1 }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: f64,
    pub max_price: f64,
}

impl Default for ProductFilter {
    fn default() -> Self {
        ProductFilter {
            search: None,
            category: None,
            min_price: DEFAULT_MIN_PRICE,
            max_price: DEFAULT_MAX_PRICE,
        }
    }
}

impl ProductFilter {
    pub fn to_document(&self) -> Document {
        let mut filter = doc! {
            "price": { "$gte": self.min_price, "$lte": self.max_price }
        };
        if let Some(search) = &self.search {
            filter.insert(
                "title",
                doc! { "$regex": regex::escape(search), "$options": "i" },
            );
        }
        if let Some(category) = &self.category {
            filter.insert("category", category.as_str());
        }
        filter
    }

    /// In-process equivalent of [`ProductFilter::to_document`].
    pub fn matcher(&self) -> ProductMatcher<'_> {
        ProductMatcher {
            filter: self,
            search: self.search.as_deref().map(str::to_lowercase),
        }
    }
}

pub struct ProductMatcher<'a> {
    filter: &'a ProductFilter,
    search: Option<String>,
}

impl ProductMatcher<'_> {
    pub fn matches(&self, product: &Product) -> bool {
        if product.price < self.filter.min_price || product.price > self.filter.max_price {
            return false;
        }
        if let Some(search) = &self.search {
            if !product.title.to_lowercase().contains(search.as_str()) {
                return false;
            }
        }
        match &self.filter.category {
            Some(category) => product.category.as_deref() == Some(category.as_str()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Number of matching documents that precede this page. Capped at
    /// `i64::MAX`, the largest skip the server accepts.
    pub fn skip(&self) -> u64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.limit)
            .min(i64::MAX as u64)
    }

    pub fn total_pages(&self, total_count: u64) -> u64 {
        total_count.div_ceil(self.limit)
    }
}

/// A fully resolved listing request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductQuery {
    pub filter: ProductFilter,
    pub sort: SortMode,
    pub pagination: Pagination,
}

impl From<ListParams> for ProductQuery {
    fn from(params: ListParams) -> Self {
        let filter = ProductFilter {
            search: non_empty(params.search),
            category: non_empty(params.category),
            min_price: parse_price(params.min_price.as_deref()).unwrap_or(DEFAULT_MIN_PRICE),
            max_price: parse_price(params.max_price.as_deref()).unwrap_or(DEFAULT_MAX_PRICE),
        };

        let sort = params
            .sort
            .as_deref()
            .map(SortMode::from_param)
            .unwrap_or_default();

        let pagination = Pagination {
            page: parse_positive(params.page.as_deref()).unwrap_or(DEFAULT_PAGE),
            limit: parse_positive(params.limit.as_deref()).unwrap_or(DEFAULT_LIMIT),
        };

        ProductQuery {
            filter,
            sort,
            pagination,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_price(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|v| *v > 0)
}
