//! Classification of products into single-unit devices and multi-unit
//! accessories, and the quantity cap that follows from it.
//!
//! The same functions back the browsing views, the local cart and the
//! authoritative checkout validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Category keys that default to multi-unit purchasing.
pub const MULTI_UNIT_CATEGORIES: [&str; 4] = ["accessories", "accessory", "airpods", "earpods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseMode {
    #[default]
    SingleUnit,
    MultiUnit,
}

impl PurchaseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseMode::SingleUnit => "single_unit",
            PurchaseMode::MultiUnit => "multi_unit",
        }
    }

    /// Parses the stored literal. Anything else is not a mode.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "single_unit" => Some(PurchaseMode::SingleUnit),
            "multi_unit" => Some(PurchaseMode::MultiUnit),
            _ => None,
        }
    }

    pub fn is_single_unit(&self) -> bool {
        matches!(self, PurchaseMode::SingleUnit)
    }
}

impl fmt::Display for PurchaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linked category fields usable as a fallback classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryHint<'a> {
    pub slug: Option<&'a str>,
    pub name: Option<&'a str>,
    pub display_name: Option<&'a str>,
}

/// The subset of a product record that bears on its purchase mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductSignals<'a> {
    pub purchase_mode: Option<&'a str>,
    pub is_single_unit: Option<bool>,
    pub category_slug: Option<&'a str>,
    pub category: Option<CategoryHint<'a>>,
}

impl<'a> ProductSignals<'a> {
    /// First populated category key, in priority order.
    fn category_key(&self) -> Option<&'a str> {
        let linked = self.category.unwrap_or_default();
        [
            self.category_slug,
            linked.slug,
            linked.name,
            linked.display_name,
        ]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
    }
}

/// One classification source. Returns `None` to defer to the next rule.
pub trait ModeRule: Send + Sync {
    fn classify(&self, product: &ProductSignals<'_>) -> Option<PurchaseMode>;
}

impl<F> ModeRule for F
where
    F: Fn(&ProductSignals<'_>) -> Option<PurchaseMode> + Send + Sync,
{
    fn classify(&self, product: &ProductSignals<'_>) -> Option<PurchaseMode> {
        self(product)
    }
}

type RuleFn = fn(&ProductSignals<'_>) -> Option<PurchaseMode>;

const STANDARD_RULES: [RuleFn; 3] = [explicit_mode, legacy_flag, category_allow_list];

fn explicit_mode(product: &ProductSignals<'_>) -> Option<PurchaseMode> {
    product.purchase_mode.and_then(PurchaseMode::parse)
}

fn legacy_flag(product: &ProductSignals<'_>) -> Option<PurchaseMode> {
    product.is_single_unit.map(|single| {
        if single {
            PurchaseMode::SingleUnit
        } else {
            PurchaseMode::MultiUnit
        }
    })
}

fn category_allow_list(product: &ProductSignals<'_>) -> Option<PurchaseMode> {
    let key = normalize_category_key(product.category_key()?);
    MULTI_UNIT_CATEGORIES
        .contains(&key.as_str())
        .then_some(PurchaseMode::MultiUnit)
}

/// Lowercases, drops everything but alphanumerics, hyphens and spaces, and
/// joins whitespace runs with a single hyphen.
pub fn normalize_category_key(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Ordered chain of classification rules; the first rule with an opinion wins
/// and products nobody classifies fall back to [`PurchaseMode::SingleUnit`].
pub struct PurchaseModeResolver {
    rules: Vec<Box<dyn ModeRule>>,
}

impl Default for PurchaseModeResolver {
    fn default() -> Self {
        Self {
            rules: STANDARD_RULES
                .into_iter()
                .map(|rule| Box::new(rule) as Box<dyn ModeRule>)
                .collect(),
        }
    }
}

impl PurchaseModeResolver {
    /// Appends a rule consulted after the existing ones.
    pub fn with_rule(mut self, rule: impl ModeRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn resolve(&self, product: &ProductSignals<'_>) -> PurchaseMode {
        self.rules
            .iter()
            .find_map(|rule| rule.classify(product))
            .unwrap_or_default()
    }
}

/// Resolves with the standard rule chain.
pub fn resolve_purchase_mode(product: &ProductSignals<'_>) -> PurchaseMode {
    STANDARD_RULES
        .iter()
        .find_map(|rule| rule(product))
        .unwrap_or_default()
}

/// Coerces a loosely-typed stock figure: non-finite or negative becomes 0.
pub fn coerce_stock(raw: f64) -> i64 {
    if raw.is_finite() && raw > 0.0 {
        raw.floor() as i64
    } else {
        0
    }
}

/// How many units of a product may be ordered given its current stock.
pub fn max_allowed_quantity(mode: PurchaseMode, stock: i64) -> i64 {
    let stock = stock.max(0);
    match mode {
        PurchaseMode::SingleUnit => i64::from(stock > 0),
        PurchaseMode::MultiUnit => stock,
    }
}
