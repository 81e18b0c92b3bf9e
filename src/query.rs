use crate::inventory::is_expired;
use crate::models::{InventoryData, WarehouseLot};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LotSortField {
    Code,
    Name,
    Quantity,
    #[default]
    ExpiryDate,
    Notes,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QuantityBucket {
    #[serde(rename = "=0")]
    Zero,
    #[serde(rename = "1-5")]
    Few,
    #[serde(rename = "6-10")]
    Some,
    #[serde(rename = ">10")]
    Many,
}

impl QuantityBucket {
    pub fn contains(self, quantity: u32) -> bool {
        match self {
            QuantityBucket::Zero => quantity == 0,
            QuantityBucket::Few => (1..=5).contains(&quantity),
            QuantityBucket::Some => (6..=10).contains(&quantity),
            QuantityBucket::Many => quantity > 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LotState {
    #[default]
    Usable,
    Expired,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LotQuery {
    pub state: LotState,
    pub code: Option<String>,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub quantity: Option<QuantityBucket>,
    // 0 = January
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub sort: LotSortField,
    pub direction: SortDirection,
}

fn needle(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(|text| text.trim().to_lowercase())
        .filter(|text| !text.is_empty())
}

fn contains_ci(haystack: &str, needle: &Option<String>) -> bool {
    match needle {
        Some(needle) => haystack.to_lowercase().contains(needle.as_str()),
        None => true,
    }
}

pub fn list_lots(data: &InventoryData, query: &LotQuery, today: NaiveDate) -> Vec<WarehouseLot> {
    let code = needle(&query.code);
    let name = needle(&query.name);
    let notes = needle(&query.notes);

    let items: Vec<WarehouseLot> = data
        .warehouse
        .iter()
        .filter(|lot| {
            let expired = is_expired(lot.expiry_date, today);
            match query.state {
                LotState::Usable => !expired,
                LotState::Expired => expired,
            }
        })
        .filter(|lot| {
            contains_ci(&lot.code, &code)
                && contains_ci(&data.material_name(&lot.code), &name)
                && contains_ci(&lot.notes, &notes)
                && query.quantity.is_none_or(|bucket| bucket.contains(lot.quantity))
                && query.month.is_none_or(|m| lot.expiry_date.month0() == m)
                && query.year.is_none_or(|y| lot.expiry_date.year() == y)
        })
        .cloned()
        .collect();

    sort_lots(data, items, query.sort, query.direction)
}

pub fn sort_lots(
    data: &InventoryData,
    mut items: Vec<WarehouseLot>,
    field: LotSortField,
    direction: SortDirection,
) -> Vec<WarehouseLot> {
    items.sort_by(|a, b| {
        let ordering = match field {
            LotSortField::Name => data
                .material_name(&a.code)
                .to_lowercase()
                .cmp(&data.material_name(&b.code).to_lowercase()),
            LotSortField::Quantity => a.quantity.cmp(&b.quantity),
            LotSortField::ExpiryDate => a.expiry_date.cmp(&b.expiry_date),
            LotSortField::Notes => a.notes.to_lowercase().cmp(&b.notes.to_lowercase()),
            LotSortField::Code => a.code.to_lowercase().cmp(&b.code.to_lowercase()),
        };
        direction.apply(ordering)
    });
    items
}

pub fn expiry_years(data: &InventoryData) -> Vec<i32> {
    data.warehouse
        .iter()
        .map(|lot| lot.expiry_date.year())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogMaterial {
    pub id: i64,
    #[serde(rename = "nome_materiale", alias = "name", default)]
    pub name: String,
    #[serde(rename = "categoria", alias = "category", default)]
    pub category: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub min_qty: Option<u32>,
    #[serde(default)]
    pub max_qty: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSortKey {
    #[default]
    Id,
    Name,
    Category,
    MaxQty,
    MinQty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogQuery {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub sort: CatalogSortKey,
    pub direction: SortDirection,
    pub page: usize,
    pub size: usize,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            category: None,
            sort: CatalogSortKey::Id,
            direction: SortDirection::Desc,
            page: 1,
            size: 10,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total: usize,
    pub pages: usize,
}

pub fn paginate<T>(items: Vec<T>, page: usize, size: usize) -> Page<T> {
    let size = size.max(1);
    let page = page.max(1);
    let total = items.len();
    let pages = total.div_ceil(size);
    let items = items
        .into_iter()
        .skip((page - 1).saturating_mul(size))
        .take(size)
        .collect();
    Page {
        items,
        page,
        size,
        total,
        pages,
    }
}

fn cmp_optional(a: Option<u32>, b: Option<u32>) -> Ordering {
    // missing values sort lowest
    a.cmp(&b)
}

pub fn query_catalog(materials: &[CatalogMaterial], query: &CatalogQuery) -> Page<CatalogMaterial> {
    let name = needle(&query.name);
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty());

    let mut filtered: Vec<CatalogMaterial> = materials
        .iter()
        .filter(|m| query.id.is_none_or(|id| m.id == id))
        .filter(|m| contains_ci(&m.name, &name))
        .filter(|m| category.is_none_or(|c| m.category.as_deref() == Some(c)))
        .cloned()
        .collect();

    filtered.sort_by(|a, b| {
        let ordering = match query.sort {
            CatalogSortKey::Id => a.id.cmp(&b.id),
            CatalogSortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            CatalogSortKey::Category => a
                .category
                .as_deref()
                .unwrap_or("")
                .to_lowercase()
                .cmp(&b.category.as_deref().unwrap_or("").to_lowercase()),
            CatalogSortKey::MaxQty => cmp_optional(a.max_qty, b.max_qty),
            CatalogSortKey::MinQty => cmp_optional(a.min_qty, b.min_qty),
        };
        query.direction.apply(ordering)
    });

    paginate(filtered, query.page, query.size)
}
