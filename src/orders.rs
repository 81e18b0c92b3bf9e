use crate::alerts::{expiring_items, zero_quantity_items};
use crate::errors::InventoryError;
use crate::models::InventoryData;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const WAREHOUSE_LOCATION: &str = "Warehouse";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderFilter {
    Expiring,
    Zero,
    #[default]
    Both,
}

impl OrderFilter {
    fn expiring(self) -> bool {
        matches!(self, Self::Expiring | Self::Both)
    }

    fn zero(self) -> bool {
        matches!(self, Self::Zero | Self::Both)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub operator_id: Option<String>,
    #[serde(default)]
    pub filter: OrderFilter,
    #[serde(default = "default_true")]
    pub use_min_qty: bool,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderReason {
    #[serde(rename = "scadenza")]
    Expiring,
    #[serde(rename = "quantita_zero")]
    ZeroQuantity,
    #[serde(rename = "entrambi")]
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub code: String,
    pub name: String,
    pub location: String,
    pub expiry_date: String,
    pub reorder_qty: u32,
    #[serde(rename = "type")]
    pub reason: OrderReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub city: String,
    pub date: String,
    pub operator_name: String,
    pub items: Vec<OrderItem>,
}

fn min_qty(data: &InventoryData, code: &str) -> Option<u32> {
    data.materials
        .iter()
        .find(|material| material.code == code)
        .and_then(|material| material.min_qty)
}

pub fn order_items(data: &InventoryData, request: &OrderRequest, today: NaiveDate) -> Vec<OrderItem> {
    let month = request.month.unwrap_or_else(|| today.month());
    let year = request.year.unwrap_or_else(|| today.year());
    let reorder = |code: &str, fallback: u32| {
        if request.use_min_qty {
            min_qty(data, code).unwrap_or(0)
        } else {
            fallback
        }
    };

    let mut candidates = Vec::new();
    if request.filter.expiring() {
        for item in expiring_items(data, month, year) {
            candidates.push(OrderItem {
                reorder_qty: reorder(&item.code, item.quantity),
                code: item.code,
                name: item.name,
                location: WAREHOUSE_LOCATION.to_string(),
                expiry_date: item.expiry_date.format("%d/%m/%Y").to_string(),
                reason: OrderReason::Expiring,
            });
        }
    }
    if request.filter.zero() {
        for item in zero_quantity_items(data) {
            candidates.push(OrderItem {
                reorder_qty: reorder(&item.code, 0),
                code: item.code,
                name: item.name,
                location: item.location,
                expiry_date: String::new(),
                reason: OrderReason::ZeroQuantity,
            });
        }
    }

    let mut merged: Vec<OrderItem> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    for item in candidates {
        let key = (item.code.clone(), item.location.clone());
        match index.get(&key) {
            Some(&at) => {
                let existing = &mut merged[at];
                if existing.reason != item.reason {
                    existing.reason = OrderReason::Both;
                }
                existing.reorder_qty = existing.reorder_qty.max(item.reorder_qty);
                if existing.expiry_date.is_empty() {
                    existing.expiry_date = item.expiry_date;
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(item);
            }
        }
    }
    merged
}

pub fn build_order(
    data: &InventoryData,
    request: &OrderRequest,
    today: NaiveDate,
) -> Result<OrderPayload, InventoryError> {
    let city = request
        .city
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| data.settings.default_location.trim().to_string());
    let operator = request
        .operator_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .or(data.settings.default_operator.as_deref())
        .and_then(|id| data.user(id));
    let items = order_items(data, request, today);

    let mut problems = Vec::new();
    if operator.is_none() {
        problems.push("select the operator placing the order");
    }
    if city.is_empty() {
        problems.push("enter the city for the order");
    }
    if items.is_empty() {
        problems.push("no items to order for the selected filter");
    }
    if !problems.is_empty() {
        return Err(InventoryError::Invalid(problems.join("; ")));
    }

    Ok(OrderPayload {
        city,
        date: today.format("%d/%m/%Y").to_string(),
        operator_name: operator.map(|user| user.full_name()).unwrap_or_default(),
        items,
    })
}
