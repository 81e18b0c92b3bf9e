use crate::inventory::{is_expired, kit_status, KitStatus};
use crate::models::InventoryData;
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpiringItem {
    pub code: String,
    pub name: String,
    pub expiry_date: NaiveDate,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissingItem {
    pub code: String,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Serialize, Default, PartialEq, Eq)]
pub struct KitStatusCounts {
    pub empty: usize,
    pub partial: usize,
    pub complete: usize,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub date: NaiveDate,
    pub expiring_this_month: Vec<ExpiringItem>,
    pub zero_quantity: Vec<MissingItem>,
    pub expired: Vec<ExpiringItem>,
    pub kits: KitStatusCounts,
}

pub fn expiring_items(data: &InventoryData, month: u32, year: i32) -> Vec<ExpiringItem> {
    let in_month = |date: NaiveDate| date.month() == month && date.year() == year;
    let mut items = Vec::new();

    for lot in data.warehouse.iter().filter(|lot| in_month(lot.expiry_date)) {
        items.push(ExpiringItem {
            code: lot.code.clone(),
            name: data.material_name(&lot.code),
            expiry_date: lot.expiry_date,
            quantity: lot.quantity,
        });
    }

    for kit in &data.kits {
        for item in &kit.items {
            for date in item.expiry_dates.iter().copied().filter(|d| in_month(*d)) {
                items.push(ExpiringItem {
                    code: item.code.clone(),
                    name: data.material_name(&item.code),
                    expiry_date: date,
                    quantity: item.current_quantity,
                });
            }
        }
    }

    items
}

pub fn zero_quantity_items(data: &InventoryData) -> Vec<MissingItem> {
    let mut items = Vec::new();

    for material in &data.materials {
        let first_lot = data.warehouse.iter().find(|lot| lot.code == material.code);
        if first_lot.is_none_or(|lot| lot.quantity == 0) {
            items.push(MissingItem {
                code: material.code.clone(),
                name: material.name.clone(),
                location: "Warehouse".to_string(),
            });
        }
    }

    for kit in &data.kits {
        for item in kit.items.iter().filter(|item| item.current_quantity == 0) {
            items.push(MissingItem {
                code: item.code.clone(),
                name: data.material_name(&item.code),
                location: format!("Kit: {}", kit.name),
            });
        }
    }

    items
}

pub fn expired_items(data: &InventoryData, today: NaiveDate) -> Vec<ExpiringItem> {
    data.warehouse
        .iter()
        .filter(|lot| is_expired(lot.expiry_date, today))
        .map(|lot| ExpiringItem {
            code: lot.code.clone(),
            name: data.material_name(&lot.code),
            expiry_date: lot.expiry_date,
            quantity: lot.quantity,
        })
        .collect()
}

pub fn build_dashboard(data: &InventoryData) -> Dashboard {
    build_dashboard_at(Local::now().date_naive(), data)
}

pub fn build_dashboard_at(today: NaiveDate, data: &InventoryData) -> Dashboard {
    let mut kits = KitStatusCounts::default();
    for kit in &data.kits {
        match kit_status(kit) {
            KitStatus::Empty => kits.empty += 1,
            KitStatus::Partial => kits.partial += 1,
            KitStatus::Complete => kits.complete += 1,
        }
    }

    Dashboard {
        date: today,
        expiring_this_month: expiring_items(data, today.month(), today.year()),
        zero_quantity: zero_quantity_items(data),
        expired: expired_items(data, today),
        kits,
    }
}
