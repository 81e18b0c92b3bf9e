use crate::errors::InventoryError;
use crate::models::{
    generate_id, InventoryData, Kit, KitItem, KitType, LotRequest, Material, NewKitItemRequest,
    NewKitRequest, StandardItem, UpdateKitRequest, WarehouseLot,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

const STANDARD_FALLBACK: &[(&str, &str, u32)] = &[
    ("garze-sterili", "Garze sterili", 10),
    ("bende-elastiche", "Bende elastiche", 4),
    ("cerotti-medicazione", "Cerotti di medicazione", 10),
    ("cerotti", "Cerotti", 20),
    ("disinfettante", "Disinfettante", 1),
    ("forbici", "Forbici", 1),
    ("pinzette", "Pinzette", 1),
    ("ghiaccio-istantaneo", "Ghiaccio istantaneo", 2),
    ("coperta-isotermica", "Coperta isotermica", 1),
    ("triangolo-di-tessuto", "Triangolo di tessuto", 2),
    ("guanti-nitrile", "Guanti in nitrile", 4),
    ("mascherine", "Mascherine", 2),
];

// a lot is no longer usable on its expiry day
pub fn is_expired(date: NaiveDate, today: NaiveDate) -> bool {
    date <= today
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdjustOutcome {
    Applied,
    Shortfall,
    Rejected,
    Unchanged,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Adjustment {
    pub kit_id: String,
    pub code: String,
    pub requested: i64,
    pub applied: i64,
    pub current_quantity: u32,
    pub outcome: AdjustOutcome,
}

impl Adjustment {
    pub fn shortfall(&self) -> i64 {
        self.requested - self.applied
    }
}

pub fn adjust_kit_quantity(
    data: &mut InventoryData,
    kit_id: &str,
    code: &str,
    delta: i64,
    today: NaiveDate,
) -> Result<Adjustment, InventoryError> {
    let (kit_idx, item_idx) = locate_item(data, kit_id, code)?;
    let item = &data.kits[kit_idx].items[item_idx];
    let target = i64::from(item.current_quantity).checked_add(delta);

    let mut result = Adjustment {
        kit_id: kit_id.to_string(),
        code: code.to_string(),
        requested: delta,
        applied: 0,
        current_quantity: item.current_quantity,
        outcome: AdjustOutcome::Unchanged,
    };

    let in_bounds = target.is_some_and(|target| (0..=i64::from(item.max_quantity)).contains(&target));
    if !in_bounds {
        debug!(kit_id, code, delta, "adjustment outside kit bounds ignored");
        result.outcome = AdjustOutcome::Rejected;
        return Ok(result);
    }
    if delta == 0 {
        return Ok(result);
    }

    if delta > 0 {
        // bounded by max_quantity, so the conversion cannot truncate
        let wanted = u32::try_from(delta).unwrap_or(u32::MAX);
        let drawn = draw_fifo(&mut data.warehouse, code, wanted, today);
        let taken = u32::try_from(drawn.len()).unwrap_or(u32::MAX);

        let item = &mut data.kits[kit_idx].items[item_idx];
        item.expiry_dates.extend(drawn);
        item.current_quantity += taken;

        result.applied = i64::from(taken);
        result.current_quantity = item.current_quantity;
        result.outcome = if taken < wanted {
            warn!(
                kit_id,
                code,
                requested = wanted,
                available = taken,
                "warehouse could not cover the full withdrawal"
            );
            AdjustOutcome::Shortfall
        } else {
            AdjustOutcome::Applied
        };
    } else {
        let returned = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
        let item = &mut data.kits[kit_idx].items[item_idx];
        item.current_quantity -= returned;
        let drop_count = (returned as usize).min(item.expiry_dates.len());
        item.expiry_dates.drain(..drop_count);

        result.applied = delta;
        result.current_quantity = item.current_quantity;
        result.outcome = AdjustOutcome::Applied;
    }

    Ok(result)
}

fn draw_fifo(
    warehouse: &mut Vec<WarehouseLot>,
    code: &str,
    wanted: u32,
    today: NaiveDate,
) -> Vec<NaiveDate> {
    let mut order: Vec<usize> = warehouse
        .iter()
        .enumerate()
        .filter(|(_, lot)| lot.code == code && !is_expired(lot.expiry_date, today))
        .map(|(idx, _)| idx)
        .collect();
    // stable: equal expiry dates keep insertion order
    order.sort_by_key(|&idx| warehouse[idx].expiry_date);

    let mut remaining = wanted;
    let available: u32 = order
        .iter()
        .map(|&idx| warehouse[idx].quantity)
        .fold(0, u32::saturating_add);
    let mut drawn = Vec::with_capacity(available.min(wanted) as usize);
    let mut emptied = HashSet::new();

    for idx in order {
        if remaining == 0 {
            break;
        }
        let lot = &mut warehouse[idx];
        let take = lot.quantity.min(remaining);
        lot.quantity -= take;
        remaining -= take;
        drawn.extend(std::iter::repeat_n(lot.expiry_date, take as usize));
        if lot.quantity == 0 {
            emptied.insert(lot.id.clone());
        }
    }

    if !emptied.is_empty() {
        warehouse.retain(|lot| !emptied.contains(&lot.id));
    }
    drawn
}

pub fn remove_kit_item_expiry_date(
    data: &mut InventoryData,
    kit_id: &str,
    code: &str,
    index: usize,
) -> Result<bool, InventoryError> {
    let (kit_idx, item_idx) = locate_item(data, kit_id, code)?;
    let item = &mut data.kits[kit_idx].items[item_idx];
    if index >= item.expiry_dates.len() {
        return Ok(false);
    }
    item.expiry_dates.remove(index);
    item.current_quantity = item.current_quantity.saturating_sub(1);
    Ok(true)
}

fn locate_item(
    data: &InventoryData,
    kit_id: &str,
    code: &str,
) -> Result<(usize, usize), InventoryError> {
    let kit_idx = data
        .kits
        .iter()
        .position(|kit| kit.id == kit_id)
        .ok_or_else(|| InventoryError::KitNotFound(kit_id.to_string()))?;
    let item_idx = data.kits[kit_idx]
        .items
        .iter()
        .position(|item| item.code == code)
        .ok_or_else(|| InventoryError::ItemNotFound {
            kit_id: kit_id.to_string(),
            code: code.to_string(),
        })?;
    Ok((kit_idx, item_idx))
}

fn validate_lot(request: &LotRequest) -> Result<NaiveDate, InventoryError> {
    match request.expiry_date {
        Some(date) if !request.code.trim().is_empty() && request.quantity > 0 => Ok(date),
        _ => Err(InventoryError::Invalid(
            "code, quantity and expiry date are required".to_string(),
        )),
    }
}

pub fn add_warehouse_lot(
    data: &mut InventoryData,
    request: LotRequest,
) -> Result<WarehouseLot, InventoryError> {
    let expiry_date = validate_lot(&request)?;
    let lot = WarehouseLot {
        id: generate_id(),
        code: request.code.trim().to_string(),
        quantity: request.quantity,
        expiry_date,
        notes: request.notes,
    };
    data.warehouse.push(lot.clone());
    Ok(lot)
}

pub fn update_warehouse_lot(
    data: &mut InventoryData,
    lot_id: &str,
    request: LotRequest,
) -> Result<WarehouseLot, InventoryError> {
    let expiry_date = validate_lot(&request)?;
    let lot = data
        .warehouse
        .iter_mut()
        .find(|lot| lot.id == lot_id)
        .ok_or_else(|| InventoryError::LotNotFound(lot_id.to_string()))?;
    lot.code = request.code.trim().to_string();
    lot.quantity = request.quantity;
    lot.expiry_date = expiry_date;
    lot.notes = request.notes;
    Ok(lot.clone())
}

pub fn delete_warehouse_lot(data: &mut InventoryData, lot_id: &str) -> Result<(), InventoryError> {
    let idx = data
        .warehouse
        .iter()
        .position(|lot| lot.id == lot_id)
        .ok_or_else(|| InventoryError::LotNotFound(lot_id.to_string()))?;
    data.warehouse.remove(idx);
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum KitStatus {
    Empty,
    Partial,
    Complete,
}

pub fn kit_status(kit: &Kit) -> KitStatus {
    let stocked = kit
        .items
        .iter()
        .filter(|item| item.current_quantity > 0)
        .count();
    if stocked == 0 {
        KitStatus::Empty
    } else if stocked == kit.items.len() {
        KitStatus::Complete
    } else {
        KitStatus::Partial
    }
}

pub fn standard_template(data: &mut InventoryData) -> Vec<StandardItem> {
    if !data.standard_items.is_empty() {
        return data.standard_items.clone();
    }
    for (code, name, _) in STANDARD_FALLBACK {
        match data.materials.iter_mut().find(|m| m.code == *code) {
            Some(material) => {
                if material.name.is_empty() {
                    material.name = (*name).to_string();
                }
                if !material.tags.iter().any(|tag| tag == "kit") {
                    material.tags.push("kit".to_string());
                }
            }
            None => data.materials.push(Material {
                code: (*code).to_string(),
                name: (*name).to_string(),
                category: None,
                tags: vec!["kit".to_string()],
                min_qty: None,
            }),
        }
    }
    STANDARD_FALLBACK
        .iter()
        .map(|(code, _, max_quantity)| StandardItem {
            code: (*code).to_string(),
            max_quantity: *max_quantity,
        })
        .collect()
}

fn ensure_unique_name(
    data: &InventoryData,
    name: &str,
    except_id: Option<&str>,
) -> Result<(), InventoryError> {
    let lowered = name.to_lowercase();
    let clash = data
        .kits
        .iter()
        .any(|kit| Some(kit.id.as_str()) != except_id && kit.name.to_lowercase() == lowered);
    if clash {
        return Err(InventoryError::DuplicateKitName(name.to_string()));
    }
    Ok(())
}

pub fn add_kit(data: &mut InventoryData, request: NewKitRequest) -> Result<Kit, InventoryError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(InventoryError::Invalid("kit name is required".to_string()));
    }
    ensure_unique_name(data, name, None)?;

    let is_standard = request.kit_type == KitType::Standard;
    let items = if is_standard {
        standard_template(data)
            .into_iter()
            .map(|template| KitItem::empty(template.code, template.max_quantity))
            .collect()
    } else {
        Vec::new()
    };

    let kit = Kit {
        id: generate_id(),
        name: name.to_string(),
        description: request.description.trim().to_string(),
        location: request.location.trim().to_string(),
        is_standard,
        items,
    };
    data.kits.push(kit.clone());
    data.settings.default_kit_type = request.kit_type;
    Ok(kit)
}

pub fn update_kit(
    data: &mut InventoryData,
    kit_id: &str,
    request: UpdateKitRequest,
) -> Result<Kit, InventoryError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(InventoryError::Invalid("kit name cannot be empty".to_string()));
    }
    ensure_unique_name(data, name, Some(kit_id))?;
    let kit = data
        .kits
        .iter_mut()
        .find(|kit| kit.id == kit_id)
        .ok_or_else(|| InventoryError::KitNotFound(kit_id.to_string()))?;
    kit.name = name.to_string();
    kit.location = request.location.trim().to_string();
    Ok(kit.clone())
}

pub fn delete_kit(data: &mut InventoryData, kit_id: &str) -> Result<Kit, InventoryError> {
    let idx = data
        .kits
        .iter()
        .position(|kit| kit.id == kit_id)
        .ok_or_else(|| InventoryError::KitNotFound(kit_id.to_string()))?;
    Ok(data.kits.remove(idx))
}

pub fn add_kit_item(
    data: &mut InventoryData,
    kit_id: &str,
    request: NewKitItemRequest,
) -> Result<KitItem, InventoryError> {
    let code = request.code.trim();
    if code.is_empty() {
        return Err(InventoryError::Invalid("select a material".to_string()));
    }
    if request.max_quantity == 0 {
        return Err(InventoryError::Invalid(
            "max quantity must be a positive integer".to_string(),
        ));
    }
    let kit = data
        .kits
        .iter_mut()
        .find(|kit| kit.id == kit_id)
        .ok_or_else(|| InventoryError::KitNotFound(kit_id.to_string()))?;
    if kit.items.iter().any(|item| item.code == code) {
        return Err(InventoryError::DuplicateKitItem(code.to_string()));
    }
    let mut item = KitItem::empty(code, request.max_quantity);
    item.notes = request.notes.trim().to_string();
    kit.items.push(item.clone());
    Ok(item)
}
