use crate::errors::InventoryError;
use crate::inventory::is_expired;
use crate::models::{generate_id, InventoryData, Kit, ReportRecord, ReportRequest};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const FALLBACK_LOCATION: &str = "Uffici";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ItemCondition {
    #[serde(rename = "idoneo")]
    Compliant,
    #[serde(rename = "scaduto")]
    Expired,
    #[serde(rename = "da_controllare")]
    NeedsCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportLine {
    #[serde(rename = "codice")]
    pub code: String,
    #[serde(rename = "descrizione")]
    pub description: String,
    #[serde(rename = "quantita")]
    pub quantity: u32,
    #[serde(rename = "scadenza")]
    pub expiry: String,
    #[serde(rename = "stato")]
    pub condition: ItemCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportKit {
    #[serde(rename = "codice")]
    pub code: String,
    #[serde(rename = "ubicazione")]
    pub location: String,
    #[serde(rename = "articoli")]
    pub lines: Vec<ReportLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    #[serde(rename = "operatore")]
    pub operator: String,
    pub operator_signature: Option<String>,
    pub date_long_format: bool,
    pub threshold_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_path: Option<String>,
    pub kits: Vec<ReportKit>,
    pub location: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportDraft {
    pub payload: ReportPayload,
    pub operator_id: Option<String>,
    pub kit_ids: Vec<String>,
    pub issues: Vec<String>,
}

fn report_line(data: &InventoryData, item: &crate::models::KitItem, today: NaiveDate) -> ReportLine {
    let expiry = item
        .expiry_dates
        .iter()
        .min()
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    let condition = if item.expiry_dates.iter().any(|d| is_expired(*d, today)) {
        ItemCondition::Expired
    } else if item.current_quantity == item.max_quantity {
        ItemCondition::Compliant
    } else {
        ItemCondition::NeedsCheck
    };
    ReportLine {
        code: item.code.clone(),
        description: data.material_name(&item.code),
        quantity: item.current_quantity,
        expiry,
        condition,
    }
}

fn report_kit(data: &InventoryData, kit: &Kit, location: &str, today: NaiveDate) -> ReportKit {
    ReportKit {
        code: kit.id.clone(),
        location: if kit.location.is_empty() {
            location.to_string()
        } else {
            kit.location.clone()
        },
        lines: kit
            .items
            .iter()
            .map(|item| report_line(data, item, today))
            .collect(),
    }
}

pub fn build_report(data: &InventoryData, request: &ReportRequest, today: NaiveDate) -> ReportDraft {
    let location = request
        .location
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .or_else(|| {
            Some(data.settings.default_location.trim().to_string()).filter(|text| !text.is_empty())
        })
        .unwrap_or_else(|| FALLBACK_LOCATION.to_string());

    let operator_id = request
        .operator_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| data.settings.default_operator.clone())
        .or_else(|| data.users.first().map(|user| user.id.clone()));
    let operator = operator_id.as_deref().and_then(|id| data.user(id));

    let kit_ids: Vec<String> = if request.kit_ids.is_empty() {
        data.kits.iter().map(|kit| kit.id.clone()).collect()
    } else {
        request.kit_ids.clone()
    };

    let kits: Vec<ReportKit> = kit_ids
        .iter()
        .filter_map(|id| data.kit(id))
        .map(|kit| report_kit(data, kit, &location, today))
        .collect();

    let payload = ReportPayload {
        operator: operator.map(|user| user.full_name()).unwrap_or_default(),
        operator_signature: operator.and_then(|user| user.signature.clone()),
        date_long_format: data.settings.date_long_format,
        threshold_days: data.settings.threshold_days,
        logo_path: data.settings.logo_path.clone(),
        kits,
        location,
    };
    let issues = quality_issues(&payload, operator.is_some(), data.settings.show_signatures);

    ReportDraft {
        payload,
        operator_id,
        kit_ids,
        issues,
    }
}

pub fn quality_issues(payload: &ReportPayload, has_operator: bool, show_signatures: bool) -> Vec<String> {
    let mut issues = Vec::new();
    if payload.location.chars().count() < 2 {
        issues.push("location is missing or too short".to_string());
    }
    if payload.operator.trim().is_empty() {
        issues.push("operator name is missing or the operator is unknown".to_string());
    }
    if show_signatures && has_operator && payload.operator_signature.is_none() {
        issues.push("operator signature is missing".to_string());
    }
    if payload.kits.is_empty() {
        issues.push("no kits in the report".to_string());
    }
    issues
}

pub fn record_report(
    data: &mut InventoryData,
    draft: &ReportDraft,
    download_url: Option<String>,
) -> ReportRecord {
    let kits: Vec<String> = data
        .kits
        .iter()
        .filter(|kit| draft.kit_ids.contains(&kit.id))
        .map(|kit| kit.name.clone())
        .collect();
    let record = ReportRecord {
        id: generate_id(),
        date: Utc::now(),
        location: draft.payload.location.clone(),
        operator: draft.payload.operator.clone(),
        kit_count: kits.len(),
        kits,
        download_url,
    };
    data.reports_history.insert(0, record.clone());
    record
}

pub fn delete_report(data: &mut InventoryData, report_id: &str) -> Result<(), InventoryError> {
    let idx = data
        .reports_history
        .iter()
        .position(|record| record.id == report_id)
        .ok_or_else(|| InventoryError::ReportNotFound(report_id.to_string()))?;
    data.reports_history.remove(idx);
    Ok(())
}
