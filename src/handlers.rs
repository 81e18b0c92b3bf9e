use crate::alerts::{build_dashboard, Dashboard};
use crate::audit::{add_user, delete_user, log_audit, update_user};
use crate::backend::GeneratedOrder;
use crate::errors::{AppError, InventoryError};
use crate::inventory::{
    add_kit, add_kit_item, add_warehouse_lot, adjust_kit_quantity, delete_kit,
    delete_warehouse_lot, kit_status, remove_kit_item_expiry_date, update_kit,
    update_warehouse_lot, AdjustOutcome, Adjustment,
};
use crate::materials::{material_update, new_material, MaterialRequest};
use crate::models::{
    AdjustRequest, AuditEntry, GeneralSettings, HealthResponse, Kit, KitItem, KitView, LotRequest,
    InventoryData, NewKitItemRequest, NewKitRequest, NotifyRequest, ReportRecord, ReportRequest,
    SettingsBulkRequest, UpdateKitRequest, User, UserRequest, WarehouseLot,
};
use crate::notify::{build_digest, format_body, prepare_notification, NotificationKind};
use crate::orders::{build_order, OrderRequest};
use crate::query::{expiry_years, list_lots, query_catalog, CatalogMaterial, CatalogQuery, LotQuery, Page};
use crate::report::{build_report, delete_report as remove_report, record_report};
use crate::settings::{self, SettingItem};
use crate::state::AppState;
use crate::storage::persist_data;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    Json,
};
use chrono::{Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

pub async fn get_dashboard(State(state): State<AppState>) -> Json<Dashboard> {
    let data = state.data.lock().await;
    Json(build_dashboard(&data))
}

pub async fn list_warehouse(
    State(state): State<AppState>,
    Query(query): Query<LotQuery>,
) -> Json<Vec<WarehouseLot>> {
    let data = state.data.lock().await;
    Json(list_lots(&data, &query, today()))
}

pub async fn warehouse_years(State(state): State<AppState>) -> Json<Vec<i32>> {
    let data = state.data.lock().await;
    Json(expiry_years(&data))
}

pub async fn create_lot(
    State(state): State<AppState>,
    Json(payload): Json<LotRequest>,
) -> Result<(StatusCode, Json<WarehouseLot>), AppError> {
    let mut data = state.data.lock().await;
    let lot = add_warehouse_lot(&mut data, payload)?;
    log_audit(
        &mut data,
        "add_warehouse_item",
        &lot.id,
        json!({ "code": lot.code, "quantity": lot.quantity }),
    );
    persist_data(&state.data_path, &data).await?;
    Ok((StatusCode::CREATED, Json(lot)))
}

pub async fn edit_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<String>,
    Json(payload): Json<LotRequest>,
) -> Result<Json<WarehouseLot>, AppError> {
    let mut data = state.data.lock().await;
    let lot = update_warehouse_lot(&mut data, &lot_id, payload)?;
    log_audit(
        &mut data,
        "edit_warehouse_item",
        &lot.id,
        json!({ "code": lot.code, "quantity": lot.quantity }),
    );
    persist_data(&state.data_path, &data).await?;
    Ok(Json(lot))
}

pub async fn remove_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut data = state.data.lock().await;
    delete_warehouse_lot(&mut data, &lot_id)?;
    log_audit(&mut data, "delete_warehouse_item", &lot_id, Value::Null);
    persist_data(&state.data_path, &data).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_kits(State(state): State<AppState>) -> Json<Vec<KitView>> {
    let data = state.data.lock().await;
    let kits = data
        .kits
        .iter()
        .map(|kit| KitView {
            status: kit_status(kit),
            kit: kit.clone(),
        })
        .collect();
    Json(kits)
}

pub async fn create_kit(
    State(state): State<AppState>,
    Json(payload): Json<NewKitRequest>,
) -> Result<(StatusCode, Json<Kit>), AppError> {
    let mut data = state.data.lock().await;
    let kit = add_kit(&mut data, payload)?;
    log_audit(
        &mut data,
        "add_kit",
        &kit.id,
        json!({ "name": kit.name, "standard": kit.is_standard }),
    );
    persist_data(&state.data_path, &data).await?;
    info!(kit_id = %kit.id, name = %kit.name, "kit created");
    Ok((StatusCode::CREATED, Json(kit)))
}

pub async fn edit_kit(
    State(state): State<AppState>,
    Path(kit_id): Path<String>,
    Json(payload): Json<UpdateKitRequest>,
) -> Result<Json<Kit>, AppError> {
    let mut data = state.data.lock().await;
    let kit = update_kit(&mut data, &kit_id, payload)?;
    log_audit(
        &mut data,
        "edit_kit",
        &kit.id,
        json!({ "name": kit.name, "location": kit.location }),
    );
    persist_data(&state.data_path, &data).await?;
    Ok(Json(kit))
}

pub async fn remove_kit(
    State(state): State<AppState>,
    Path(kit_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut data = state.data.lock().await;
    let kit = delete_kit(&mut data, &kit_id)?;
    log_audit(&mut data, "delete_kit", &kit_id, json!({ "name": kit.name }));
    persist_data(&state.data_path, &data).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_kit_item(
    State(state): State<AppState>,
    Path(kit_id): Path<String>,
    Json(payload): Json<NewKitItemRequest>,
) -> Result<(StatusCode, Json<KitItem>), AppError> {
    let mut data = state.data.lock().await;
    let item = add_kit_item(&mut data, &kit_id, payload)?;
    log_audit(
        &mut data,
        "add_kit_item",
        &kit_id,
        json!({ "code": item.code, "max_quantity": item.max_quantity }),
    );
    persist_data(&state.data_path, &data).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn adjust_item(
    State(state): State<AppState>,
    Path((kit_id, code)): Path<(String, String)>,
    Json(payload): Json<AdjustRequest>,
) -> Result<Json<Adjustment>, AppError> {
    let mut data = state.data.lock().await;
    let adjustment = adjust_kit_quantity(&mut data, &kit_id, &code, payload.delta, today())?;
    // rejected and zero deltas leave nothing to record
    if matches!(
        adjustment.outcome,
        AdjustOutcome::Applied | AdjustOutcome::Shortfall
    ) {
        log_audit(
            &mut data,
            "adjust_kit_item",
            &kit_id,
            json!({
                "code": code,
                "requested": adjustment.requested,
                "applied": adjustment.applied,
            }),
        );
        persist_data(&state.data_path, &data).await?;
    }
    Ok(Json(adjustment))
}

#[derive(Debug, Serialize)]
pub struct ExpiryRemoval {
    pub removed: bool,
}

pub async fn remove_expiry(
    State(state): State<AppState>,
    Path((kit_id, code, index)): Path<(String, String, usize)>,
) -> Result<Json<ExpiryRemoval>, AppError> {
    let mut data = state.data.lock().await;
    let removed = remove_kit_item_expiry_date(&mut data, &kit_id, &code, index)?;
    if removed {
        log_audit(
            &mut data,
            "remove_expiry_date",
            &kit_id,
            json!({ "code": code, "index": index }),
        );
        persist_data(&state.data_path, &data).await?;
    }
    Ok(Json(ExpiryRemoval { removed }))
}

pub async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    let data = state.data.lock().await;
    Json(data.users.clone())
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<UserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let mut data = state.data.lock().await;
    let user = add_user(&mut data, payload)?;
    persist_data(&state.data_path, &data).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn edit_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<User>, AppError> {
    let mut data = state.data.lock().await;
    let user = update_user(&mut data, &user_id, payload)?;
    persist_data(&state.data_path, &data).await?;
    Ok(Json(user))
}

pub async fn remove_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut data = state.data.lock().await;
    delete_user(&mut data, &user_id)?;
    persist_data(&state.data_path, &data).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_audit(State(state): State<AppState>) -> Json<Vec<AuditEntry>> {
    let data = state.data.lock().await;
    Json(data.audit_log.iter().rev().cloned().collect())
}

pub async fn get_general_settings(State(state): State<AppState>) -> Json<GeneralSettings> {
    let data = state.data.lock().await;
    Json(data.settings.clone())
}

pub async fn put_general_settings(
    State(state): State<AppState>,
    Json(payload): Json<GeneralSettings>,
) -> Result<Json<GeneralSettings>, AppError> {
    let mut data = state.data.lock().await;
    if let Some(operator) = payload.default_operator.as_deref() {
        if data.user(operator).is_none() {
            return Err(InventoryError::UserNotFound(operator.to_string()).into());
        }
    }
    data.settings = payload;
    persist_data(&state.data_path, &data).await?;
    Ok(Json(data.settings.clone()))
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsKey {
    pub key: Option<String>,
    pub default: Option<String>,
}

pub async fn get_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingsKey>,
) -> Result<Json<Value>, AppError> {
    let data = state.data.lock().await;
    let Some(key) = query.key.as_deref().map(str::trim).filter(|key| !key.is_empty()) else {
        return Ok(Json(Value::Object(data.app_settings.clone())));
    };
    match query.default {
        Some(raw) => {
            // a default that is not valid JSON is taken as a plain string
            let fallback = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            Ok(Json(settings::get_or(&data.app_settings, key, &fallback).clone()))
        }
        None => settings::get(&data.app_settings, key)
            .cloned()
            .map(Json)
            .ok_or_else(|| AppError::not_found(format!("setting '{key}' not found"))),
    }
}

#[derive(Debug, Serialize)]
pub struct SettingsSaved {
    pub settings: Map<String, Value>,
    pub local_only: bool,
}

pub async fn patch_settings(
    State(state): State<AppState>,
    Json(payload): Json<SettingsBulkRequest>,
) -> Result<Json<SettingsSaved>, AppError> {
    let mut items = payload.items;
    items.extend(settings::flatten(&payload.values));
    if items.is_empty() {
        return Err(AppError::bad_request("no settings to save"));
    }
    if items.iter().any(|item| item.key.trim().is_empty()) {
        return Err(AppError::bad_request("setting keys cannot be empty"));
    }

    let saved = state.backend.save_settings_bulk(&items).await;
    let mut data = state.data.lock().await;
    let local_only = match saved {
        Ok(items) => {
            apply_items(&mut data.app_settings, &items);
            false
        }
        Err(err) => {
            warn!(%err, "backend settings save failed, keeping local copy");
            apply_items(&mut data.app_settings, &items);
            true
        }
    };
    persist_data(&state.data_path, &data).await?;
    Ok(Json(SettingsSaved {
        settings: data.app_settings.clone(),
        local_only,
    }))
}

fn apply_items(root: &mut Map<String, Value>, items: &[SettingItem]) {
    for item in items {
        settings::set(root, &item.key, item.value.clone());
    }
}

pub async fn sync_settings(
    State(state): State<AppState>,
) -> Result<Json<Map<String, Value>>, AppError> {
    let items = state.backend.load_settings().await?;
    let mut data = state.data.lock().await;
    data.app_settings = settings::unflatten(&items);
    persist_data(&state.data_path, &data).await?;
    info!(count = items.len(), "settings synchronised from backend");
    Ok(Json(data.app_settings.clone()))
}

pub async fn export_settings(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(state.backend.export_settings().await?))
}

pub async fn import_settings(
    State(state): State<AppState>,
    Json(document): Json<Value>,
) -> Result<Json<Map<String, Value>>, AppError> {
    if !document.is_object() {
        return Err(AppError::bad_request("settings document must be a JSON object"));
    }
    let items = state.backend.import_settings(&document).await?;
    let mut data = state.data.lock().await;
    data.app_settings = settings::unflatten(&items);
    persist_data(&state.data_path, &data).await?;
    info!(count = items.len(), "settings imported");
    Ok(Json(data.app_settings.clone()))
}

pub async fn list_materials(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Json<Page<CatalogMaterial>> {
    let materials = state.backend.load_materials().await;
    Json(query_catalog(&materials, &query))
}

pub async fn create_material(
    State(state): State<AppState>,
    Json(payload): Json<MaterialRequest>,
) -> Result<(StatusCode, Json<CatalogMaterial>), AppError> {
    let existing = if payload.id.is_some() {
        state.backend.load_materials().await
    } else {
        Vec::new()
    };
    let body = new_material(&payload, &existing)?;
    let created = state.backend.create_material(&body).await?;
    let mut data = state.data.lock().await;
    log_audit(
        &mut data,
        "add_material",
        &created.id.to_string(),
        json!({ "name": created.name }),
    );
    persist_data(&state.data_path, &data).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn edit_material(
    State(state): State<AppState>,
    Path(material_id): Path<i64>,
    Json(payload): Json<MaterialRequest>,
) -> Result<Json<CatalogMaterial>, AppError> {
    let body = material_update(&payload)?;
    let updated = state.backend.update_material(material_id, &body).await?;
    let mut data = state.data.lock().await;
    log_audit(
        &mut data,
        "edit_material",
        &material_id.to_string(),
        json!({ "name": updated.name }),
    );
    persist_data(&state.data_path, &data).await?;
    Ok(Json(updated))
}

pub async fn remove_material(
    State(state): State<AppState>,
    Path(material_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.backend.delete_material(material_id).await?;
    let mut data = state.data.lock().await;
    log_audit(&mut data, "delete_material", &material_id.to_string(), Value::Null);
    persist_data(&state.data_path, &data).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct OrderGenerated {
    pub item_count: usize,
    #[serde(flatten)]
    pub document: GeneratedOrder,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<OrderRequest>,
) -> Result<(StatusCode, Json<OrderGenerated>), AppError> {
    let order = {
        let data = state.data.lock().await;
        build_order(&data, &payload, today())?
    };
    let document = state.backend.generate_order_pdf(&order).await?;
    info!(items = order.items.len(), city = %order.city, "order document generated");
    Ok((
        StatusCode::CREATED,
        Json(OrderGenerated {
            item_count: order.items.len(),
            document,
        }),
    ))
}

pub async fn export_data(
    State(state): State<AppState>,
) -> ([(header::HeaderName, String); 1], Json<InventoryData>) {
    let data = state.data.lock().await;
    let disposition = format!(
        "attachment; filename=\"first-aid-data-{}.json\"",
        today().format("%Y-%m-%d")
    );
    ([(header::CONTENT_DISPOSITION, disposition)], Json(data.clone()))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetQuery {
    #[serde(default)]
    pub confirm: bool,
}

pub async fn reset_data(
    State(state): State<AppState>,
    Query(query): Query<ResetQuery>,
) -> Result<StatusCode, AppError> {
    if !query.confirm {
        return Err(AppError::bad_request("pass confirm=true to erase all data"));
    }
    let mut data = state.data.lock().await;
    *data = InventoryData::default();
    persist_data(&state.data_path, &data).await?;
    warn!("all inventory data erased");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct NotificationSent {
    pub to: String,
    pub subject: String,
}

async fn notify(
    state: &AppState,
    kind: NotificationKind,
    payload: NotifyRequest,
) -> Result<Json<NotificationSent>, AppError> {
    let email = {
        let mut data = state.data.lock().await;
        let email = prepare_notification(
            &mut data,
            kind,
            &payload,
            state.config.reply_to.clone(),
            today(),
        )?;
        persist_data(&state.data_path, &data).await?;
        email
    };
    state.backend.send_email(&email).await?;
    Ok(Json(NotificationSent {
        to: email.to,
        subject: email.subject,
    }))
}

pub async fn notify_expiring(
    State(state): State<AppState>,
    Json(payload): Json<NotifyRequest>,
) -> Result<Json<NotificationSent>, AppError> {
    notify(&state, NotificationKind::Expiring, payload).await
}

pub async fn notify_zero_quantity(
    State(state): State<AppState>,
    Json(payload): Json<NotifyRequest>,
) -> Result<Json<NotificationSent>, AppError> {
    notify(&state, NotificationKind::ZeroQuantity, payload).await
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct NotificationPreview {
    pub kind: NotificationKind,
    pub total_count: usize,
    pub body: String,
}

pub async fn preview_notification(
    State(state): State<AppState>,
    Path(kind): Path<NotificationKind>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<NotificationPreview>, AppError> {
    let today = today();
    let month = query.month.unwrap_or_else(|| today.month());
    if !(1..=12).contains(&month) {
        return Err(AppError::bad_request("month must be between 1 and 12"));
    }
    let year = query.year.unwrap_or_else(|| today.year());
    let data = state.data.lock().await;
    let digest = build_digest(&data, kind, month, year);
    Ok(Json(NotificationPreview {
        kind,
        total_count: digest.total_count,
        body: format_body(&digest, &data.settings, today),
    }))
}

#[derive(Debug, Serialize)]
pub struct ReportGenerated {
    pub record: ReportRecord,
    pub warnings: Vec<String>,
}

pub async fn generate_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportRequest>,
) -> Result<(StatusCode, Json<ReportGenerated>), AppError> {
    let draft = {
        let data = state.data.lock().await;
        build_report(&data, &payload, today())
    };
    if draft.payload.kits.is_empty() {
        return Err(InventoryError::Invalid("select at least one kit".to_string()).into());
    }
    if !payload.force && !draft.issues.is_empty() {
        return Err(InventoryError::QualityCheck(draft.issues).into());
    }

    let generated = state.backend.generate_report(&draft.payload).await?;
    for warning in &generated.warnings {
        warn!(%warning, "report generator warning");
    }

    let mut data = state.data.lock().await;
    let record = record_report(&mut data, &draft, generated.download_url);
    persist_data(&state.data_path, &data).await?;
    info!(report_id = %record.id, kits = record.kit_count, "report generated");
    Ok((
        StatusCode::CREATED,
        Json(ReportGenerated {
            record,
            warnings: generated.warnings,
        }),
    ))
}

pub async fn list_reports(State(state): State<AppState>) -> Json<Vec<ReportRecord>> {
    let data = state.data.lock().await;
    Json(data.reports_history.clone())
}

pub async fn delete_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut data = state.data.lock().await;
    remove_report(&mut data, &report_id)?;
    persist_data(&state.data_path, &data).await?;
    Ok(StatusCode::NO_CONTENT)
}
