use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route(
            "/api/warehouse",
            get(handlers::list_warehouse).post(handlers::create_lot),
        )
        .route("/api/warehouse/years", get(handlers::warehouse_years))
        .route(
            "/api/warehouse/:id",
            put(handlers::edit_lot).delete(handlers::remove_lot),
        )
        .route(
            "/api/kits",
            get(handlers::list_kits).post(handlers::create_kit),
        )
        .route(
            "/api/kits/:id",
            put(handlers::edit_kit).delete(handlers::remove_kit),
        )
        .route("/api/kits/:id/items", post(handlers::create_kit_item))
        .route(
            "/api/kits/:id/items/:code/adjust",
            post(handlers::adjust_item),
        )
        .route(
            "/api/kits/:id/items/:code/expiry/:index",
            delete(handlers::remove_expiry),
        )
        .route(
            "/api/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/api/users/:id",
            put(handlers::edit_user).delete(handlers::remove_user),
        )
        .route("/api/audit", get(handlers::get_audit))
        .route(
            "/api/settings",
            get(handlers::get_settings).patch(handlers::patch_settings),
        )
        .route(
            "/api/settings/general",
            get(handlers::get_general_settings).put(handlers::put_general_settings),
        )
        .route("/api/settings/sync", post(handlers::sync_settings))
        .route("/api/settings/export", get(handlers::export_settings))
        .route("/api/settings/import", post(handlers::import_settings))
        .route(
            "/api/materials",
            get(handlers::list_materials).post(handlers::create_material),
        )
        .route(
            "/api/materials/:id",
            put(handlers::edit_material).delete(handlers::remove_material),
        )
        .route("/api/orders", post(handlers::create_order))
        .route("/api/data", delete(handlers::reset_data))
        .route("/api/data/export", get(handlers::export_data))
        .route("/api/notify/expiring", post(handlers::notify_expiring))
        .route(
            "/api/notify/zero-quantity",
            post(handlers::notify_zero_quantity),
        )
        .route(
            "/api/notify/:kind/preview",
            get(handlers::preview_notification),
        )
        .route(
            "/api/reports",
            get(handlers::list_reports).post(handlers::generate_report),
        )
        .route("/api/reports/:id", delete(handlers::delete_report))
        .with_state(state)
}
