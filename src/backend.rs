use crate::config::AppConfig;
use crate::materials::MaterialBody;
use crate::notify::OutgoingEmail;
use crate::orders::OrderPayload;
use crate::query::CatalogMaterial;
use crate::report::ReportPayload;
use crate::settings::SettingItem;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

static MIN_QTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)minQty\s*=\s*(\d+)").expect("minQty pattern compiles"));
static MAX_QTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)maxQty\s*=\s*(\d+)").expect("maxQty pattern compiles"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} timed out after {}s", .after.as_secs_f32())]
    Timeout { url: String, after: Duration },

    #[error("could not reach {url}: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
        details: Vec<ValidationDetail>,
    },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl BackendError {
    fn from_reqwest(url: &str, after: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                after,
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub health: Duration,
    pub settings: Duration,
    pub settings_import: Duration,
    pub materials: Duration,
    pub email: Duration,
    pub report: Duration,
    pub report_retry_delay: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            health: Duration::from_millis(2000),
            settings: Duration::from_millis(2500),
            settings_import: Duration::from_secs(5),
            materials: Duration::from_secs(4),
            email: Duration::from_secs(10),
            report: Duration::from_secs(45),
            report_retry_delay: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GeneratedReport {
    pub download_url: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedOrder {
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope {
    #[serde(default)]
    items: Vec<SettingItem>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ReportResponseData {
    download_url: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ReportResponse {
    download_url: Option<String>,
    #[serde(default)]
    data: Option<ReportResponseData>,
}

pub struct BackendClient {
    http: Client,
    api_base: RwLock<String>,
    report_base: String,
    api_key: String,
    user: String,
    timeouts: Timeouts,
}

impl BackendClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_timeouts(config, Timeouts::default())
    }

    pub fn with_timeouts(config: &AppConfig, timeouts: Timeouts) -> Self {
        Self {
            http: Client::new(),
            api_base: RwLock::new(config.default_api_base()),
            report_base: config.report_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            user: config.operator.clone(),
            timeouts,
        }
    }

    pub async fn api_base(&self) -> String {
        self.api_base.read().await.clone()
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("x-user", &self.user)
    }

    async fn send(
        &self,
        url: &str,
        builder: RequestBuilder,
        after: Duration,
    ) -> Result<Response, BackendError> {
        debug!(url, "backend request");
        self.authorized(builder)
            .timeout(after)
            .send()
            .await
            .map_err(|err| BackendError::from_reqwest(url, after, err))
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        url: &str,
        response: Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| BackendError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        if !status.is_success() {
            let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            return Err(status_error(url, status.as_u16(), &body));
        }
        serde_json::from_slice(&bytes).map_err(|err| BackendError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    pub async fn is_healthy(&self, base: &str) -> bool {
        let url = format!("{}/health", base.trim_end_matches('/'));
        match self
            .send(&url, self.http.get(&url), self.timeouts.health)
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(%err, "health check failed");
                false
            }
        }
    }

    pub async fn resolve_api_base(&self, candidates: &[String]) -> Option<String> {
        for base in candidates {
            if self.is_healthy(base).await {
                let base = base.trim_end_matches('/').to_string();
                info!(%base, "backend api selected");
                *self.api_base.write().await = base.clone();
                return Some(base);
            }
        }
        warn!("no backend api reachable, materials and settings stay offline");
        None
    }

    pub async fn load_settings(&self) -> Result<Vec<SettingItem>, BackendError> {
        let url = format!("{}/settings", self.api_base().await);
        let response = self
            .send(&url, self.http.get(&url), self.timeouts.settings)
            .await?;
        let envelope: ItemsEnvelope = Self::decode(&url, response).await?;
        Ok(envelope.items)
    }

    pub async fn save_settings_bulk(
        &self,
        items: &[SettingItem],
    ) -> Result<Vec<SettingItem>, BackendError> {
        let url = format!("{}/settings/bulk", self.api_base().await);
        let body = serde_json::json!({ "items": items });
        let response = self
            .send(&url, self.http.patch(&url).json(&body), self.timeouts.settings)
            .await?;
        let envelope: ItemsEnvelope = Self::decode(&url, response).await?;
        Ok(envelope.items)
    }

    pub async fn export_settings(&self) -> Result<Value, BackendError> {
        let url = format!("{}/settings/export", self.api_base().await);
        let response = self
            .send(&url, self.http.get(&url), self.timeouts.settings)
            .await?;
        Self::decode(&url, response).await
    }

    pub async fn import_settings(&self, document: &Value) -> Result<Vec<SettingItem>, BackendError> {
        let url = format!("{}/settings/import", self.api_base().await);
        let response = self
            .send(
                &url,
                self.http.post(&url).json(document),
                self.timeouts.settings_import,
            )
            .await?;
        let envelope: ItemsEnvelope = Self::decode(&url, response).await?;
        Ok(envelope.items)
    }

    pub async fn load_materials(&self) -> Vec<CatalogMaterial> {
        let url = format!("{}/materiali", self.api_base().await);
        let result = match self
            .send(&url, self.http.get(&url), self.timeouts.materials)
            .await
        {
            Ok(response) => Self::decode::<Vec<CatalogMaterial>>(&url, response).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(materials) => materials.into_iter().map(with_note_extras).collect(),
            Err(err) => {
                warn!(%err, "loading materials failed");
                Vec::new()
            }
        }
    }

    pub async fn create_material(
        &self,
        body: &MaterialBody,
    ) -> Result<CatalogMaterial, BackendError> {
        let url = format!("{}/materiali", self.api_base().await);
        let response = self
            .send(&url, self.http.post(&url).json(body), self.timeouts.materials)
            .await?;
        let created: CatalogMaterial = Self::decode(&url, response).await?;
        info!(id = created.id, name = %created.name, "material created");
        Ok(with_note_extras(created))
    }

    pub async fn update_material(
        &self,
        id: i64,
        body: &MaterialBody,
    ) -> Result<CatalogMaterial, BackendError> {
        let url = format!("{}/materiali/{id}", self.api_base().await);
        let response = self
            .send(&url, self.http.put(&url).json(body), self.timeouts.materials)
            .await?;
        let updated: CatalogMaterial = Self::decode(&url, response).await?;
        Ok(with_note_extras(updated))
    }

    pub async fn delete_material(&self, id: i64) -> Result<(), BackendError> {
        let url = format!("{}/materiali/{id}", self.api_base().await);
        let response = self
            .send(&url, self.http.delete(&url), self.timeouts.materials)
            .await?;
        let _: Value = Self::decode(&url, response).await?;
        info!(id, "material deleted");
        Ok(())
    }

    pub async fn send_email(&self, email: &OutgoingEmail) -> Result<(), BackendError> {
        let url = format!("{}/send-email", self.api_base().await);
        let response = self
            .send(&url, self.http.post(&url).json(email), self.timeouts.email)
            .await?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| BackendError::Decode {
            url: url.clone(),
            message: err.to_string(),
        })?;
        // an empty or non-JSON body counts as an empty object
        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        let empty = match &body {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        let succeeded = body.get("success").and_then(Value::as_bool) == Some(true);
        if status.is_success() && (succeeded || empty) {
            info!(to = %email.to, subject = %email.subject, "notification email sent");
            return Ok(());
        }
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
        Err(BackendError::Status {
            url,
            status: status.as_u16(),
            message,
            details: Vec::new(),
        })
    }

    // transport failures are retried once, timeouts are not
    pub async fn generate_report(
        &self,
        payload: &ReportPayload,
    ) -> Result<GeneratedReport, BackendError> {
        let url = format!("{}/report/generate", self.report_base);
        let attempt = || {
            self.send(
                &url,
                self.http.post(&url).json(payload),
                self.timeouts.report,
            )
        };

        let response = match attempt().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return Err(err),
            Err(err) => {
                warn!(%err, "report request failed, retrying once");
                tokio::time::sleep(self.timeouts.report_retry_delay).await;
                attempt().await?
            }
        };

        let parsed: ReportResponse = Self::decode(&url, response).await?;
        let data = parsed.data.unwrap_or_default();
        Ok(GeneratedReport {
            download_url: parsed.download_url.or(data.download_url),
            warnings: data.warnings,
        })
    }

    pub async fn generate_order_pdf(
        &self,
        order: &OrderPayload,
    ) -> Result<GeneratedOrder, BackendError> {
        let url = format!("{}/orders/generate-pdf", self.report_base);
        let response = self
            .send(&url, self.http.post(&url).json(order), self.timeouts.report)
            .await?;
        let body: Value = Self::decode(&url, response).await?;
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(status_error(&url, 200, &body));
        }
        serde_json::from_value(body).map_err(|err| BackendError::Decode {
            url,
            message: err.to_string(),
        })
    }
}

// details may be a list of field errors or a bare string
fn status_error(url: &str, status: u16, body: &Value) -> BackendError {
    let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
    let details = body
        .get("details")
        .cloned()
        .and_then(|details| serde_json::from_value::<Vec<ValidationDetail>>(details).ok())
        .unwrap_or_default();
    let message = text("error")
        .or_else(|| text("message"))
        .or_else(|| text("details"))
        .unwrap_or_else(|| {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .unwrap_or("error")
                .to_string()
        });
    BackendError::Status {
        url: url.to_string(),
        status,
        message,
        details,
    }
}

fn with_note_extras(mut material: CatalogMaterial) -> CatalogMaterial {
    let (min_qty, max_qty) = decode_note_extras(material.note.as_deref());
    material.min_qty = min_qty;
    material.max_qty = max_qty;
    material
}

pub fn decode_note_extras(note: Option<&str>) -> (Option<u32>, Option<u32>) {
    let Some(note) = note.map(str::trim).filter(|text| !text.is_empty()) else {
        return (None, None);
    };
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(note) {
        let number = |key: &str| {
            map.get(key).and_then(|value| match value {
                Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
        };
        return (number("minQty"), number("maxQty"));
    }
    let capture = |re: &Regex| {
        re.captures(note)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    };
    (capture(&MIN_QTY_RE), capture(&MAX_QTY_RE))
}

pub fn encode_note_extras(min_qty: Option<u32>, max_qty: Option<u32>) -> String {
    let mut map = serde_json::Map::new();
    if let Some(min_qty) = min_qty {
        map.insert("minQty".to_string(), Value::from(min_qty));
    }
    if let Some(max_qty) = max_qty {
        map.insert("maxQty".to_string(), Value::from(max_qty));
    }
    Value::Object(map).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_extras_from_json() {
        assert_eq!(
            decode_note_extras(Some(r#"{"minQty": 2, "maxQty": "8"}"#)),
            (Some(2), Some(8))
        );
    }

    #[test]
    fn note_extras_from_pattern() {
        assert_eq!(
            decode_note_extras(Some("scaffale 3; MINQTY = 4; maxQty=12")),
            (Some(4), Some(12))
        );
        assert_eq!(decode_note_extras(Some("nothing here")), (None, None));
        assert_eq!(decode_note_extras(None), (None, None));
    }

    #[test]
    fn status_error_accepts_string_details() {
        let body = serde_json::json!({ "success": false, "details": "template not found" });
        match status_error("http://x/orders/generate-pdf", 500, &body) {
            BackendError::Status { message, details, .. } => {
                assert_eq!(message, "template not found");
                assert!(details.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let body = serde_json::json!({
            "message": "Validation failed",
            "details": [{ "field": "city", "message": "required" }]
        });
        match status_error("http://x/orders/generate-pdf", 400, &body) {
            BackendError::Status { message, details, .. } => {
                assert_eq!(message, "Validation failed");
                assert_eq!(details[0].field, "city");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn encoded_extras_decode_back() {
        let note = encode_note_extras(Some(1), None);
        assert_eq!(note, r#"{"minQty":1}"#);
        assert_eq!(decode_note_extras(Some(&note)), (Some(1), None));
    }
}
