use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Material {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub min_qty: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WarehouseLot {
    pub id: String,
    pub code: String,
    pub quantity: u32,
    pub expiry_date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KitItem {
    pub code: String,
    pub max_quantity: u32,
    #[serde(default)]
    pub current_quantity: u32,
    #[serde(default)]
    pub expiry_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub notes: String,
}

impl KitItem {
    pub fn empty(code: impl Into<String>, max_quantity: u32) -> Self {
        Self {
            code: code.into(),
            max_quantity,
            current_quantity: 0,
            expiry_dates: Vec::new(),
            notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub is_standard: bool,
    #[serde(default)]
    pub items: Vec<KitItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardItem {
    pub code: String,
    pub max_quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub signature: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub element_id: String,
    pub operator_id: Option<String>,
    pub operator_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub operator: String,
    pub kits: Vec<String>,
    pub kit_count: usize,
    #[serde(default)]
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KitType {
    #[default]
    Standard,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralSettings {
    pub company_name: String,
    pub default_location: String,
    pub default_operator: Option<String>,
    pub support_email: String,
    pub threshold_days: u32,
    pub notification_days: u32,
    pub date_long_format: bool,
    pub show_signatures: bool,
    pub default_kit_type: KitType,
    pub logo_path: Option<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            company_name: "Azienda".to_string(),
            default_location: String::new(),
            default_operator: None,
            support_email: "assistenza.tecnica@isokit.it".to_string(),
            threshold_days: 90,
            notification_days: 30,
            date_long_format: false,
            show_signatures: true,
            default_kit_type: KitType::Standard,
            logo_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EmailTemplate {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailTemplates {
    pub expiring: EmailTemplate,
    pub zero_quantity: EmailTemplate,
}

impl Default for EmailTemplates {
    fn default() -> Self {
        Self {
            expiring: EmailTemplate {
                recipient: String::new(),
                subject: "Items Expiring Soon".to_string(),
                body: String::new(),
            },
            zero_quantity: EmailTemplate {
                recipient: String::new(),
                subject: "Items Out of Stock".to_string(),
                body: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InventoryData {
    pub warehouse: Vec<WarehouseLot>,
    pub kits: Vec<Kit>,
    pub materials: Vec<Material>,
    pub standard_items: Vec<StandardItem>,
    pub users: Vec<User>,
    pub audit_log: Vec<AuditEntry>,
    pub reports_history: Vec<ReportRecord>,
    pub settings: GeneralSettings,
    pub email_templates: EmailTemplates,
    pub app_settings: Map<String, Value>,
}

impl InventoryData {
    pub fn material_name(&self, code: &str) -> String {
        self.materials
            .iter()
            .find(|material| material.code == code)
            .map(|material| material.name.clone())
            .unwrap_or_else(|| code.to_string())
    }

    pub fn kit(&self, kit_id: &str) -> Option<&Kit> {
        self.kits.iter().find(|kit| kit.id == kit_id)
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|user| user.id == user_id)
    }
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LotRequest {
    pub code: String,
    pub quantity: u32,
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct NewKitRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub kit_type: KitType,
}

#[derive(Debug, Deserialize)]
pub struct UpdateKitRequest {
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct NewKitItemRequest {
    pub code: String,
    pub max_quantity: u32,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub recipient: String,
    pub subject: String,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub location: Option<String>,
    pub operator_id: Option<String>,
    #[serde(default)]
    pub kit_ids: Vec<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct SettingsBulkRequest {
    #[serde(default)]
    pub items: Vec<crate::settings::SettingItem>,
    #[serde(default)]
    pub values: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct KitView {
    #[serde(flatten)]
    pub kit: Kit,
    pub status: crate::inventory::KitStatus,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}
