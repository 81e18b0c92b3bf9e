use crate::alerts::{expiring_items, zero_quantity_items};
use crate::errors::InventoryError;
use crate::models::{EmailTemplate, GeneralSettings, InventoryData, NotifyRequest};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Expiring,
    ZeroQuantity,
}

impl NotificationKind {
    fn label(self) -> &'static str {
        match self {
            NotificationKind::Expiring => "expiring",
            NotificationKind::ZeroQuantity => "zero quantity",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DigestRow {
    pub code: String,
    pub name: String,
    pub quantity: Option<u32>,
    pub expiry_date: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    pub kind: NotificationKind,
    pub items: Vec<DigestRow>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

pub fn is_valid_recipient(address: &str) -> bool {
    EMAIL_RE.is_match(address)
}

fn format_day(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn build_digest(
    data: &InventoryData,
    kind: NotificationKind,
    month: u32,
    year: i32,
) -> Digest {
    let items: Vec<DigestRow> = match kind {
        NotificationKind::Expiring => expiring_items(data, month, year)
            .into_iter()
            .map(|item| DigestRow {
                code: item.code,
                name: item.name,
                quantity: Some(item.quantity),
                expiry_date: Some(format_day(item.expiry_date)),
                location: None,
            })
            .collect(),
        NotificationKind::ZeroQuantity => zero_quantity_items(data)
            .into_iter()
            .map(|item| DigestRow {
                code: item.code,
                name: item.name,
                quantity: None,
                expiry_date: None,
                location: Some(item.location),
            })
            .collect(),
    };
    Digest {
        kind,
        total_count: items.len(),
        items,
    }
}

pub fn validate_digest(digest: &Digest) -> Result<(), InventoryError> {
    if digest.total_count != digest.items.len() {
        return Err(InventoryError::Invalid(
            "item count does not match the item list".to_string(),
        ));
    }
    if let Some(pos) = digest
        .items
        .iter()
        .position(|row| row.code.trim().is_empty() || row.name.trim().is_empty())
    {
        return Err(InventoryError::Invalid(format!("item {pos} has no code or name")));
    }
    Ok(())
}

pub fn format_body(digest: &Digest, settings: &GeneralSettings, today: NaiveDate) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", settings.company_name));
    out.push_str(&format!("Report del {}\n\n", format_day(today)));

    match digest.kind {
        NotificationKind::Expiring => {
            out.push_str("ARTICOLI IN SCADENZA\n");
            out.push_str("===================\n\n");
            out.push_str(&format!(
                "Sono stati identificati {} articoli che necessitano attenzione per scadenza imminente.\n\n",
                digest.total_count
            ));
        }
        NotificationKind::ZeroQuantity => {
            out.push_str("ARTICOLI ESAURITI\n");
            out.push_str("================\n\n");
            out.push_str(&format!(
                "Sono stati identificati {} articoli con quantità zero che necessitano rifornimento.\n\n",
                digest.total_count
            ));
        }
    }

    if !digest.items.is_empty() {
        out.push_str("DETTAGLIO ARTICOLI:\n\n");
        out.push_str(&format!("{:<15} | {:<30} | ", "Codice", "Nome"));
        match digest.kind {
            NotificationKind::Expiring => {
                out.push_str(&format!("{:<10} | {:<12}\n", "Quantità", "Scadenza"))
            }
            NotificationKind::ZeroQuantity => out.push_str(&format!("{:<20}\n", "Ubicazione")),
        }
        out.push_str(&"-".repeat(80));
        out.push('\n');

        for row in &digest.items {
            out.push_str(&format!("{:<15} | {:<30} | ", row.code, row.name));
            match digest.kind {
                NotificationKind::Expiring => out.push_str(&format!(
                    "{:<10} | {:<12}\n",
                    row.quantity.unwrap_or(0),
                    row.expiry_date.as_deref().unwrap_or("")
                )),
                NotificationKind::ZeroQuantity => out.push_str(&format!(
                    "{:<20}\n",
                    row.location.as_deref().unwrap_or("")
                )),
            }
        }
    }

    out.push_str("\n\nAZIONI RICHIESTE:\n");
    match digest.kind {
        NotificationKind::Expiring => {
            out.push_str("- Verificare le date di scadenza\n");
            out.push_str("- Pianificare l'utilizzo degli articoli in scadenza\n");
            out.push_str("- Aggiornare l'inventario se necessario\n");
        }
        NotificationKind::ZeroQuantity => {
            out.push_str("- Verificare le quantità in magazzino\n");
            out.push_str("- Procedere con il riordino degli articoli esauriti\n");
            out.push_str("- Aggiornare l'inventario dopo il rifornimento\n");
        }
    }
    out.push('\n');
    out.push_str("Report generato automaticamente dal sistema di gestione First Aid Manager.\n");
    out.push_str(&format!("Per assistenza contattare: {}\n", settings.support_email));
    out
}

pub fn prepare_notification(
    data: &mut InventoryData,
    kind: NotificationKind,
    request: &NotifyRequest,
    reply_to: Option<String>,
    today: NaiveDate,
) -> Result<OutgoingEmail, InventoryError> {
    let recipient = request.recipient.trim();
    if recipient.is_empty() {
        return Err(InventoryError::Invalid(format!(
            "a recipient is required for {} notifications",
            kind.label()
        )));
    }
    if !is_valid_recipient(recipient) {
        return Err(InventoryError::Invalid(format!(
            "'{recipient}' is not a valid email address"
        )));
    }
    let subject = request.subject.trim();
    if subject.is_empty() {
        return Err(InventoryError::Invalid("a subject is required".to_string()));
    }

    let month = request.month.unwrap_or_else(|| today.month());
    let year = request.year.unwrap_or_else(|| today.year());
    let digest = build_digest(data, kind, month, year);
    validate_digest(&digest)?;
    if digest.items.is_empty() {
        return Err(InventoryError::Invalid(format!(
            "there are no {} items to notify",
            kind.label()
        )));
    }

    let body = format_body(&digest, &data.settings, today);
    let template = EmailTemplate {
        recipient: recipient.to_string(),
        subject: subject.to_string(),
        body: body.clone(),
    };
    match kind {
        NotificationKind::Expiring => data.email_templates.expiring = template,
        NotificationKind::ZeroQuantity => data.email_templates.zero_quantity = template,
    }

    Ok(OutgoingEmail {
        to: recipient.to_string(),
        subject: subject.to_string(),
        text: body,
        reply_to,
    })
}
