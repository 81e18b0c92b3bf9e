use crate::backend::encode_note_extras;
use crate::errors::InventoryError;
use crate::query::CatalogMaterial;
use serde::{Deserialize, Serialize};

// only standard-kit materials carry a maximum quantity
pub const STANDARD_CATEGORY: &str = "Kit standard";

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialRequest {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub min_qty: Option<u32>,
    #[serde(default)]
    pub max_qty: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MaterialBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "nome_materiale")]
    pub name: String,
    #[serde(rename = "categoria")]
    pub category: String,
    pub note: String,
}

fn material_body(request: &MaterialRequest) -> Result<MaterialBody, InventoryError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(InventoryError::Invalid("material name is required".to_string()));
    }
    let category = request.category.trim();
    if category.is_empty() {
        return Err(InventoryError::Invalid("material category is required".to_string()));
    }
    let max_qty = request.max_qty.filter(|_| category == STANDARD_CATEGORY);
    if let (Some(min), Some(max)) = (request.min_qty, max_qty) {
        if min > max {
            return Err(InventoryError::Invalid(format!(
                "minimum quantity {min} exceeds maximum {max}"
            )));
        }
    }
    Ok(MaterialBody {
        id: None,
        name: name.to_string(),
        category: category.to_string(),
        note: encode_note_extras(request.min_qty, max_qty),
    })
}

pub fn new_material(
    request: &MaterialRequest,
    existing: &[CatalogMaterial],
) -> Result<MaterialBody, InventoryError> {
    let mut body = material_body(request)?;
    if let Some(id) = request.id {
        if id <= 0 {
            return Err(InventoryError::Invalid(format!(
                "material id must be positive, got {id}"
            )));
        }
        if existing.iter().any(|material| material.id == id) {
            return Err(InventoryError::DuplicateMaterialId(id));
        }
        body.id = Some(id);
    }
    Ok(body)
}

pub fn material_update(request: &MaterialRequest) -> Result<MaterialBody, InventoryError> {
    material_body(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::decode_note_extras;

    fn request(name: &str, category: &str) -> MaterialRequest {
        MaterialRequest {
            id: None,
            name: name.to_string(),
            category: category.to_string(),
            min_qty: None,
            max_qty: None,
        }
    }

    fn row(id: i64) -> CatalogMaterial {
        CatalogMaterial {
            id,
            name: format!("Item {id}"),
            category: None,
            note: None,
            min_qty: None,
            max_qty: None,
        }
    }

    #[test]
    fn name_and_category_are_required() {
        assert!(matches!(
            new_material(&request("  ", "Consumabili"), &[]),
            Err(InventoryError::Invalid(_))
        ));
        assert!(matches!(
            material_update(&request("Garze", "")),
            Err(InventoryError::Invalid(_))
        ));
    }

    #[test]
    fn max_quantity_is_kept_only_for_standard_kit_materials() {
        let mut standard = request("Garze", STANDARD_CATEGORY);
        standard.min_qty = Some(2);
        standard.max_qty = Some(8);
        let body = new_material(&standard, &[]).unwrap();
        assert_eq!(decode_note_extras(Some(&body.note)), (Some(2), Some(8)));

        let mut other = standard.clone();
        other.category = "Consumabili".to_string();
        let body = new_material(&other, &[]).unwrap();
        assert_eq!(decode_note_extras(Some(&body.note)), (Some(2), None));
    }

    #[test]
    fn minimum_above_maximum_is_rejected() {
        let mut req = request("Garze", STANDARD_CATEGORY);
        req.min_qty = Some(9);
        req.max_qty = Some(3);
        assert!(matches!(
            material_update(&req),
            Err(InventoryError::Invalid(_))
        ));
    }

    #[test]
    fn explicit_ids_must_be_positive_and_unused() {
        let mut req = request("Garze", "Consumabili");
        req.id = Some(0);
        assert!(matches!(
            new_material(&req, &[]),
            Err(InventoryError::Invalid(_))
        ));

        req.id = Some(7);
        assert_eq!(
            new_material(&req, &[row(7)]),
            Err(InventoryError::DuplicateMaterialId(7))
        );
        assert_eq!(new_material(&req, &[row(3)]).unwrap().id, Some(7));
    }

    #[test]
    fn wire_body_uses_database_column_names() {
        let body = material_update(&request(" Forbici ", " Strumenti ")).unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "nome_materiale": "Forbici", "categoria": "Strumenti", "note": "{}" })
        );
    }
}
