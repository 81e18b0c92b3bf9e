use crate::errors::InventoryError;
use crate::models::{generate_id, AuditEntry, InventoryData, User, UserRequest};
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

const UNKNOWN_OPERATOR: &str = "Sistema";

fn validate_user(request: &UserRequest) -> Result<(String, String), InventoryError> {
    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(InventoryError::Invalid(
            "first and last name are required".to_string(),
        ));
    }
    Ok((first_name.to_string(), last_name.to_string()))
}

fn clean_signature(signature: Option<String>) -> Option<String> {
    signature.filter(|value| !value.trim().is_empty())
}

pub fn add_user(data: &mut InventoryData, request: UserRequest) -> Result<User, InventoryError> {
    let (first_name, last_name) = validate_user(&request)?;
    let user = User {
        id: generate_id(),
        first_name,
        last_name,
        signature: clean_signature(request.signature),
    };
    data.users.push(user.clone());
    Ok(user)
}

pub fn update_user(
    data: &mut InventoryData,
    user_id: &str,
    request: UserRequest,
) -> Result<User, InventoryError> {
    let (first_name, last_name) = validate_user(&request)?;
    let user = data
        .users
        .iter_mut()
        .find(|user| user.id == user_id)
        .ok_or_else(|| InventoryError::UserNotFound(user_id.to_string()))?;
    user.first_name = first_name;
    user.last_name = last_name;
    user.signature = clean_signature(request.signature);
    Ok(user.clone())
}

pub fn delete_user(data: &mut InventoryData, user_id: &str) -> Result<User, InventoryError> {
    let idx = data
        .users
        .iter()
        .position(|user| user.id == user_id)
        .ok_or_else(|| InventoryError::UserNotFound(user_id.to_string()))?;
    if data.settings.default_operator.as_deref() == Some(user_id) {
        data.settings.default_operator = None;
    }
    Ok(data.users.remove(idx))
}

pub fn log_audit(
    data: &mut InventoryData,
    action: &str,
    element_id: &str,
    details: Value,
) -> AuditEntry {
    let operator = data
        .settings
        .default_operator
        .as_deref()
        .and_then(|id| data.user(id));
    let entry = AuditEntry {
        action: action.to_string(),
        element_id: element_id.to_string(),
        operator_id: operator.map(|user| user.id.clone()),
        operator_name: operator
            .map(User::full_name)
            .unwrap_or_else(|| UNKNOWN_OPERATOR.to_string()),
        timestamp: Utc::now(),
        details,
    };
    debug!(action, element_id, operator = %entry.operator_name, "audit");
    data.audit_log.push(entry.clone());
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(first: &str, last: &str) -> UserRequest {
        UserRequest {
            first_name: first.to_string(),
            last_name: last.to_string(),
            signature: None,
        }
    }

    #[test]
    fn users_require_both_names() {
        let mut data = InventoryData::default();
        assert!(matches!(
            add_user(&mut data, request("Anna", "  ")),
            Err(InventoryError::Invalid(_))
        ));
        let user = add_user(&mut data, request(" Anna ", "Rossi")).unwrap();
        assert_eq!(user.full_name(), "Anna Rossi");
        assert_eq!(data.users.len(), 1);
    }

    #[test]
    fn update_and_delete_unknown_user_fail() {
        let mut data = InventoryData::default();
        assert_eq!(
            update_user(&mut data, "nope", request("A", "B")).unwrap_err(),
            InventoryError::UserNotFound("nope".to_string())
        );
        assert!(delete_user(&mut data, "nope").is_err());
    }

    #[test]
    fn deleting_default_operator_clears_setting() {
        let mut data = InventoryData::default();
        let user = add_user(&mut data, request("Luca", "Bianchi")).unwrap();
        data.settings.default_operator = Some(user.id.clone());
        delete_user(&mut data, &user.id).unwrap();
        assert_eq!(data.settings.default_operator, None);
    }

    #[test]
    fn audit_entries_carry_default_operator() {
        let mut data = InventoryData::default();
        let anonymous = log_audit(&mut data, "add_kit", "k1", json!({}));
        assert_eq!(anonymous.operator_name, UNKNOWN_OPERATOR);
        assert_eq!(anonymous.operator_id, None);

        let user = add_user(&mut data, request("Luca", "Bianchi")).unwrap();
        data.settings.default_operator = Some(user.id.clone());
        let entry = log_audit(&mut data, "delete_kit", "k1", json!({"name": "A"}));
        assert_eq!(entry.operator_name, "Luca Bianchi");
        assert_eq!(entry.operator_id.as_deref(), Some(user.id.as_str()));
        assert_eq!(data.audit_log.len(), 2);
    }
}
