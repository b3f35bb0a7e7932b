//! Order and quote workflows that sit on top of the entity store.

pub mod orders;
pub mod quotes;

use panaderia_core::{Email, Phone};
use serde::Deserialize;

use crate::auth::Caller;
use crate::db::models::CustomerContact;
use crate::error::AppError;

const MAX_NAME_LEN: usize = 120;

/// Customer identity as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl CustomerInput {
    /// Parse into a contact with at least one way to reach the customer.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` naming the first invalid field.
    pub fn validate(&self) -> Result<CustomerContact, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("customer name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::BadRequest("customer name is too long".to_string()));
        }

        let email = non_blank(self.email.as_deref())
            .map(Email::parse)
            .transpose()
            .map_err(|e| AppError::BadRequest(format!("customer email: {e}")))?;
        let phone = non_blank(self.phone.as_deref())
            .map(Phone::parse)
            .transpose()
            .map_err(|e| AppError::BadRequest(format!("customer phone: {e}")))?;

        if email.is_none() && phone.is_none() {
            return Err(AppError::BadRequest(
                "customer email or phone is required".to_string(),
            ));
        }

        Ok(CustomerContact {
            name: name.to_string(),
            email,
            phone,
        })
    }
}

/// Owner to record on a new order or quote.
///
/// Customers always own what they create and may not name someone else.
/// Staff may create on behalf of a customer or leave the record unowned.
pub(crate) fn resolve_owner(
    caller: &Caller,
    requested: Option<&str>,
) -> Result<Option<String>, AppError> {
    let requested = non_blank(requested);
    if caller.is_staff() {
        return Ok(requested.map(String::from));
    }
    match requested {
        Some(owner) if owner != caller.subject => Err(AppError::Forbidden(
            "customers can only create records for themselves".to_string(),
        )),
        _ => Ok(Some(caller.subject.clone())),
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use panaderia_core::Role;

    use super::*;

    fn caller(role: Role) -> Caller {
        Caller {
            subject: "cust-1".to_string(),
            email: None,
            name: None,
            role,
        }
    }

    #[test]
    fn test_customer_needs_a_contact() {
        let input = CustomerInput {
            name: "Ana".to_string(),
            email: Some("  ".to_string()),
            phone: None,
        };
        assert!(matches!(input.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_malformed_identity_is_rejected() {
        let input = CustomerInput {
            name: "Ana".to_string(),
            email: Some("ana-at-example".to_string()),
            phone: None,
        };
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("customer email"));
    }

    #[test]
    fn test_valid_contact() {
        let input = CustomerInput {
            name: " Ana ".to_string(),
            email: None,
            phone: Some("(512) 555-0100".to_string()),
        };
        let contact = input.validate().unwrap();
        assert_eq!(contact.name, "Ana");
        assert_eq!(contact.phone.unwrap().as_str(), "15125550100");
    }

    #[test]
    fn test_owner_resolution() {
        let customer = caller(Role::Customer);
        assert_eq!(resolve_owner(&customer, None).unwrap().as_deref(), Some("cust-1"));
        assert_eq!(
            resolve_owner(&customer, Some("cust-1")).unwrap().as_deref(),
            Some("cust-1")
        );
        assert!(matches!(
            resolve_owner(&customer, Some("cust-2")),
            Err(AppError::Forbidden(_))
        ));

        let staff = caller(Role::Employee);
        assert_eq!(resolve_owner(&staff, Some("cust-2")).unwrap().as_deref(), Some("cust-2"));
        assert_eq!(resolve_owner(&staff, None).unwrap(), None);
    }
}
