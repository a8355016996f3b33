//! Postal address snapshot stored on orders.

use serde::{Deserialize, Serialize};

/// A required address field was blank.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} is required")]
pub struct AddressError {
    /// camelCase name of the offending field, as seen on the wire.
    pub field: &'static str,
}

/// A shipping or billing address.
///
/// Orders store a copy of the address as it was at checkout, so later edits
/// to a customer's saved addresses never rewrite order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub address1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    /// Check that every required field is non-blank.
    ///
    /// # Errors
    ///
    /// Returns every blank required field, in declaration order.
    pub fn validate(&self) -> Result<(), Vec<AddressError>> {
        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("address1", &self.address1),
            ("city", &self.city),
            ("state", &self.state),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ];

        let errors: Vec<_> = required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| AddressError { field })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
