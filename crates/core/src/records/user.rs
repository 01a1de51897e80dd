//! User records and saved profiles.

use serde::{Deserialize, Serialize};

use super::{EntityType, IndexKey, IndexName, Record, ValidationError};
use crate::codec::RecordError;
use crate::codec::lenient::{LenientInt, non_empty};
use crate::types::{AuthToken, Email, UserId};

/// A registered marketplace user. The same record serves buyers and sellers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "UserWire")]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<AuthToken>,
}

/// Profile fields saved per email across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, alias = "pincode", skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

impl Profile {
    /// Whether any contact detail worth keeping is set.
    #[must_use]
    pub fn has_contact_details(&self) -> bool {
        [&self.phone, &self.city, &self.postal_code]
            .into_iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

impl User {
    /// Snapshot of the profile fields.
    #[must_use]
    pub fn profile(&self) -> Profile {
        Profile {
            name: non_empty(Some(self.name.clone())),
            phone: self.phone.clone(),
            city: self.city.clone(),
            postal_code: self.postal_code.clone(),
            profile_image: self.profile_image.clone(),
        }
    }

    /// Overlay a saved profile; non-empty saved values win.
    pub fn merge_profile(&mut self, saved: &Profile) {
        fn pick(saved: Option<&String>, current: &mut Option<String>) {
            if let Some(value) = non_empty(saved.cloned()) {
                *current = Some(value);
            }
        }

        if let Some(name) = non_empty(saved.name.clone()) {
            self.name = name;
        }
        pick(saved.phone.as_ref(), &mut self.phone);
        pick(saved.city.as_ref(), &mut self.city);
        pick(saved.postal_code.as_ref(), &mut self.postal_code);
        pick(saved.profile_image.as_ref(), &mut self.profile_image);
    }

    /// Apply edited profile fields; `None` leaves a field unchanged.
    pub fn apply_profile(&mut self, edit: Profile) {
        if let Some(name) = non_empty(edit.name) {
            self.name = name;
        }
        if edit.phone.is_some() {
            self.phone = non_empty(edit.phone);
        }
        if edit.city.is_some() {
            self.city = non_empty(edit.city);
        }
        if edit.postal_code.is_some() {
            self.postal_code = non_empty(edit.postal_code);
        }
        if edit.profile_image.is_some() {
            self.profile_image = non_empty(edit.profile_image);
        }
    }
}

impl Record for User {
    const ENTITY: EntityType = EntityType::Users;

    fn key(&self) -> i64 {
        self.id.as_i64()
    }

    fn index_keys(&self, index: IndexName) -> Vec<IndexKey> {
        match (index, &self.email) {
            (IndexName::Email, Some(email)) => vec![email.into()],
            _ => Vec::new(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserWire {
    #[serde(default)]
    id: Option<LenientInt>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default, alias = "pincode")]
    postal_code: Option<String>,
    #[serde(default)]
    profile_image: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

impl TryFrom<UserWire> for User {
    type Error = RecordError;

    fn try_from(wire: UserWire) -> Result<Self, Self::Error> {
        let id = wire.id.ok_or(RecordError::MissingField("id"))?.resolve("id")?;
        let email = non_empty(wire.email).map(|e| Email::parse(&e)).transpose()?;
        // Accounts created before names were collected fall back to the email.
        let name = non_empty(wire.name)
            .or_else(|| email.as_ref().map(ToString::to_string))
            .ok_or(RecordError::MissingField("name"))?;

        Ok(Self {
            id: UserId::new(id),
            name,
            email,
            phone: non_empty(wire.phone),
            city: non_empty(wire.city),
            postal_code: non_empty(wire.postal_code),
            profile_image: non_empty(wire.profile_image),
            token: non_empty(wire.token).map(AuthToken::new),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> User {
        serde_json::from_value(json!({
            "id": "12",
            "name": "Asha",
            "email": "Asha@Shop.in",
            "phone": "",
            "pincode": "560001",
            "token": "demo-token"
        }))
        .unwrap()
    }

    #[test]
    fn test_legacy_user_is_normalized() {
        let u = user();
        assert_eq!(u.id, UserId::new(12));
        assert_eq!(u.phone, None);
        assert_eq!(u.postal_code.as_deref(), Some("560001"));
        assert_eq!(u.token.as_ref().map(AuthToken::expose), Some("demo-token"));

        let out = serde_json::to_value(&u).unwrap();
        assert_eq!(out["postalCode"], "560001");
        assert!(out.get("pincode").is_none());
        assert!(out.get("phone").is_none());
    }

    #[test]
    fn test_name_falls_back_to_email() {
        let u: User = serde_json::from_value(json!({"id": 1, "email": "b@c.in"})).unwrap();
        assert_eq!(u.name, "b@c.in");
        assert!(serde_json::from_value::<User>(json!({"id": 1})).is_err());
        assert!(serde_json::from_value::<User>(json!({"id": 1, "name": "x", "email": "bad"})).is_err());
    }

    #[test]
    fn test_merge_prefers_saved_non_empty_values() {
        let mut u = user();
        let saved = Profile {
            name: Some("Asha K".to_owned()),
            phone: Some("9876543210".to_owned()),
            city: Some("  ".to_owned()),
            postal_code: None,
            profile_image: None,
        };
        u.merge_profile(&saved);
        assert_eq!(u.name, "Asha K");
        assert_eq!(u.phone.as_deref(), Some("9876543210"));
        assert_eq!(u.city, None);
        assert_eq!(u.postal_code.as_deref(), Some("560001"));
    }

    #[test]
    fn test_profile_reads_pincode() {
        let p: Profile = serde_json::from_value(json!({"pincode": "110001"})).unwrap();
        assert_eq!(p.postal_code.as_deref(), Some("110001"));
        assert!(p.has_contact_details());
        assert!(!Profile::default().has_contact_details());
    }

    #[test]
    fn test_apply_profile_clears_with_empty_string() {
        let mut u = user();
        u.apply_profile(Profile {
            postal_code: Some(String::new()),
            city: Some("Pune".to_owned()),
            ..Profile::default()
        });
        assert_eq!(u.postal_code, None);
        assert_eq!(u.city.as_deref(), Some("Pune"));
        assert_eq!(u.name, "Asha");
    }

    #[test]
    fn test_email_index_is_case_folded() {
        let u = user();
        assert_eq!(
            u.index_keys(IndexName::Email),
            vec![IndexKey::from("asha@shop.in")]
        );
        assert!(u.index_keys(IndexName::OwnerId).is_empty());
    }
}
