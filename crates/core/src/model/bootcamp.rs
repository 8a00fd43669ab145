use crate::config::{
    DEFAULT_PHOTO, MAX_BOOTCAMP_DESCRIPTION_LEN, MAX_BOOTCAMP_NAME_LEN, MAX_PHONE_LEN,
};
use crate::document::{FieldValue, Fields};
use crate::model::location::GeocodedAddress;
use crate::model::{ModelError, Violations};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// Allowed values of `careers`.
pub const CAREERS: [&str; 6] = [
    "Web Development",
    "Mobile Development",
    "UI/UX",
    "Data Science",
    "Business",
    "Other",
];

static WEBSITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_+.~#?&/=]*)",
    )
    .expect("valid website regex")
});

pub(crate) static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
    )
    .expect("valid email regex")
});

/// Client-supplied bootcamp fields. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootcampInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Geocoded into `location`; never stored.
    pub address: Option<String>,
    pub careers: Option<Vec<String>>,
    pub housing: Option<bool>,
    pub job_assistance: Option<bool>,
    pub job_guarantee: Option<bool>,
    pub accept_gi: Option<bool>,
}

/// Lowercase, hyphen-separated form of a name: `"Devworks Bootcamp"` becomes
/// `"devworks-bootcamp"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn check_supplied(input: &BootcampInput, v: &mut Violations) {
    if let Some(name) = &input.name {
        let name = name.trim();
        v.check(!name.is_empty(), "Please add a name");
        v.check(
            name.chars().count() <= MAX_BOOTCAMP_NAME_LEN,
            "Name can not be longer than 50 characters",
        );
    }
    if let Some(description) = &input.description {
        v.check(!description.trim().is_empty(), "Please add a description");
        v.check(
            description.chars().count() <= MAX_BOOTCAMP_DESCRIPTION_LEN,
            "Description can not be longer than 500 characters",
        );
    }
    if let Some(website) = &input.website {
        v.check(WEBSITE_RE.is_match(website), "Please use a valid URL with HTTP or HTTPS");
    }
    if let Some(phone) = &input.phone {
        v.check(
            phone.chars().count() <= MAX_PHONE_LEN,
            "Phone number can not be longer than 20 characters",
        );
    }
    if let Some(email) = &input.email {
        v.check(EMAIL_RE.is_match(email), "Please add a valid email");
    }
    if let Some(address) = &input.address {
        v.check(!address.trim().is_empty(), "Please add an address");
    }
    if let Some(careers) = &input.careers {
        v.check(!careers.is_empty(), "Please add at least one career");
        for career in careers {
            if !CAREERS.contains(&career.as_str()) {
                v.0.push(format!("'{career}' is not a valid career"));
            }
        }
    }
}

/// Validate a full bootcamp for creation.
pub fn validate_create(input: &BootcampInput) -> Result<(), ModelError> {
    let mut v = Violations::default();
    v.check(input.name.is_some(), "Please add a name");
    v.check(input.description.is_some(), "Please add a description");
    v.check(input.address.is_some(), "Please add an address");
    v.check(input.careers.is_some(), "Please add at least one career");
    check_supplied(input, &mut v);
    v.into_result()
}

/// Validate the fields present in an update.
pub fn validate_update(input: &BootcampInput) -> Result<(), ModelError> {
    let mut v = Violations::default();
    check_supplied(input, &mut v);
    v.into_result()
}

fn supplied_fields(input: BootcampInput) -> Fields {
    let mut fields = Fields::new();
    if let Some(name) = input.name {
        let name = name.trim().to_string();
        fields.insert("slug".into(), FieldValue::String(slugify(&name)));
        fields.insert("name".into(), FieldValue::String(name));
    }
    let strings = [
        ("description", input.description),
        ("website", input.website),
        ("phone", input.phone),
        ("email", input.email),
    ];
    for (key, value) in strings {
        if let Some(v) = value {
            fields.insert(key.into(), FieldValue::String(v));
        }
    }
    if let Some(careers) = input.careers {
        fields.insert(
            "careers".into(),
            FieldValue::Array(careers.into_iter().map(FieldValue::String).collect()),
        );
    }
    let flags = [
        ("housing", input.housing),
        ("jobAssistance", input.job_assistance),
        ("jobGuarantee", input.job_guarantee),
        ("acceptGi", input.accept_gi),
    ];
    for (key, value) in flags {
        if let Some(b) = value {
            fields.insert(key.into(), FieldValue::Boolean(b));
        }
    }
    fields
}

/// Fields of a new bootcamp: validated input, defaults, slug and location.
pub fn create_fields(
    input: BootcampInput,
    location: Option<&GeocodedAddress>,
) -> Result<Fields, ModelError> {
    validate_create(&input)?;
    let mut fields = supplied_fields(input);
    fields
        .entry("photo".into())
        .or_insert_with(|| FieldValue::String(DEFAULT_PHOTO.into()));
    for flag in ["housing", "jobAssistance", "jobGuarantee", "acceptGi"] {
        fields
            .entry(flag.into())
            .or_insert(FieldValue::Boolean(false));
    }
    if let Some(geo) = location {
        fields.insert("location".into(), geo.to_location());
    }
    Ok(fields)
}

/// Changes for an existing bootcamp. A new name re-derives the slug. A new
/// address replaces the location, or clears it when the address found no
/// geocoder match.
pub fn update_fields(
    input: BootcampInput,
    location: Option<&GeocodedAddress>,
) -> Result<Fields, ModelError> {
    validate_update(&input)?;
    let readdressed = input.address.is_some();
    let mut fields = supplied_fields(input);
    match location {
        Some(geo) => {
            fields.insert("location".into(), geo.to_location());
        }
        None if readdressed => {
            fields.insert("location".into(), FieldValue::Null);
        }
        None => {}
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> BootcampInput {
        BootcampInput {
            name: Some("  Devworks Bootcamp ".into()),
            description: Some("Devworks is a full stack JavaScript Bootcamp".into()),
            website: Some("https://devworks.com".into()),
            phone: Some("(111) 111-1111".into()),
            email: Some("enroll@devworks.com".into()),
            address: Some("233 Bay State Rd Boston MA 02215".into()),
            careers: Some(vec!["Web Development".into(), "UI/UX".into()]),
            housing: Some(true),
            ..BootcampInput::default()
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Devworks Bootcamp"), "devworks-bootcamp");
        assert_eq!(slugify("  ModernTech -- Bootcamp!"), "moderntech-bootcamp");
        assert_eq!(slugify("Codemasters"), "codemasters");
    }

    #[test]
    fn test_create_fields_defaults_and_slug() {
        let fields = create_fields(valid(), None).unwrap();
        assert_eq!(fields["name"], FieldValue::String("Devworks Bootcamp".into()));
        assert_eq!(fields["slug"], FieldValue::String("devworks-bootcamp".into()));
        assert_eq!(fields["photo"], FieldValue::String("no-photo.jpg".into()));
        assert_eq!(fields["housing"], FieldValue::Boolean(true));
        assert_eq!(fields["acceptGi"], FieldValue::Boolean(false));
        assert!(!fields.contains_key("address"));
    }

    #[test]
    fn test_create_requires_fields() {
        let err = create_fields(BootcampInput::default(), None).unwrap_err();
        let ModelError::Validation(msgs) = err;
        assert!(msgs.contains(&"Please add a name".to_string()));
        assert!(msgs.contains(&"Please add a description".to_string()));
        assert!(msgs.contains(&"Please add an address".to_string()));
    }

    #[test]
    fn test_field_rules() {
        let input = BootcampInput {
            name: Some("x".repeat(51)),
            website: Some("devworks.com".into()),
            email: Some("not-an-email".into()),
            careers: Some(vec!["Basket Weaving".into()]),
            ..BootcampInput::default()
        };
        let ModelError::Validation(msgs) = validate_update(&input).unwrap_err();
        assert_eq!(msgs.len(), 4);
    }

    #[test]
    fn test_update_only_supplied() {
        let fields = update_fields(
            BootcampInput {
                name: Some("New Name".into()),
                ..BootcampInput::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["slug"], FieldValue::String("new-name".into()));
    }

    #[test]
    fn test_unmatched_address_clears_location() {
        let fields = update_fields(
            BootcampInput {
                address: Some("1 Nowhere Lane, Atlantis".into()),
                ..BootcampInput::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(fields["location"], FieldValue::Null);
        assert!(!fields.contains_key("address"));
    }

    #[test]
    fn test_location_attached() {
        let geo = GeocodedAddress {
            latitude: 42.35,
            longitude: -71.1,
            formatted_address: None,
            street_name: None,
            city: Some("Boston".into()),
            state: Some("MA".into()),
            zipcode: Some("02215".into()),
            country: Some("US".into()),
        };
        let fields = create_fields(valid(), Some(&geo)).unwrap();
        let loc = fields["location"].to_json();
        assert_eq!(loc["coordinates"], serde_json::json!([-71.1, 42.35]));
        assert_eq!(loc["state"], "MA");
    }
}
