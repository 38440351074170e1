use serde::Serialize;
use sqlx::FromRow;
use time::{macros::format_description, Date, OffsetDateTime};
use uuid::Uuid;

pub const DEFAULT_COUNTRY: &str = "United States";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    PreferNotToSay,
}

impl Gender {
    pub const ALL: [Gender; 4] = [
        Gender::Male,
        Gender::Female,
        Gender::Other,
        Gender::PreferNotToSay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::PreferNotToSay => "prefer-not-to-say",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl Default for Address {
    fn default() -> Self {
        Self {
            street: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
            country: DEFAULT_COUNTRY.into(),
        }
    }
}

/// A persisted registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed in JSON
    pub phone: Option<String>,
    #[serde(serialize_with = "iso_date::serialize")]
    pub date_of_birth: Date,
    pub gender: Gender,
    pub address: Address,
    pub interests: Vec<String>,
    pub newsletter: bool,
    pub terms_accepted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub registration_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl Registration {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Flat row shape of the `registrations` table.
#[derive(Debug, FromRow)]
pub struct RegistrationRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub date_of_birth: Date,
    pub gender: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub interests: Vec<String>,
    pub newsletter: bool,
    pub terms_accepted: bool,
    pub registration_date: OffsetDateTime,
    pub last_updated: OffsetDateTime,
}

impl From<RegistrationRow> for Registration {
    fn from(r: RegistrationRow) -> Self {
        Self {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            password_hash: r.password_hash,
            phone: r.phone,
            date_of_birth: r.date_of_birth,
            // the table carries a CHECK constraint, so this only falls back on hand-edited rows
            gender: Gender::parse(&r.gender).unwrap_or_default(),
            address: Address {
                street: r.street,
                city: r.city,
                state: r.state,
                zip_code: r.zip_code,
                country: r.country,
            },
            interests: r.interests,
            newsletter: r.newsletter,
            terms_accepted: r.terms_accepted,
            registration_date: r.registration_date,
            last_updated: r.last_updated,
        }
    }
}

pub mod iso_date {
    use serde::Serializer;
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }
}

pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

pub fn parse_date(raw: &str) -> Option<Date> {
    if let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        return Some(date);
    }
    OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
        .ok()
        .map(|ts| ts.date())
}
