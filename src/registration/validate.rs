use lazy_static::lazy_static;
use regex::Regex;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::registration::dto::RegistrationRequest;
use crate::registration::repo_types::{
    parse_date, Address, Gender, Registration, DEFAULT_COUNTRY,
};

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;
pub const PASSWORD_MIN_CHARS: usize = 6;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^(?-u:\w)+([.-]?(?-u:\w)+)*@(?-u:\w)+([.-]?(?-u:\w)+)*(\.(?-u:\w){2,3})+$")
            .unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[1-9][0-9]{0,15}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A submission that passed every rule, not yet hashed or persisted.
#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub date_of_birth: Date,
    pub gender: Gender,
    pub address: Address,
    pub interests: Vec<String>,
    pub newsletter: bool,
}

impl ValidRegistration {
    pub fn into_record(self, password_hash: String, now: OffsetDateTime) -> Registration {
        Registration {
            id: Uuid::new_v4(),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash,
            phone: self.phone,
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            address: self.address,
            interests: self.interests,
            newsletter: self.newsletter,
            terms_accepted: true,
            registration_date: now,
            last_updated: now,
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Messages for every required field that is absent or blank, in form order.
pub fn missing_required_fields(req: &RegistrationRequest) -> Vec<String> {
    let mut missing = Vec::new();
    let required = [
        (&req.first_name, "First name is required"),
        (&req.last_name, "Last name is required"),
        (&req.email, "Email is required"),
        (&req.password, "Password is required"),
        (&req.date_of_birth, "Date of birth is required"),
    ];
    for (value, message) in required {
        // passwords are not trimmed, but an all-blank one still counts as missing
        if present(value).is_none() {
            missing.push(message.to_string());
        }
    }
    if req.terms_accepted != Some(true) {
        missing.push("You must accept the terms and conditions".to_string());
    }
    missing
}

fn check_name(label: &str, value: &str, errors: &mut Vec<String>) {
    let len = value.chars().count();
    if len < NAME_MIN_CHARS {
        errors.push(format!("{label} must be at least {NAME_MIN_CHARS} characters"));
    } else if len > NAME_MAX_CHARS {
        errors.push(format!("{label} cannot exceed {NAME_MAX_CHARS} characters"));
    }
}

/// Applies every field rule and returns all violations at once.
pub fn validate(req: RegistrationRequest, today: Date) -> Result<ValidRegistration, Vec<String>> {
    let mut errors = missing_required_fields(&req);

    let first_name = present(&req.first_name).unwrap_or_default().to_string();
    let last_name = present(&req.last_name).unwrap_or_default().to_string();
    if !first_name.is_empty() {
        check_name("First name", &first_name, &mut errors);
    }
    if !last_name.is_empty() {
        check_name("Last name", &last_name, &mut errors);
    }

    let email = req.email.as_deref().map(normalize_email).unwrap_or_default();
    if !email.is_empty() && !is_valid_email(&email) {
        errors.push("Please enter a valid email".into());
    }

    let password = req.password.clone().unwrap_or_default();
    if present(&req.password).is_some() && password.chars().count() < PASSWORD_MIN_CHARS {
        errors.push(format!(
            "Password must be at least {PASSWORD_MIN_CHARS} characters long"
        ));
    }

    let phone = present(&req.phone).map(String::from);
    if let Some(p) = &phone {
        if !is_valid_phone(p) {
            errors.push("Please enter a valid phone number".into());
        }
    }

    let date_of_birth = match present(&req.date_of_birth) {
        Some(raw) => match parse_date(raw) {
            Some(d) if d > today => {
                errors.push("Date of birth cannot be in the future".into());
                None
            }
            Some(d) => Some(d),
            None => {
                errors.push("Date of birth must be a valid date".into());
                None
            }
        },
        None => None,
    };

    let gender = match present(&req.gender) {
        Some(raw) => Gender::parse(raw).unwrap_or_else(|| {
            errors.push(format!("`{raw}` is not a valid gender"));
            Gender::default()
        }),
        None => Gender::default(),
    };

    if !errors.is_empty() {
        return Err(errors);
    }
    let Some(date_of_birth) = date_of_birth else {
        return Err(vec!["Date of birth is required".into()]);
    };

    let addr = req.address.unwrap_or_default();
    let address = Address {
        street: present(&addr.street).unwrap_or_default().into(),
        city: present(&addr.city).unwrap_or_default().into(),
        state: present(&addr.state).unwrap_or_default().into(),
        zip_code: present(&addr.zip_code).unwrap_or_default().into(),
        country: present(&addr.country).unwrap_or(DEFAULT_COUNTRY).into(),
    };

    let interests = req
        .interests
        .unwrap_or_default()
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();

    Ok(ValidRegistration {
        first_name,
        last_name,
        email,
        password,
        phone,
        date_of_birth,
        gender,
        address,
        interests,
        newsletter: req.newsletter.unwrap_or(false),
    })
}
