use serde::{Deserialize, Serialize};

use crate::registration::repo_types::Registration;
use crate::spreadsheet::{FileStats, SheetRow};

/// Request body for `POST /api/registration`. Every field is optional at the
/// wire level so that missing ones can be reported together.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<AddressInput>,
    pub interests: Option<Vec<String>>,
    pub newsletter: Option<bool>,
    pub terms_accepted: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressInput {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

/// Registration as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRegistration<'a> {
    #[serde(flatten)]
    pub registration: &'a Registration,
    pub full_name: String,
}

impl<'a> From<&'a Registration> for PublicRegistration<'a> {
    fn from(registration: &'a Registration) -> Self {
        Self {
            full_name: registration.full_name(),
            registration,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse<'a> {
    pub success: bool,
    pub message: &'static str,
    pub user: PublicRegistration<'a>,
    /// `None` when the spreadsheet copy could not be written.
    pub excel_file: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<'a> {
    pub success: bool,
    pub count: usize,
    pub users: Vec<PublicRegistration<'a>>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse<'a> {
    pub success: bool,
    pub user: PublicRegistration<'a>,
}

#[derive(Debug, Serialize)]
pub struct SheetRowsResponse {
    pub success: bool,
    pub count: usize,
    pub registrations: Vec<SheetRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub total_registrations: i64,
}

/// The two counts are computed independently and may disagree.
#[derive(Debug, Serialize)]
pub struct Stats {
    #[serde(rename = "mongoDB")]
    pub database: DatabaseStats,
    #[serde(rename = "excelFile")]
    pub spreadsheet: FileStats,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: Stats,
}
