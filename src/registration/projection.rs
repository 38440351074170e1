use crate::registration::repo_types::{format_date, Registration};
use crate::spreadsheet::ProjectedRow;

/// Flattens a record into spreadsheet cells, in header order.
pub fn project(r: &Registration) -> ProjectedRow {
    [
        r.first_name.clone(),
        r.last_name.clone(),
        r.email.clone(),
        r.phone.clone().unwrap_or_default(),
        format_date(r.date_of_birth),
        r.gender.as_str().to_string(),
        r.address.street.clone(),
        r.address.city.clone(),
        r.address.state.clone(),
        r.address.zip_code.clone(),
        r.address.country.clone(),
        r.interests.join(", "),
        if r.newsletter { "Yes" } else { "No" }.to_string(),
        format_date(r.registration_date.date()),
        format_date(r.last_updated.date()),
    ]
}
