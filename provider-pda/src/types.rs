//! PDA snapshot response types
//!
//! The snapshot endpoint returns one row per office with the owning firm's
//! details repeated on every row. Numeric identifiers sometimes arrive as
//! JSON numbers, so every field is read leniently into a string.

use bridge_traits::provider::{ProviderDataset, ProviderFirm, ProviderOffice};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{PdaError, Result};

/// `GET /api/v1/provider-offices/snapshot` response body
#[derive(Debug, Deserialize)]
pub struct SnapshotResponse {
    /// Required; a missing or non-array field is a parse failure
    pub offices: Vec<OfficeRow>,
}

/// One office row of the snapshot
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub firm_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub firm_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub firm_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub parent_firm_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub office_account_no: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub office_address_line1: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub office_address_line2: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub office_address_line3: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub office_address_city: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub office_address_postcode: Option<String>,
}

/// Accept strings, numbers and booleans; `null` becomes `None`.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a snapshot body into the provider-neutral dataset.
///
/// Firms are taken from the first row carrying each firm number. Offices keep
/// every row in order, so duplicate office numbers stay visible to the
/// integrity checks downstream. Rows without a firm or office number are
/// dropped.
pub fn parse_snapshot(body: &[u8]) -> Result<ProviderDataset> {
    let response: SnapshotResponse = serde_json::from_slice(body).map_err(|e| {
        PdaError::ParseError(format!("expected an object with an 'offices' array: {}", e))
    })?;

    let mut dataset = ProviderDataset::default();
    let mut seen_firms = HashSet::new();
    let mut skipped = 0usize;

    for row in response.offices {
        let (Some(firm_code), Some(office_code)) =
            (trimmed(&row.firm_number), trimmed(&row.office_account_no))
        else {
            skipped += 1;
            continue;
        };

        if seen_firms.insert(firm_code.clone()) {
            dataset.firms.push(ProviderFirm {
                code: firm_code.clone(),
                name: row.firm_name.clone().unwrap_or_default().trim().to_string(),
                firm_type: row.firm_type.clone(),
                parent_code: row.parent_firm_number.clone(),
            });
        }

        dataset.offices.push(ProviderOffice {
            code: office_code,
            firm_code,
            address_line1: row.office_address_line1,
            address_line2: row.office_address_line2,
            address_line3: row.office_address_line3,
            city: row.office_address_city,
            postcode: row.office_address_postcode,
        });
    }

    if skipped > 0 {
        warn!(skipped, "Snapshot rows without firm or office number were ignored");
    }
    debug!(
        firms = dataset.firms.len(),
        offices = dataset.offices.len(),
        "Snapshot parsed"
    );

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_become_strings() {
        let body = br#"{"offices":[{
            "firmNumber": 101, "firmName": "Firm A", "firmType": "Legal Services Provider",
            "parentFirmNumber": null, "officeAccountNo": "0A001",
            "officeAddressLine1": "1 High St", "officeAddressCity": "Leeds",
            "officeAddressPostcode": "LS1 1AA"
        }]}"#;

        let dataset = parse_snapshot(body).unwrap();

        assert_eq!(dataset.firms[0].code, "101");
        assert_eq!(dataset.firms[0].parent_code, None);
        assert_eq!(dataset.offices[0].firm_code, "101");
        assert_eq!(dataset.offices[0].address_line2, None);
    }

    #[test]
    fn test_first_row_per_firm_wins() {
        let body = br#"{"offices":[
            {"firmNumber":"FRA","firmName":"Firm A","firmType":"CHAMBERS","officeAccountNo":"0A001"},
            {"firmNumber":"FRA","firmName":"Firm A (old)","firmType":"ADVOCATE","officeAccountNo":"0A002"}
        ]}"#;

        let dataset = parse_snapshot(body).unwrap();

        assert_eq!(dataset.firms.len(), 1);
        assert_eq!(dataset.firms[0].name, "Firm A");
        assert_eq!(dataset.firms[0].firm_type.as_deref(), Some("CHAMBERS"));
        assert_eq!(dataset.offices.len(), 2);
    }

    #[test]
    fn test_rows_without_keys_are_dropped() {
        let body = br#"{"offices":[
            {"firmNumber":"","officeAccountNo":"0A001"},
            {"firmNumber":"FRA","firmName":"Firm A"}
        ]}"#;

        let dataset = parse_snapshot(body).unwrap();

        assert!(dataset.is_empty());
        assert!(dataset.firms.is_empty());
    }

    #[test]
    fn test_missing_offices_field_is_error() {
        assert!(matches!(
            parse_snapshot(br#"{"firms":[]}"#),
            Err(PdaError::ParseError(_))
        ));
        assert!(matches!(
            parse_snapshot(br#"{"offices":{"0A001":{}}}"#),
            Err(PdaError::ParseError(_))
        ));
        assert!(matches!(parse_snapshot(b"<html>"), Err(PdaError::ParseError(_))));
    }
}
