//! Domain models for the firm/office mirror
//!
//! Firms and offices are keyed locally by a uuid string and matched against
//! the provider by their natural `code`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// Firm Type
// =============================================================================

/// Kind of firm. Immutable once a firm exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FirmType {
    LegalServicesProvider,
    Chambers,
    Advocate,
}

impl FirmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirmType::LegalServicesProvider => "LEGAL_SERVICES_PROVIDER",
            FirmType::Chambers => "CHAMBERS",
            FirmType::Advocate => "ADVOCATE",
        }
    }

    /// Advocates can never sit above another firm.
    pub fn can_be_parent(&self) -> bool {
        !matches!(self, FirmType::Advocate)
    }
}

impl fmt::Display for FirmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FirmType {
    type Err = String;

    /// Accepts provider labels such as `"Legal Services Provider"` as well as
    /// the stored form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(' ', "_");
        match normalized.as_str() {
            "LEGAL_SERVICES_PROVIDER" => Ok(FirmType::LegalServicesProvider),
            "CHAMBERS" => Ok(FirmType::Chambers),
            "ADVOCATE" => Ok(FirmType::Advocate),
            "" => Err("firmType is empty or null".to_string()),
            other => Err(format!("unknown firmType '{}'", other)),
        }
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Firm mirrored from the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firm {
    /// Local identifier
    pub id: String,
    /// Provider firm number (natural key)
    pub code: String,
    /// Display name, unique across firms
    pub name: String,
    pub firm_type: FirmType,
    /// Local id of the parent firm
    pub parent_firm_id: Option<String>,
    pub active: bool,
    /// Creation timestamp (Unix seconds)
    pub created_at: i64,
    /// Last update timestamp (Unix seconds)
    pub updated_at: i64,
}

impl Firm {
    /// Create a new active firm without a parent
    pub fn new(code: String, name: String, firm_type: FirmType, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code,
            name,
            firm_type,
            parent_firm_id: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate firm data
    pub fn validate(&self) -> Result<(), String> {
        if self.code.trim().is_empty() {
            return Err("Firm code cannot be empty".to_string());
        }

        if self.name.trim().is_empty() {
            return Err(format!("Firm {} name cannot be empty", self.code));
        }

        if self.parent_firm_id.as_deref() == Some(self.id.as_str()) {
            return Err(format!("Firm {} cannot be its own parent", self.code));
        }

        Ok(())
    }
}

/// Postal address of an office. Blank parts are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub line3: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
}

impl Address {
    /// Build an address, turning blank parts into `None`.
    pub fn normalized(
        line1: Option<&str>,
        line2: Option<&str>,
        line3: Option<&str>,
        city: Option<&str>,
        postcode: Option<&str>,
    ) -> Self {
        Self {
            line1: non_blank(line1),
            line2: non_blank(line2),
            line3: non_blank(line3),
            city: non_blank(city),
            postcode: non_blank(postcode),
        }
    }
}

/// `None` for missing, empty or whitespace-only values.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Office belonging to exactly one firm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    pub id: String,
    /// Provider office account number (natural key)
    pub code: String,
    pub firm_id: String,
    pub address: Address,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Office {
    pub fn new(code: String, firm_id: String, address: Address, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code,
            firm_id,
            address,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.code.trim().is_empty() {
            return Err("Office code cannot be empty".to_string());
        }

        if self.firm_id.trim().is_empty() {
            return Err(format!("Office {} must belong to a firm", self.code));
        }

        Ok(())
    }
}

/// User to office association maintained by the user module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeAssignment {
    pub user_id: String,
    pub office_id: String,
    /// Unix seconds
    pub assigned_at: i64,
}

/// Watermark of the last fully successful sync window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub last_successful_from: DateTime<Utc>,
    pub last_successful_to: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
