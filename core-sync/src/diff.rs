//! # Diffing
//!
//! Compares the cleaned provider dataset with the local mirror and produces a
//! [`SyncPlan`]. Pure: no I/O, no clock, so every rule here is unit-testable.
//!
//! ## Rules
//!
//! - Firms and offices are matched by natural code.
//! - A firm's type never changes. A differing upstream type is reported as a
//!   `CRITICAL` warning and that firm's name and parent are left alone.
//! - A name already held by another local firm is not applied.
//! - A parent must be present upstream, must not be an `ADVOCATE` and must not
//!   itself have a parent. Otherwise the firm ends up without a parent.
//! - Text fields are compared with [`equivalent`], so `None`, `""` and
//!   whitespace-only all mean "no value".
//!
//! Record level problems that would make the apply phase fail (an unknown
//! firm type on a new firm, a name collision on create) are collected in
//! [`SyncPlan::errors`].

use bridge_traits::provider::{ProviderDataset, ProviderFirm, ProviderOffice};
use core_library::models::{Address, Firm, FirmType, Office};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::window::FetchWindow;

/// `true` when both values are absent or blank, or equal otherwise.
pub fn equivalent(a: Option<&str>, b: Option<&str>) -> bool {
    let a = a.filter(|v| !v.trim().is_empty());
    let b = b.filter(|v| !v.trim().is_empty());
    a == b
}

pub fn addresses_equivalent(a: &Address, b: &Address) -> bool {
    equivalent(a.line1.as_deref(), b.line1.as_deref())
        && equivalent(a.line2.as_deref(), b.line2.as_deref())
        && equivalent(a.line3.as_deref(), b.line3.as_deref())
        && equivalent(a.city.as_deref(), b.city.as_deref())
        && equivalent(a.postcode.as_deref(), b.postcode.as_deref())
}

/// Parent reference as sent by the provider. `""` and `"null"` mean none.
fn normalize_parent(parent: Option<&str>) -> Option<&str> {
    parent
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("null"))
}

fn office_address(office: &ProviderOffice) -> Address {
    Address::normalized(
        office.address_line1.as_deref(),
        office.address_line2.as_deref(),
        office.address_line3.as_deref(),
        office.city.as_deref(),
        office.postcode.as_deref(),
    )
}

// =============================================================================
// Plan
// =============================================================================

/// Local mirror as loaded at the start of a run
#[derive(Debug, Clone, Default)]
pub struct LocalState {
    pub firms: Vec<Firm>,
    pub offices: Vec<Office>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmCreate {
    pub code: String,
    pub name: String,
    pub firm_type: FirmType,
    /// Code of the parent, already validated
    pub parent_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmUpdate {
    /// Firm as stored locally
    pub current: Firm,
    pub name: String,
    pub parent_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeCreate {
    pub code: String,
    pub firm_code: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeUpdate {
    /// Office as stored locally
    pub current: Office,
    pub firm_code: String,
    pub address: Address,
    /// The office moves to another firm; its assignments are cleared
    pub firm_switched: bool,
}

/// Everything one run will change
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub firms_to_create: Vec<FirmCreate>,
    pub firms_to_update: Vec<FirmUpdate>,
    pub firms_to_deactivate: Vec<Firm>,
    pub firms_to_reactivate: Vec<Firm>,
    pub offices_to_create: Vec<OfficeCreate>,
    pub offices_to_update: Vec<OfficeUpdate>,
    pub offices_to_reactivate: Vec<Office>,
    /// Absent upstream; deleted or deactivated depending on assignments
    pub offices_to_remove: Vec<Office>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.firms_to_create.is_empty()
            && self.firms_to_update.is_empty()
            && self.firms_to_deactivate.is_empty()
            && self.firms_to_reactivate.is_empty()
            && self.offices_to_create.is_empty()
            && self.offices_to_update.is_empty()
            && self.offices_to_reactivate.is_empty()
            && self.offices_to_remove.is_empty()
    }

    pub fn preview(&self, window: FetchWindow) -> SyncPreview {
        SyncPreview {
            window,
            firms_to_create: self.firms_to_create.iter().map(|f| f.code.clone()).collect(),
            firms_to_update: self.firms_to_update.iter().map(|f| f.current.code.clone()).collect(),
            firms_to_deactivate: self.firms_to_deactivate.iter().map(|f| f.code.clone()).collect(),
            firms_to_reactivate: self.firms_to_reactivate.iter().map(|f| f.code.clone()).collect(),
            offices_to_create: self.offices_to_create.iter().map(|o| o.code.clone()).collect(),
            offices_to_update: self
                .offices_to_update
                .iter()
                .map(|o| o.current.code.clone())
                .collect(),
            offices_to_reactivate: self
                .offices_to_reactivate
                .iter()
                .map(|o| o.code.clone())
                .collect(),
            offices_to_remove: self.offices_to_remove.iter().map(|o| o.code.clone()).collect(),
            warnings: self.warnings.clone(),
            errors: self.errors.clone(),
        }
    }
}

/// Dry-run view of a plan, codes per category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPreview {
    pub window: FetchWindow,
    pub firms_to_create: Vec<String>,
    pub firms_to_update: Vec<String>,
    pub firms_to_deactivate: Vec<String>,
    pub firms_to_reactivate: Vec<String>,
    pub offices_to_create: Vec<String>,
    pub offices_to_update: Vec<String>,
    pub offices_to_reactivate: Vec<String>,
    pub offices_to_remove: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

// =============================================================================
// Diff
// =============================================================================

/// Build the plan that turns `local` into a mirror of `upstream`.
///
/// `upstream` must already have passed [`crate::integrity::check`].
pub fn plan(upstream: &ProviderDataset, local: &LocalState) -> SyncPlan {
    let mut plan = SyncPlan::default();

    let local_by_code: HashMap<&str, &Firm> =
        local.firms.iter().map(|f| (f.code.as_str(), f)).collect();
    let local_code_by_id: HashMap<&str, &str> = local
        .firms
        .iter()
        .map(|f| (f.id.as_str(), f.code.as_str()))
        .collect();
    let upstream_by_code: HashMap<&str, &ProviderFirm> =
        upstream.firms.iter().map(|f| (f.code.as_str(), f)).collect();

    let parents = resolve_parents(upstream, &local_by_code, &upstream_by_code, &mut plan.warnings);
    diff_firms(upstream, local, &local_by_code, &local_code_by_id, &parents, &mut plan);
    diff_offices(upstream, local, &local_code_by_id, &mut plan);

    plan
}

/// Effective parent code for every upstream firm.
fn resolve_parents<'a>(
    upstream: &'a ProviderDataset,
    local_by_code: &HashMap<&str, &Firm>,
    upstream_by_code: &HashMap<&str, &ProviderFirm>,
    warnings: &mut Vec<String>,
) -> HashMap<&'a str, Option<&'a str>> {
    // Pass 1: presence and type
    let mut provisional: HashMap<&str, Option<&str>> = HashMap::new();
    for firm in &upstream.firms {
        let parent = normalize_parent(firm.parent_code.as_deref()).and_then(|parent| {
            if parent == firm.code {
                warnings.push(format!("Firm {} cannot be its own parent", firm.code));
                return None;
            }

            let Some(candidate) = upstream_by_code.get(parent) else {
                warnings.push(format!(
                    "Parent firm {} not found for firm {}",
                    parent, firm.code
                ));
                return None;
            };

            let parent_type = local_by_code
                .get(parent)
                .map(|local| Some(local.firm_type))
                .unwrap_or_else(|| {
                    candidate
                        .firm_type
                        .as_deref()
                        .and_then(|t| t.parse::<FirmType>().ok())
                });
            if parent_type.is_some_and(|t| !t.can_be_parent()) {
                warnings.push(format!(
                    "Parent firm {} is ADVOCATE type and cannot be a parent for firm {}",
                    parent, firm.code
                ));
                return None;
            }

            Some(parent)
        });
        provisional.insert(firm.code.as_str(), parent);
    }

    // Pass 2: single-level hierarchy
    let mut effective = HashMap::with_capacity(provisional.len());
    for firm in &upstream.firms {
        let parent = provisional.get(firm.code.as_str()).copied().flatten();
        let parent = parent.filter(|parent| {
            let has_parent = provisional.get(parent).copied().flatten().is_some();
            if has_parent {
                warnings.push(format!(
                    "Parent firm {} already has parent - multi-level hierarchy not allowed for firm {}",
                    parent, firm.code
                ));
            }
            !has_parent
        });
        effective.insert(firm.code.as_str(), parent);
    }

    effective
}

fn diff_firms(
    upstream: &ProviderDataset,
    local: &LocalState,
    local_by_code: &HashMap<&str, &Firm>,
    local_code_by_id: &HashMap<&str, &str>,
    parents: &HashMap<&str, Option<&str>>,
    plan: &mut SyncPlan,
) {
    let mut claimed_names: HashMap<String, &str> = local
        .firms
        .iter()
        .map(|f| (f.name.trim().to_string(), f.code.as_str()))
        .collect();

    for firm in &upstream.firms {
        let parent_code = parents.get(firm.code.as_str()).copied().flatten();
        let upstream_type = firm.firm_type.as_deref().unwrap_or("").parse::<FirmType>();

        let Some(current) = local_by_code.get(firm.code.as_str()) else {
            let firm_type = match upstream_type {
                Ok(firm_type) => firm_type,
                Err(reason) => {
                    plan.errors
                        .push(format!("Failed to create firm {}: {}", firm.code, reason));
                    continue;
                }
            };

            let name = firm.name.trim();
            if let Some(holder) = claimed_names.get(name) {
                plan.errors.push(format!(
                    "Failed to create firm {}: name '{}' is already used by firm {}",
                    firm.code, name, holder
                ));
                continue;
            }
            claimed_names.insert(name.to_string(), firm.code.as_str());

            plan.firms_to_create.push(FirmCreate {
                code: firm.code.clone(),
                name: name.to_string(),
                firm_type,
                parent_code: parent_code.map(str::to_string),
            });
            continue;
        };

        if !current.active {
            plan.firms_to_reactivate.push((*current).clone());
        }

        match upstream_type {
            Err(reason) => {
                plan.errors
                    .push(format!("Failed to update firm {}: {}", firm.code, reason));
                continue;
            }
            Ok(firm_type) if firm_type != current.firm_type => {
                plan.warnings.push(format!(
                    "CRITICAL: Firm {} type change rejected: {} -> {}",
                    firm.code, current.firm_type, firm_type
                ));
                continue;
            }
            Ok(_) => {}
        }

        let mut name = current.name.clone();
        if !equivalent(Some(current.name.as_str()), Some(firm.name.as_str())) {
            let wanted = firm.name.trim();
            match claimed_names.get(wanted) {
                Some(holder) if *holder != current.code => {
                    plan.warnings.push(format!(
                        "Duplicate firm name '{}' for firm {} - name update skipped",
                        wanted, firm.code
                    ));
                }
                _ => {
                    claimed_names.insert(wanted.to_string(), current.code.as_str());
                    name = wanted.to_string();
                }
            }
        }

        let current_parent = current
            .parent_firm_id
            .as_deref()
            .and_then(|id| local_code_by_id.get(id).copied());

        if name != current.name || current_parent != parent_code {
            plan.firms_to_update.push(FirmUpdate {
                current: (*current).clone(),
                name,
                parent_code: parent_code.map(str::to_string),
            });
        }
    }

    let upstream_codes: HashSet<&str> = upstream.firms.iter().map(|f| f.code.as_str()).collect();
    plan.firms_to_deactivate = local
        .firms
        .iter()
        .filter(|f| f.active && !upstream_codes.contains(f.code.as_str()))
        .cloned()
        .collect();
}

fn diff_offices(
    upstream: &ProviderDataset,
    local: &LocalState,
    local_code_by_id: &HashMap<&str, &str>,
    plan: &mut SyncPlan,
) {
    let local_by_code: HashMap<&str, &Office> =
        local.offices.iter().map(|o| (o.code.as_str(), o)).collect();

    for office in &upstream.offices {
        let address = office_address(office);

        let Some(current) = local_by_code.get(office.code.as_str()) else {
            plan.offices_to_create.push(OfficeCreate {
                code: office.code.clone(),
                firm_code: office.firm_code.clone(),
                address,
            });
            continue;
        };

        let current_firm = local_code_by_id.get(current.firm_id.as_str()).copied();
        let firm_switched = current_firm != Some(office.firm_code.as_str());

        if firm_switched || !addresses_equivalent(&current.address, &address) {
            plan.offices_to_update.push(OfficeUpdate {
                current: (*current).clone(),
                firm_code: office.firm_code.clone(),
                address,
                firm_switched,
            });
        }

        if !current.active {
            plan.offices_to_reactivate.push((*current).clone());
        }
    }

    let upstream_codes: HashSet<&str> =
        upstream.offices.iter().map(|o| o.code.as_str()).collect();
    plan.offices_to_remove = local
        .offices
        .iter()
        .filter(|o| !upstream_codes.contains(o.code.as_str()))
        .cloned()
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn upstream_firm(code: &str, name: &str, firm_type: &str, parent: Option<&str>) -> ProviderFirm {
        ProviderFirm {
            code: code.to_string(),
            name: name.to_string(),
            firm_type: Some(firm_type.to_string()),
            parent_code: parent.map(str::to_string),
        }
    }

    fn upstream_office(code: &str, firm_code: &str, city: Option<&str>) -> ProviderOffice {
        ProviderOffice {
            code: code.to_string(),
            firm_code: firm_code.to_string(),
            address_line1: Some("1 High Street".to_string()),
            address_line2: Some(String::new()),
            address_line3: None,
            city: city.map(str::to_string),
            postcode: None,
        }
    }

    fn local_firm(code: &str, name: &str, firm_type: FirmType) -> Firm {
        Firm::new(code.to_string(), name.to_string(), firm_type, NOW)
    }

    fn local_office(code: &str, firm: &Firm, city: Option<&str>) -> Office {
        Office::new(
            code.to_string(),
            firm.id.clone(),
            Address::normalized(Some("1 High Street"), None, None, city, None),
            NOW,
        )
    }

    #[test]
    fn test_equivalent_treats_blank_as_absent() {
        assert!(equivalent(None, Some("")));
        assert!(equivalent(Some("   "), None));
        assert!(equivalent(Some("Leeds"), Some("Leeds")));
        assert!(!equivalent(Some("Leeds"), None));
        assert!(!equivalent(Some("Leeds"), Some("York")));
    }

    #[test]
    fn test_new_firm_and_office_are_created() {
        let upstream = ProviderDataset {
            firms: vec![upstream_firm("FRA", "Firm A", "Legal Services Provider", Some("null"))],
            offices: vec![upstream_office("0A001", "FRA", Some("Leeds"))],
        };

        let plan = plan(&upstream, &LocalState::default());

        assert_eq!(plan.firms_to_create.len(), 1);
        assert_eq!(plan.firms_to_create[0].firm_type, FirmType::LegalServicesProvider);
        assert_eq!(plan.firms_to_create[0].parent_code, None);
        assert_eq!(plan.offices_to_create[0].address.line2, None);
        assert!(plan.warnings.is_empty());
        assert!(plan.errors.is_empty());
    }

    #[test]
    fn test_matching_state_yields_empty_plan() {
        let firm = local_firm("FRA", "Firm A", FirmType::Chambers);
        let office = local_office("0A001", &firm, Some("Leeds"));
        let upstream = ProviderDataset {
            firms: vec![upstream_firm("FRA", " Firm A ", "CHAMBERS", None)],
            offices: vec![upstream_office("0A001", "FRA", Some("Leeds"))],
        };
        let local = LocalState {
            firms: vec![firm],
            offices: vec![office],
        };

        let plan = plan(&upstream, &local);

        assert!(plan.is_empty());
    }

    #[test]
    fn test_absent_firm_and_office_are_removed() {
        let kept = local_firm("FRA", "Firm A", FirmType::Chambers);
        let gone = local_firm("FRB", "Firm B", FirmType::Chambers);
        let kept_office = local_office("0A001", &kept, None);
        let gone_office = local_office("0B001", &gone, None);
        let upstream = ProviderDataset {
            firms: vec![upstream_firm("FRA", "Firm A", "CHAMBERS", None)],
            offices: vec![upstream_office("0A001", "FRA", None)],
        };
        let local = LocalState {
            firms: vec![kept, gone],
            offices: vec![kept_office, gone_office],
        };

        let plan = plan(&upstream, &local);

        assert_eq!(plan.firms_to_deactivate.len(), 1);
        assert_eq!(plan.firms_to_deactivate[0].code, "FRB");
        assert_eq!(plan.offices_to_remove.len(), 1);
        assert_eq!(plan.offices_to_remove[0].code, "0B001");
    }

    #[test]
    fn test_type_change_is_rejected() {
        let firm = local_firm("FRA", "Firm A", FirmType::Chambers);
        let office = local_office("0A001", &firm, None);
        let upstream = ProviderDataset {
            firms: vec![upstream_firm("FRA", "Renamed", "ADVOCATE", None)],
            offices: vec![upstream_office("0A001", "FRA", None)],
        };
        let local = LocalState {
            firms: vec![firm],
            offices: vec![office],
        };

        let plan = plan(&upstream, &local);

        assert!(plan.firms_to_update.is_empty());
        assert_eq!(
            plan.warnings,
            vec!["CRITICAL: Firm FRA type change rejected: CHAMBERS -> ADVOCATE".to_string()]
        );
    }

    #[test]
    fn test_empty_type_on_update_is_error() {
        let firm = local_firm("FRA", "Firm A", FirmType::Chambers);
        let office = local_office("0A001", &firm, None);
        let mut upstream_a = upstream_firm("FRA", "Firm A", "", None);
        upstream_a.firm_type = None;
        let upstream = ProviderDataset {
            firms: vec![upstream_a],
            offices: vec![upstream_office("0A001", "FRA", None)],
        };
        let local = LocalState {
            firms: vec![firm],
            offices: vec![office],
        };

        let plan = plan(&upstream, &local);

        assert_eq!(
            plan.errors,
            vec!["Failed to update firm FRA: firmType is empty or null".to_string()]
        );
    }

    #[test]
    fn test_duplicate_name_is_skipped() {
        let a = local_firm("FRA", "Firm A", FirmType::Chambers);
        let b = local_firm("FRB", "Firm B", FirmType::Chambers);
        let upstream = ProviderDataset {
            firms: vec![
                upstream_firm("FRA", "Firm A", "CHAMBERS", None),
                upstream_firm("FRB", "Firm A", "CHAMBERS", None),
            ],
            offices: vec![
                upstream_office("0A001", "FRA", None),
                upstream_office("0B001", "FRB", None),
            ],
        };
        let local = LocalState {
            offices: vec![local_office("0A001", &a, None), local_office("0B001", &b, None)],
            firms: vec![a, b],
        };

        let plan = plan(&upstream, &local);

        assert!(plan.firms_to_update.is_empty());
        assert_eq!(
            plan.warnings,
            vec!["Duplicate firm name 'Firm A' for firm FRB - name update skipped".to_string()]
        );
    }

    #[test]
    fn test_parent_rules() {
        let upstream = ProviderDataset {
            firms: vec![
                upstream_firm("TOP", "Top", "LEGAL SERVICES PROVIDER", None),
                upstream_firm("MID", "Mid", "CHAMBERS", Some("TOP")),
                upstream_firm("LOW", "Low", "CHAMBERS", Some("MID")),
                upstream_firm("ADV", "Adv", "ADVOCATE", None),
                upstream_firm("UNDER_ADV", "Under Adv", "CHAMBERS", Some("ADV")),
                upstream_firm("LOST", "Lost", "CHAMBERS", Some("NOWHERE")),
            ],
            offices: ["TOP", "MID", "LOW", "ADV", "UNDER_ADV", "LOST"]
                .iter()
                .enumerate()
                .map(|(i, firm)| upstream_office(&format!("O{}", i), firm, None))
                .collect(),
        };

        let plan = plan(&upstream, &LocalState::default());
        let parent_of = |code: &str| {
            plan.firms_to_create
                .iter()
                .find(|f| f.code == code)
                .and_then(|f| f.parent_code.clone())
        };

        assert_eq!(parent_of("MID").as_deref(), Some("TOP"));
        assert_eq!(parent_of("LOW"), None);
        assert_eq!(parent_of("UNDER_ADV"), None);
        assert_eq!(parent_of("LOST"), None);
        assert!(plan.warnings.contains(
            &"Parent firm MID already has parent - multi-level hierarchy not allowed for firm LOW"
                .to_string()
        ));
        assert!(plan.warnings.contains(
            &"Parent firm ADV is ADVOCATE type and cannot be a parent for firm UNDER_ADV"
                .to_string()
        ));
        assert!(plan
            .warnings
            .contains(&"Parent firm NOWHERE not found for firm LOST".to_string()));
    }

    #[test]
    fn test_office_switching_firm_is_flagged() {
        let a = local_firm("FRA", "Firm A", FirmType::Chambers);
        let b = local_firm("FRB", "Firm B", FirmType::Chambers);
        let upstream = ProviderDataset {
            firms: vec![
                upstream_firm("FRA", "Firm A", "CHAMBERS", None),
                upstream_firm("FRB", "Firm B", "CHAMBERS", None),
            ],
            offices: vec![
                upstream_office("0A001", "FRB", None),
                upstream_office("0B001", "FRB", None),
            ],
        };
        let local = LocalState {
            offices: vec![local_office("0A001", &a, None), local_office("0B001", &b, None)],
            firms: vec![a, b],
        };

        let plan = plan(&upstream, &local);

        assert_eq!(plan.offices_to_update.len(), 1);
        assert!(plan.offices_to_update[0].firm_switched);
        assert_eq!(plan.offices_to_update[0].firm_code, "FRB");
    }

    #[test]
    fn test_inactive_records_are_reactivated() {
        let mut firm = local_firm("FRA", "Firm A", FirmType::Chambers);
        firm.active = false;
        let mut office = local_office("0A001", &firm, Some("Leeds"));
        office.active = false;
        let upstream = ProviderDataset {
            firms: vec![upstream_firm("FRA", "Firm A", "CHAMBERS", None)],
            offices: vec![upstream_office("0A001", "FRA", Some("Leeds"))],
        };
        let local = LocalState {
            firms: vec![firm],
            offices: vec![office],
        };

        let plan = plan(&upstream, &local);

        assert_eq!(plan.firms_to_reactivate.len(), 1);
        assert_eq!(plan.offices_to_reactivate.len(), 1);
        assert!(plan.firms_to_update.is_empty());
        assert!(plan.offices_to_update.is_empty());
    }

    #[test]
    fn test_preview_lists_codes() {
        let upstream = ProviderDataset {
            firms: vec![upstream_firm("FRA", "Firm A", "CHAMBERS", None)],
            offices: vec![upstream_office("0A001", "FRA", None)],
        };
        let plan = plan(&upstream, &LocalState::default());
        let now = chrono::Utc::now();

        let preview = plan.preview(FetchWindow { from: now, to: now });

        assert_eq!(preview.firms_to_create, vec!["FRA".to_string()]);
        assert_eq!(preview.offices_to_create, vec!["0A001".to_string()]);
        assert!(preview.firms_to_deactivate.is_empty());
    }
}
