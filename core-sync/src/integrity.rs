//! Provider data integrity checks
//!
//! Runs before diffing. Nothing here fails a run; problems are reported as
//! warnings and the offending rows are dropped so the diff only ever sees a
//! self-consistent dataset.

use bridge_traits::provider::{ProviderDataset, ProviderFirm, ProviderOffice};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Clean `dataset` and report what was removed.
///
/// - duplicate firm codes keep their first row
/// - duplicate office codes keep their last row, at the position of the first
/// - offices whose firm is absent are dropped
/// - firms left without offices are dropped
pub fn check(dataset: ProviderDataset, warnings: &mut Vec<String>) -> ProviderDataset {
    let total_firms = dataset.firms.len();
    let mut seen_firms = HashSet::new();
    let firms: Vec<ProviderFirm> = dataset
        .firms
        .into_iter()
        .filter(|firm| seen_firms.insert(firm.code.clone()))
        .collect();

    let duplicate_firms = total_firms - firms.len();
    if duplicate_firms > 0 {
        warn!(count = duplicate_firms, "Duplicate firm codes in provider data");
        warnings.push(format!("Found {} duplicate firm codes", duplicate_firms));
    }

    let total_offices = dataset.offices.len();
    let mut office_index: HashMap<String, usize> = HashMap::new();
    let mut offices: Vec<ProviderOffice> = Vec::with_capacity(total_offices);
    for office in dataset.offices {
        match office_index.get(&office.code) {
            Some(&index) => offices[index] = office,
            None => {
                office_index.insert(office.code.clone(), offices.len());
                offices.push(office);
            }
        }
    }

    let duplicate_offices = total_offices - offices.len();
    if duplicate_offices > 0 {
        warn!(count = duplicate_offices, "Duplicate office codes in provider data");
        warnings.push(format!("Found {} duplicate office codes", duplicate_offices));
    }

    let before = offices.len();
    offices.retain(|office| seen_firms.contains(&office.firm_code));
    let orphans = before - offices.len();
    if orphans > 0 {
        warn!(count = orphans, "Orphan offices in provider data");
        warnings.push(format!("Removed {} orphan offices", orphans));
    }

    let firms_with_offices: HashSet<&str> =
        offices.iter().map(|office| office.firm_code.as_str()).collect();
    let before = firms.len();
    let firms: Vec<ProviderFirm> = firms
        .into_iter()
        .filter(|firm| firms_with_offices.contains(firm.code.as_str()))
        .collect();
    let empty_firms = before - firms.len();
    if empty_firms > 0 {
        warn!(count = empty_firms, "Provider firms without offices");
        warnings.push(format!("Removed {} firms without offices", empty_firms));
    }

    ProviderDataset { firms, offices }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firm(code: &str, name: &str) -> ProviderFirm {
        ProviderFirm {
            code: code.to_string(),
            name: name.to_string(),
            firm_type: Some("CHAMBERS".to_string()),
            parent_code: None,
        }
    }

    fn office(code: &str, firm_code: &str, city: &str) -> ProviderOffice {
        ProviderOffice {
            code: code.to_string(),
            firm_code: firm_code.to_string(),
            address_line1: None,
            address_line2: None,
            address_line3: None,
            city: Some(city.to_string()),
            postcode: None,
        }
    }

    #[test]
    fn test_clean_dataset_has_no_warnings() {
        let dataset = ProviderDataset {
            firms: vec![firm("F1", "One")],
            offices: vec![office("O1", "F1", "Leeds")],
        };
        let mut warnings = Vec::new();

        let cleaned = check(dataset.clone(), &mut warnings);

        assert_eq!(cleaned, dataset);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_duplicates_are_counted() {
        let dataset = ProviderDataset {
            firms: vec![firm("F1", "First"), firm("F1", "Second")],
            offices: vec![
                office("O1", "F1", "Leeds"),
                office("O2", "F1", "York"),
                office("O1", "F1", "Hull"),
            ],
        };
        let mut warnings = Vec::new();

        let cleaned = check(dataset, &mut warnings);

        assert_eq!(cleaned.firms.len(), 1);
        assert_eq!(cleaned.firms[0].name, "First");
        assert_eq!(cleaned.offices.len(), 2);
        assert_eq!(cleaned.offices[0].city.as_deref(), Some("Hull"));
        assert!(warnings.contains(&"Found 1 duplicate firm codes".to_string()));
        assert!(warnings.contains(&"Found 1 duplicate office codes".to_string()));
    }

    #[test]
    fn test_orphans_and_empty_firms_are_removed() {
        let dataset = ProviderDataset {
            firms: vec![firm("F1", "One"), firm("F2", "Two"), firm("F3", "Three")],
            offices: vec![
                office("O1", "F1", "Leeds"),
                office("O2", "GONE", "York"),
                office("O3", "GONE", "Hull"),
            ],
        };
        let mut warnings = Vec::new();

        let cleaned = check(dataset, &mut warnings);

        assert_eq!(cleaned.firms.len(), 1);
        assert_eq!(cleaned.offices.len(), 1);
        assert_eq!(
            warnings,
            vec![
                "Removed 2 orphan offices".to_string(),
                "Removed 2 firms without offices".to_string(),
            ]
        );
    }
}
