//! Resolver Integration Tests
//!
//! The three resolution policies against small registry tables.

use chrono::NaiveDate;
use reconbot::config::{BranchCodes, DelimiterSets, RegistrySettings};
use reconbot::core::{ResolveError, TaskResolver};
use reconbot::domain::{Request, RequestType};
use reconbot::registry::{RegistryRow, RegistryTable};

fn row(branch: &str, id: &str, inn: &str, kpp: &str, status: &str, personnel: &str) -> RegistryRow {
    RegistryRow::from_fields(["1", branch, "Co", id, inn, kpp, status, "", personnel, "", ""])
        .unwrap()
}

fn request(kind: RequestType) -> Request {
    Request {
        id: "SD100".to_string(),
        request_type: kind,
        branch: "North".to_string(),
        organization: Some("Org".to_string()),
        service: None,
        inn: Some("123".to_string()),
        kpp: Some("456".to_string()),
        doc_number: None,
        contract_refs: Vec::new(),
        period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        status: None,
        message: None,
    }
}

fn resolver() -> TaskResolver {
    let codes: BranchCodes = [("North", "1000"), ("South", "2000")].into_iter().collect();
    TaskResolver::new(codes, DelimiterSets::default(), RegistrySettings::default())
}

#[test]
fn test_single_counterparty_one_match() {
    let table = RegistryTable::from_rows(vec![
        row("North", "C1", "123", "456", "EDI", "P1/P2"),
        row("North", "C2", "123", "999", "EDI", "P3"),
        row("South", "C3", "123", "456", "EDI", "P4"),
    ]);

    let tasks = resolver()
        .resolve(&request(RequestType::SingleCounterparty), &table)
        .unwrap();

    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.counterparty_ids, vec!["C1"]);
    assert_eq!(task.signatory_ids, vec!["P1", "P2"]);
    assert!(task.contract_numbers.is_empty());
    assert_eq!(task.branch_code, "1000");
    assert_eq!(task.status, "EDI");
    assert_eq!(task.inn.as_deref(), Some("123"));
    assert!(!task.cross_branch);
}

#[test]
fn test_single_counterparty_two_matches_is_ambiguous() {
    // Identical rows are not collapsed before the uniqueness check
    let table = RegistryTable::from_rows(vec![
        row("North", "C1", "123", "456", "EDI", "P1"),
        row("North", "C1", "123", "456", "EDI", "P1"),
    ]);

    let err = resolver()
        .resolve(&request(RequestType::SingleCounterparty), &table)
        .unwrap_err();

    match err {
        ResolveError::AmbiguousMatch { ref candidates, .. } => assert_eq!(candidates.len(), 2),
        other => panic!("expected AmbiguousMatch, got {:?}", other),
    }
    assert!(err.to_string().starts_with("Ambiguous match"));
}

#[test]
fn test_single_counterparty_no_match() {
    let table = RegistryTable::from_rows(vec![row("South", "C1", "123", "456", "EDI", "P1")]);

    let err = resolver()
        .resolve(&request(RequestType::SingleCounterparty), &table)
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoMatch { .. }));
}

#[test]
fn test_single_contract_carries_contract_numbers() {
    let table = RegistryTable::from_rows(vec![row("North", "C1", "123", "456", "non-EDI", "P1")]);
    let mut req = request(RequestType::SingleContract);
    req.contract_refs = vec!["100/2024; 200".to_string(), "100".to_string()];

    let tasks = resolver().resolve(&req, &table).unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].contract_numbers, vec!["100", "2024", "200"]);
    assert_eq!(tasks[0].signatory_ids, vec!["P1"]);
}

#[test]
fn test_single_counterparty_blank_signatory() {
    let table = RegistryTable::from_rows(vec![row("North", "C1", "123", "456", "EDI", " ; ")]);

    let err = resolver()
        .resolve(&request(RequestType::SingleCounterparty), &table)
        .unwrap_err();
    assert!(matches!(err, ResolveError::EmptySignatory(ref id) if id == "C1"));
}

#[test]
fn test_unmapped_branch() {
    let table = RegistryTable::from_rows(vec![row("East", "C1", "123", "456", "EDI", "P1")]);
    let mut req = request(RequestType::SingleCounterparty);
    req.branch = "East".to_string();

    let err = resolver().resolve(&req, &table).unwrap_err();
    assert!(matches!(err, ResolveError::UnmappedBranch(ref b) if b == "East"));
}

#[test]
fn test_full_inventory_one_task_per_nonempty_pair() {
    let table = RegistryTable::from_rows(vec![
        row("North", "C1", "1", "1", "EDI", "P1"),
        row("North", "C2", "2", "2", "EDI", "p1"),
        row("North", "C3", "3", "3", "non-EDI", "P2"),
        row("North", "C3", "3", "3", "non-EDI", "P2"),
        row("North", "C4", "4", "4", "EDI", ""),
        row("South", "C5", "5", "5", "EDI", "P1"),
    ]);

    let tasks = resolver()
        .resolve(&request(RequestType::FullInventory), &table)
        .unwrap();

    // Two signatories x two statuses, but only two pairs have counterparties
    assert_eq!(tasks.len(), 2);

    let p1 = &tasks[0];
    assert_eq!(p1.signatory_ids, vec!["P1"]);
    assert_eq!(p1.status, "EDI");
    assert_eq!(p1.counterparty_ids, vec!["C1", "C2"]);
    assert_eq!(p1.inn, None);
    assert_eq!(p1.kpp, None);
    assert!(p1.contract_numbers.is_empty());

    let p2 = &tasks[1];
    assert_eq!(p2.signatory_ids, vec!["P2"]);
    assert_eq!(p2.status, "non-EDI");
    assert_eq!(p2.counterparty_ids, vec!["C3"]);
}

#[test]
fn test_full_inventory_bounded_by_signatories_and_statuses() {
    let mut rows = Vec::new();
    for signatory in ["P1", "P2", "P3"] {
        for status in ["EDI", "non-EDI", "other"] {
            rows.push(row("North", &format!("{}-{}", signatory, status), "1", "1", status, signatory));
        }
    }
    let table = RegistryTable::from_rows(rows);

    let tasks = resolver()
        .resolve(&request(RequestType::FullInventory), &table)
        .unwrap();

    // Rows with a status outside the fixed pair never produce a task
    assert_eq!(tasks.len(), 6);
    assert!(tasks.iter().all(|t| t.status != "other"));
    assert!(tasks.iter().all(|t| !t.counterparty_ids.is_empty()));
}

#[test]
fn test_full_inventory_without_rows_is_empty() {
    let table = RegistryTable::from_rows(vec![row("South", "C1", "1", "1", "EDI", "P1")]);

    let tasks = resolver()
        .resolve(&request(RequestType::FullInventory), &table)
        .unwrap();
    assert!(tasks.is_empty());
}
