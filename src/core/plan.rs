//! Interaction plans.
//!
//! What the executor does inside a session is data, not code: a header
//! plan filling the selection screen, one report plan per account
//! category, and a document-generation plan naming the signatories.
//! Addresses are logical names; the collaborator bridge maps them onto the
//! external system's controls.

use serde::Serialize;

use crate::domain::{RequestType, Task};

/// Logical control addresses understood by the collaborator bridge
pub mod address {
    pub const COMPANY_CODE: &str = "selection.company_code";
    pub const PERIOD_FROM: &str = "selection.period_from";
    pub const PERIOD_TO: &str = "selection.period_to";
    pub const COUNTERPARTY: &str = "selection.counterparty";
    pub const COUNTERPARTY_LIST: &str = "selection.counterparty_list";
    pub const CONTRACT_LIST: &str = "selection.contract_list";
    pub const ACCOUNT_MASK: &str = "selection.account";
    pub const ACCOUNT_LIST: &str = "selection.account_list";

    pub const SCOPE_OTHER: &str = "scope.other";
    pub const OPT_BALANCES: &str = "option.balances";
    pub const OPT_PREPAYMENTS: &str = "option.prepayments";
    pub const OPT_ALL_ITEMS: &str = "option.all_items";
    pub const OPT_BY_ACCOUNT: &str = "option.by_account";
    pub const OPT_CURRENCY: &str = "option.currency";
    pub const OPT_DETAIL: &str = "option.detail";
    pub const OPT_AGREEMENTS: &str = "option.agreements";
    pub const OPT_ZERO_LINES: &str = "option.zero_lines";

    pub const REPORT_EXECUTE: &str = "report.execute";
    pub const PRINT_FORM: &str = "print_form.selection";
    pub const PRINT_FORM_CONFIRM: &str = "print_form.confirm";

    pub const DOCUMENTS_GENERATE: &str = "documents.generate";
    pub const SIGNATORY_HEAD: &str = "signatory.head";
    pub const SIGNATORY_ACCOUNTANT: &str = "signatory.accountant";
    pub const DOCUMENTS_CONFIRM: &str = "documents.confirm";

    pub const NAVIGATION_BACK: &str = "navigation.back";
}

/// Receivables accounts (62xx)
pub const ACCOUNTS_62: &[&str] = &[
    "6201010101", "6201010201", "6201010301", "6201010401", "6201010501", "6201010601",
    "6201020101", "6201030101", "6201030201", "6201030301", "6201030401", "6201030501",
    "6201030601", "6201030701", "6201040201", "6201040301", "6201110101", "6201130101",
    "6202010101", "6202010201", "6202010301", "6202010401", "6202010501", "6202010601",
    "6202020101", "6202030101", "6202030201", "6202030301", "6202030401", "6202030501",
    "6202030601", "6202030701", "6202040201", "6202040301", "6202110101", "6202120101",
    "6202130101",
];

/// Other settlements accounts (76xx)
pub const ACCOUNTS_76: &[&str] = &[
    "7602020101", "7602040101", "7611010101", "7615020101", "7602010102", "7602020102",
    "7602030102", "7602010101", "7602040102", "7615020102", "760903*",
];

/// Categories processed for full inventory tasks
pub const INVENTORY_CATEGORIES: &[&str] = &["60", "62", "76"];

/// Single category covering every account of a single-counterparty task
pub const ALL_ACCOUNTS: &str = "*";

/// Index of the reconciliation statement in the printable-form list
const RECONCILIATION_FORM: &str = "2";

/// One interaction with the external system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SetField { address: String, value: String },
    SetFlag { address: String, on: bool },
    Press { address: String },
    PasteList { address: String, values: Vec<String> },
}

impl Action {
    pub fn set(address: &str, value: impl Into<String>) -> Self {
        Self::SetField {
            address: address.to_string(),
            value: value.into(),
        }
    }

    pub fn flag(address: &str, on: bool) -> Self {
        Self::SetFlag {
            address: address.to_string(),
            on,
        }
    }

    pub fn press(address: &str) -> Self {
        Self::Press {
            address: address.to_string(),
        }
    }

    pub fn paste<I, S>(address: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::PasteList {
            address: address.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Self::SetField { address, .. }
            | Self::SetFlag { address, .. }
            | Self::Press { address }
            | Self::PasteList { address, .. } => address,
        }
    }
}

/// Report run for one account category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryPlan {
    /// Category code (`60`, `62`, `76` or `*`)
    pub code: String,
    pub actions: Vec<Action>,
}

/// Everything the executor feeds the collaborator for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionPlan {
    pub header: Vec<Action>,
    pub categories: Vec<CategoryPlan>,
    /// Document generation, repeated after each category report
    pub documents: Vec<Action>,
}

impl InteractionPlan {
    /// Build the plan for a task
    pub fn for_task(task: &Task) -> Self {
        let codes: &[&str] = match task.kind {
            RequestType::FullInventory => INVENTORY_CATEGORIES,
            RequestType::SingleCounterparty | RequestType::SingleContract => &[ALL_ACCOUNTS],
        };

        Self {
            header: header(task),
            categories: codes.iter().map(|code| category(code)).collect(),
            documents: documents(task),
        }
    }

    pub fn category_codes(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.code.as_str()).collect()
    }
}

fn header(task: &Task) -> Vec<Action> {
    use address::*;

    let mut actions = vec![
        Action::set(COMPANY_CODE, task.branch_code.as_str()),
        Action::set(PERIOD_FROM, task.period_start.format("%d.%m.%Y").to_string()),
        Action::set(PERIOD_TO, task.period_end.format("%d.%m.%Y").to_string()),
        Action::flag(SCOPE_OTHER, true),
        Action::flag(OPT_BALANCES, false),
        Action::flag(OPT_PREPAYMENTS, false),
    ];

    let first_counterparty = task.counterparty_ids.first().cloned().unwrap_or_default();

    match task.kind {
        RequestType::FullInventory => actions.extend([
            Action::flag(OPT_ALL_ITEMS, true),
            Action::flag(OPT_BY_ACCOUNT, false),
            Action::flag(OPT_CURRENCY, false),
            Action::flag(OPT_DETAIL, true),
            Action::flag(OPT_AGREEMENTS, true),
            Action::paste(COUNTERPARTY_LIST, task.counterparty_ids.iter().cloned()),
        ]),
        RequestType::SingleCounterparty => actions.extend([
            Action::flag(OPT_ALL_ITEMS, true),
            Action::flag(OPT_BY_ACCOUNT, true),
            Action::flag(OPT_CURRENCY, false),
            Action::flag(OPT_DETAIL, true),
            Action::flag(OPT_AGREEMENTS, true),
            Action::set(COUNTERPARTY, first_counterparty),
        ]),
        RequestType::SingleContract => actions.extend([
            Action::flag(OPT_ALL_ITEMS, false),
            Action::flag(OPT_BY_ACCOUNT, true),
            Action::flag(OPT_CURRENCY, false),
            Action::flag(OPT_AGREEMENTS, true),
            Action::flag(OPT_ZERO_LINES, false),
            Action::set(COUNTERPARTY, first_counterparty),
            Action::paste(CONTRACT_LIST, task.contract_numbers.iter().cloned()),
        ]),
    }

    actions
}

fn category(code: &str) -> CategoryPlan {
    use address::*;

    let actions = match code {
        "60" => vec![
            Action::press(REPORT_EXECUTE),
            Action::set(PRINT_FORM, RECONCILIATION_FORM),
            Action::press(PRINT_FORM_CONFIRM),
        ],
        "62" => vec![
            Action::flag(OPT_BY_ACCOUNT, true),
            Action::set(ACCOUNT_MASK, "62*"),
            Action::paste(ACCOUNT_LIST, ACCOUNTS_62.iter().copied()),
            Action::press(REPORT_EXECUTE),
        ],
        "76" => vec![
            Action::flag(OPT_BY_ACCOUNT, true),
            Action::set(ACCOUNT_MASK, "76*"),
            Action::paste(ACCOUNT_LIST, ACCOUNTS_76.iter().copied()),
            Action::press(REPORT_EXECUTE),
        ],
        _ => vec![
            Action::set(ACCOUNT_MASK, ALL_ACCOUNTS),
            Action::paste(
                ACCOUNT_LIST,
                ACCOUNTS_62.iter().chain(ACCOUNTS_76.iter()).copied(),
            ),
            Action::press(REPORT_EXECUTE),
        ],
    };

    CategoryPlan {
        code: code.to_string(),
        actions,
    }
}

fn documents(task: &Task) -> Vec<Action> {
    use address::*;

    vec![
        Action::press(DOCUMENTS_GENERATE),
        Action::set(SIGNATORY_HEAD, task.primary_signatory()),
        Action::set(SIGNATORY_ACCOUNTANT, task.secondary_signatory()),
        Action::press(DOCUMENTS_CONFIRM),
    ]
}
