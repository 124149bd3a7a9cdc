//! Dependent-option resolution for secondary category fields.
//!
//! After the primary category is selected, the page repopulates the secondary
//! control asynchronously; reading it too early yields a stale or empty option
//! list. The resolver polls until the enabled-option set *stabilizes* (two
//! consecutive scans observe the same non-empty list), then chooses a value
//! by priority: exact hint match, case-insensitive substring match, first
//! enabled non-empty option. The last tier is an explicit, logged fallback —
//! the field is never left unselected silently.
//!
//! `Unavailable` is reported only when the control itself never resolves;
//! a resolvable control with a useless hint still gets a selection, and a
//! resolvable control with no enabled options anywhere is the separate
//! `NoEnabledOptions` so the record can tell the two apart.

use crate::driver::{FormDriver, OptionEntry};
use crate::locator::{self, CandidateSet};
use crate::result::TramitarResult;
use crate::wait::{self, WaitOptions};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;

/// Externally supplied option table: primary category value → ordered
/// secondary options. Read-only to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryOptionTable(HashMap<String, Vec<OptionEntry>>);

impl CategoryOptionTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the secondary options for a primary value
    pub fn insert(&mut self, primary: impl Into<String>, options: Vec<OptionEntry>) {
        self.0.insert(primary.into(), options);
    }

    /// Secondary options for a primary value, if the table knows it
    #[must_use]
    pub fn options_for(&self, primary: &str) -> Option<&[OptionEntry]> {
        self.0.get(primary).map(Vec::as_slice)
    }

    /// Whether the table has an entry for a primary value
    #[must_use]
    pub fn covers(&self, primary: &str) -> bool {
        self.0.contains_key(primary)
    }
}

/// How the selected secondary value was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Exact match against the hint (value or label)
    ExactHint,
    /// Case-insensitive substring match against the hint
    SubstringHint,
    /// First enabled non-empty option; logged fallback
    FirstEnabled,
}

impl MatchKind {
    /// Diagnostic name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ExactHint => "exact_hint",
            Self::SubstringHint => "substring_hint",
            Self::FirstEnabled => "first_enabled",
        }
    }
}

/// The secondary value actually selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondarySelection {
    /// Selected underlying value
    pub value: String,
    /// Label of the selected option
    pub label: String,
    /// Match tier that produced the selection
    pub matched: MatchKind,
}

/// Outcome of dependent-field resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondaryOutcome {
    /// A value was selected on the control
    Selected(SecondarySelection),
    /// The control resolved but neither it nor the table offered an enabled
    /// option (non-fatal; recorded upstream)
    NoEnabledOptions,
    /// The control never became resolvable (non-fatal; recorded upstream)
    Unavailable,
}

/// Resolve and select the secondary category value.
///
/// # Errors
///
/// Only driver failures are errors; an absent control is
/// [`SecondaryOutcome::Unavailable`].
pub async fn resolve_secondary(
    driver: &dyn FormDriver,
    candidates: &CandidateSet,
    table: &CategoryOptionTable,
    primary: &str,
    hint: Option<&str>,
    opts: &WaitOptions,
) -> TramitarResult<SecondaryOutcome> {
    let Some(control) = wait::wait_for_value(opts, "secondary control", move || async move {
        Ok(locator::resolve_first(driver, candidates).await?.found())
    })
    .await?
    else {
        tracing::warn!(primary, "secondary control never resolved");
        return Ok(SecondaryOutcome::Unavailable);
    };

    // Two consecutive identical non-empty scans count as propagated.
    let previous: RefCell<Option<Vec<OptionEntry>>> = RefCell::new(None);
    let prev = &previous;
    let handle = &control.handle;
    let outcome = wait::wait_until(opts, "secondary option set stabilization", move || async move {
        let current = enabled_options(&driver.options(handle).await?);
        let stable = prev.borrow().as_deref() == Some(current.as_slice()) && !current.is_empty();
        *prev.borrow_mut() = Some(current);
        Ok(stable)
    })
    .await?;

    let live = previous.into_inner().unwrap_or_default();
    if !outcome.satisfied {
        tracing::debug!(primary, observed = live.len(), "option set never stabilized in budget");
    }

    // Fall back to the externally supplied table when the live control shows
    // nothing usable (the page may populate labels only after submit-time).
    let domain = if live.is_empty() {
        table
            .options_for(primary)
            .map(|options| enabled_options(options))
            .unwrap_or_default()
    } else {
        live
    };
    if domain.is_empty() {
        tracing::warn!(primary, "no enabled secondary options from control or table");
        return Ok(SecondaryOutcome::NoEnabledOptions);
    }

    let selection = choose(&domain, hint);
    if selection.matched == MatchKind::FirstEnabled {
        tracing::warn!(
            primary,
            hint = hint.unwrap_or(""),
            value = %selection.value,
            "hint did not match any enabled option, falling back to first enabled"
        );
    } else {
        tracing::debug!(primary, value = %selection.value, matched = selection.matched.as_str(), "secondary selected");
    }

    driver.select_option(&control.handle, &selection.value).await?;
    Ok(SecondaryOutcome::Selected(selection))
}

fn enabled_options(options: &[OptionEntry]) -> Vec<OptionEntry> {
    options
        .iter()
        .filter(|o| o.enabled && !(o.value.is_empty() && o.label.is_empty()))
        .cloned()
        .collect()
}

fn choose(domain: &[OptionEntry], hint: Option<&str>) -> SecondarySelection {
    if let Some(hint) = hint {
        if let Some(option) = domain.iter().find(|o| o.value == hint || o.label == hint) {
            return selection(option, MatchKind::ExactHint);
        }
        let needle = hint.to_lowercase();
        if let Some(option) = domain.iter().find(|o| {
            o.label.to_lowercase().contains(&needle) || o.value.to_lowercase().contains(&needle)
        }) {
            return selection(option, MatchKind::SubstringHint);
        }
    }
    let first = domain
        .iter()
        .find(|o| !o.value.is_empty())
        .unwrap_or(&domain[0]);
    selection(first, MatchKind::FirstEnabled)
}

fn selection(option: &OptionEntry, matched: MatchKind) -> SecondarySelection {
    SecondarySelection {
        value: option.value.clone(),
        label: option.label.clone(),
        matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{SimElement, SimulatedPage};
    use crate::locator::{FieldRole, Selector};

    fn fast() -> WaitOptions {
        WaitOptions::new().with_timeout(300).with_poll_interval(5)
    }

    fn secondary_set() -> CandidateSet {
        CandidateSet::new(FieldRole::SecondaryControl).candidate(Selector::css("#subtype"))
    }

    fn page_with_options(options: Vec<OptionEntry>) -> SimulatedPage {
        SimulatedPage::new().with_element(
            SimElement::new("subtype", "select")
                .matching_css("#subtype")
                .with_options(options),
        )
    }

    #[tokio::test]
    async fn exact_hint_wins() {
        let page = page_with_options(vec![
            OptionEntry::new("pothole", "Pothole"),
            OptionEntry::new("crack", "Surface crack"),
        ]);
        let table = CategoryOptionTable::new();

        let outcome = resolve_secondary(&page, &secondary_set(), &table, "Street", Some("Surface crack"), &fast())
            .await
            .unwrap();
        let SecondaryOutcome::Selected(selection) = outcome else {
            panic!("expected a selection");
        };
        assert_eq!(selection.value, "crack");
        assert_eq!(selection.matched, MatchKind::ExactHint);
        assert_eq!(page.value_of("subtype").unwrap(), "crack");
    }

    #[tokio::test]
    async fn substring_match_is_case_insensitive() {
        let page = page_with_options(vec![
            OptionEntry::new("g1", "Painted wall"),
            OptionEntry::new("g2", "Etched GLASS surface"),
        ]);
        let outcome = resolve_secondary(
            &page,
            &secondary_set(),
            &CategoryOptionTable::new(),
            "Graffiti",
            Some("glass"),
            &fast(),
        )
        .await
        .unwrap();
        let SecondaryOutcome::Selected(selection) = outcome else {
            panic!("expected a selection");
        };
        assert_eq!(selection.value, "g2");
        assert_eq!(selection.matched, MatchKind::SubstringHint);
    }

    #[tokio::test]
    async fn disabled_hint_falls_back_to_first_enabled() {
        // Requesting o2 while only o1 is enabled must select o1, never
        // leave the field unselected.
        let page = page_with_options(vec![
            OptionEntry::new("o1", "Option one"),
            OptionEntry::disabled("o2", "Option two"),
        ]);
        let outcome = resolve_secondary(
            &page,
            &secondary_set(),
            &CategoryOptionTable::new(),
            "A",
            Some("o2"),
            &fast(),
        )
        .await
        .unwrap();
        let SecondaryOutcome::Selected(selection) = outcome else {
            panic!("expected a selection");
        };
        assert_eq!(selection.value, "o1");
        assert_eq!(selection.matched, MatchKind::FirstEnabled);
        assert_eq!(page.value_of("subtype").unwrap(), "o1");
    }

    #[tokio::test]
    async fn missing_control_is_unavailable_not_an_error() {
        let page = SimulatedPage::new();
        let outcome = resolve_secondary(
            &page,
            &secondary_set(),
            &CategoryOptionTable::new(),
            "Street",
            None,
            &fast(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, SecondaryOutcome::Unavailable);
    }

    #[tokio::test]
    async fn optionless_control_is_distinguished_from_a_missing_one() {
        // The control resolves, but neither it nor the table offers anything.
        let page = page_with_options(vec![OptionEntry::disabled("o1", "Option one")]);
        let outcome = resolve_secondary(
            &page,
            &secondary_set(),
            &CategoryOptionTable::new(),
            "Street",
            None,
            &WaitOptions::new().with_timeout(60).with_poll_interval(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome, SecondaryOutcome::NoEnabledOptions);
    }

    #[tokio::test]
    async fn empty_control_falls_back_to_the_table() {
        let page = page_with_options(vec![]);
        let mut table = CategoryOptionTable::new();
        table.insert("Street", vec![OptionEntry::new("pothole", "Pothole")]);

        let outcome = resolve_secondary(&page, &secondary_set(), &table, "Street", None, &fast())
            .await
            .unwrap();
        let SecondaryOutcome::Selected(selection) = outcome else {
            panic!("expected a selection");
        };
        assert_eq!(selection.value, "pothole");
    }

    #[tokio::test]
    async fn table_round_trips_through_json() {
        let mut table = CategoryOptionTable::new();
        table.insert("Street", vec![OptionEntry::new("pothole", "Pothole")]);
        let json = serde_json::to_string(&table).unwrap();
        let back: CategoryOptionTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
        assert!(back.covers("Street"));
    }
}
