//! Confirmation-page extraction.
//!
//! Confirmation pages vary in markup but not in content: somewhere there is a
//! labeled service-request number and, usually, the submitted address echoed
//! back. Extraction tries dedicated confirmation fields first, then scans the
//! page text with an ordered pattern list, most specific first:
//!
//! 1. labeled numbers ("Service Request #…", "Tracking number: …",
//!    "Case: …", "SR-…"), which may carry a short letter prefix
//! 2. a bare 12-digit run (the city's canonical request-number width)
//! 3. a bare 10 to 15 digit run
//! 4. any run of at least eight digits
//!
//! Shorter bare numbers are never accepted; they collide with dates, zip
//! codes and phone fragments. Absence of a number is reported as `None`, not
//! an error — the submission may still have gone through.

use crate::driver::FormDriver;
use crate::locator::{self, FieldRole, LocatorCatalog};
use crate::result::TramitarResult;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

/// Captures that are page furniture rather than identifiers
const STOPLIST: [&str; 6] = ["please", "continue", "thank", "submit", "required", "pending"];

/// What the extractor pulled off the confirmation page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Service-request number, if one was found
    pub request_id: Option<String>,
    /// Echoed submission address, if one was found
    pub address: Option<String>,
}

/// Final, serializable record of one submission run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRecord {
    /// Whether the run reached the confirmation page
    pub success: bool,
    /// Extracted service-request number
    pub request_id: Option<String>,
    /// Extracted submission address
    pub address: Option<String>,
    /// Fatal error, when `success` is false
    pub error: Option<String>,
    /// Steps completed before the run ended, in order
    pub completed_steps: Vec<String>,
    /// Non-fatal degradations recorded along the way
    pub notes: Vec<String>,
    /// Run start time
    pub started_at: DateTime<Utc>,
    /// Run end time
    pub finished_at: DateTime<Utc>,
    /// Driver session the run used
    pub session_id: Uuid,
}

/// Ordered-pattern extractor for request numbers and addresses
#[derive(Debug)]
pub struct ConfirmationExtractor {
    labeled: Vec<Regex>,
    bare: Vec<Regex>,
    address_json: Regex,
    address_labeled: Regex,
    street_shaped: Regex,
}

impl Default for ConfirmationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationExtractor {
    /// Compile the pattern list
    #[must_use]
    pub fn new() -> Self {
        let compile = |p: &str| Regex::new(p).expect("extraction pattern compiles");
        Self {
            labeled: vec![
                compile(r"(?i)service request(?:\s+number)?[:\s#]+([A-Za-z]{0,4}\d{6,})"),
                compile(r"(?i)tracking(?:\s+number)?[:\s#]+([A-Za-z]{0,4}\d{6,})"),
                compile(r"(?i)case(?:\s+number)?[:\s#]+([A-Za-z]{0,4}\d{6,})"),
                compile(r"\bSR[\s:#-]*(\d{6,})"),
            ],
            bare: vec![
                compile(r"\b(\d{12})\b"),
                compile(r"\b(\d{10,15})\b"),
                compile(r"\b(\d{8,})\b"),
            ],
            address_json: compile(r#""requestAddress"\s*:\s*"([^"]+)""#),
            address_labeled: compile(r"(?i)\baddress[:\s]+([^\n]+)"),
            street_shaped: compile(
                r"(?i)\b\d+\s+[0-9a-z][0-9a-z .']*\s(?:st|street|ave|avenue|blvd|boulevard|rd|road|dr|drive|way|ct|court|ln|lane|pl|place|ter|terrace)\b[^\n]*",
            ),
        }
    }

    /// Extract both fields, preferring dedicated field values over page text.
    #[must_use]
    pub fn extract(&self, field_values: &[&str], page_text: &str) -> Extraction {
        let request_id = field_values
            .iter()
            .find_map(|v| self.request_id_from(v))
            .or_else(|| self.request_id_from(page_text));
        let address = field_values
            .iter()
            .find_map(|v| self.address_from(v))
            .or_else(|| self.address_from(page_text));
        Extraction { request_id, address }
    }

    /// First request-number capture the pattern order accepts.
    ///
    /// Labeled patterns run first so that a labeled shorthand like "SR-…"
    /// yields its captured digits. Only then is a text that is *itself* an
    /// id-shaped token (a dedicated confirmation field's value) accepted
    /// verbatim, ahead of the bare-digit fallbacks.
    #[must_use]
    pub fn request_id_from(&self, text: &str) -> Option<String> {
        for pattern in &self.labeled {
            if let Some(capture) = first_capture(pattern, text) {
                return Some(capture);
            }
        }
        let trimmed = text.trim();
        if id_shaped(trimmed) {
            return Some(trimmed.to_string());
        }
        for pattern in &self.bare {
            if let Some(capture) = first_capture(pattern, text) {
                return Some(capture);
            }
        }
        None
    }

    /// First address the pattern order accepts
    #[must_use]
    pub fn address_from(&self, text: &str) -> Option<String> {
        if let Some(capture) = first_capture(&self.address_json, text) {
            return Some(capture.trim().to_string());
        }
        if let Some(capture) = first_capture(&self.address_labeled, text) {
            let trimmed = capture.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        self.street_shaped
            .find(text)
            .map(|m| m.as_str().trim().to_string())
    }
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// A bare token usable as an identifier without surrounding context: alnum
/// (dashes allowed), at least six digits, and not page furniture.
fn id_shaped(token: &str) -> bool {
    if token.is_empty() || token.len() > 24 {
        return false;
    }
    if STOPLIST.contains(&token.to_lowercase().as_str()) {
        return false;
    }
    token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && token.chars().filter(char::is_ascii_digit).count() >= 6
}

/// Read the confirmation page through the driver: dedicated field values
/// where the catalog knows them, full page text always.
///
/// # Errors
///
/// Only driver failures; missing confirmation fields fall back to page text.
pub async fn harvest(
    driver: &dyn FormDriver,
    catalog: &LocatorCatalog,
    variant: &str,
    extractor: &ConfirmationExtractor,
) -> TramitarResult<Extraction> {
    let mut field_values = Vec::new();
    for role in [FieldRole::ConfirmationNumber, FieldRole::ConfirmationAddress] {
        let Some(set) = catalog.get(variant, role) else {
            continue;
        };
        if let Some(control) = locator::resolve_first(driver, set).await?.found() {
            let value = driver.value(&control.handle).await?;
            if !value.is_empty() {
                field_values.push(value);
            } else if let Some(text) = control.handle.text {
                field_values.push(text);
            }
        }
    }
    let page_text = driver.page_text().await?;
    let values: Vec<&str> = field_values.iter().map(String::as_str).collect();
    let extraction = extractor.extract(&values, &page_text);
    tracing::info!(
        request_id = extraction.request_id.as_deref().unwrap_or("<none>"),
        address = extraction.address.as_deref().unwrap_or("<none>"),
        "confirmation extracted"
    );
    Ok(extraction)
}
