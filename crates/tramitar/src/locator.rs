//! Element resolution under selector uncertainty.
//!
//! Municipal form pages are rebuilt often and their markup is unstable; no
//! single selector can be trusted. Every control the engine touches is
//! therefore described by a *ranked list* of [`LocatorCandidate`]s for one
//! semantic [`FieldRole`], and resolution walks that list in order, accepting
//! the first candidate that exists, is visible, and is enabled. No match is a
//! deterministic [`Resolution::NotFound`] — never a partial match silently
//! accepted, and never an exception.
//!
//! Candidate lists live in a declarative [`LocatorCatalog`] keyed by
//! (form variant, field role), so the same resolver serves every report
//! category instead of each form script re-inventing its own lookup chain.
//!
//! Resolution performs a single scan. Callers that expect a control to appear
//! asynchronously wrap repeated resolver calls in a bounded wait
//! (`wait::wait_for_value`); the resolver itself never sleeps.

use crate::driver::{ElementHandle, FormDriver};
use crate::result::{TramitarError, TramitarResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A point in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding box for an element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X position
    pub x: f64,
    /// Y position
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Geometric center, used as the click fallback for map widgets
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Query expression for locating one element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g. `button[type=submit]`)
    Css(String),
    /// XPath selector
    XPath(String),
    /// Text content selector (first element whose text contains the string)
    Text(String),
    /// CSS selector filtered by text content
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// Class-name pattern match (substring), for role-shaped widgets such as
    /// map markers whose exact class is theme-dependent
    ClassPattern(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a CSS-with-text selector
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Create a class-pattern selector
    #[must_use]
    pub fn class_pattern(pattern: impl Into<String>) -> Self {
        Self::ClassPattern(pattern.into())
    }

    /// Convert to a JavaScript query expression evaluating to an element or null
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::Css(s) => format!("document.querySelector({s:?})"),
            Self::XPath(s) => {
                format!("document.evaluate({s:?}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue")
            }
            Self::Text(t) => {
                format!("Array.from(document.querySelectorAll('*')).find(el => el.children.length === 0 && el.textContent.includes({t:?}))")
            }
            Self::CssWithText { css, text } => {
                format!("Array.from(document.querySelectorAll({css:?})).find(el => el.textContent.includes({text:?}))")
            }
            Self::ClassPattern(p) => {
                format!("Array.from(document.querySelectorAll('[class]')).find(el => el.className.toString().includes({p:?}))")
            }
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::XPath(s) => write!(f, "xpath={s}"),
            Self::Text(t) => write!(f, "text={t}"),
            Self::CssWithText { css, text } => write!(f, "css={css} text={text}"),
            Self::ClassPattern(p) => write!(f, "class~={p}"),
        }
    }
}

/// Semantic role of a control within a form variant.
///
/// Roles are what the wizard asks for; the catalog maps them to concrete
/// candidate lists per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// The control that starts/advances the report wizard
    PrimaryAction,
    /// Per-page "continue"/"next" control
    NextControl,
    /// Category radio/checkbox for the report type
    CategoryControl,
    /// Dependent secondary-category select
    SecondaryControl,
    /// Coordinate/address input feeding the map widget
    GeocodeInput,
    /// Dedicated search trigger next to the geocode input
    SearchControl,
    /// The rendered map widget
    MapCanvas,
    /// Zoom-in control on the map
    ZoomIn,
    /// Marker-like element dropped by the map after a search
    MapMarker,
    /// Free-text supplementary location description
    LocationDescription,
    /// Free-text issue description
    DetailDescription,
    /// File attachment input
    AttachmentInput,
    /// "Report anonymously" contact option
    ContactAnonymous,
    /// Contact e-mail input
    ContactEmail,
    /// Final submission control
    SubmitControl,
    /// Field holding the service-request number on the confirmation page
    ConfirmationNumber,
    /// Field holding the submitted address on the confirmation page
    ConfirmationAddress,
}

impl FieldRole {
    /// Human-readable role name, used in diagnostics and errors
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryAction => "primary action control",
            Self::NextControl => "next control",
            Self::CategoryControl => "category control",
            Self::SecondaryControl => "secondary category control",
            Self::GeocodeInput => "geocode input",
            Self::SearchControl => "search control",
            Self::MapCanvas => "map widget",
            Self::ZoomIn => "zoom-in control",
            Self::MapMarker => "map marker",
            Self::LocationDescription => "location description field",
            Self::DetailDescription => "detail description field",
            Self::AttachmentInput => "attachment input",
            Self::ContactAnonymous => "anonymous contact option",
            Self::ContactEmail => "contact email input",
            Self::SubmitControl => "final submit control",
            Self::ConfirmationNumber => "confirmation number field",
            Self::ConfirmationAddress => "confirmation address field",
        }
    }
}

impl std::fmt::Display for FieldRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ranked query expression that may identify a target element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorCandidate {
    /// Position in the candidate list (0 = most preferred)
    pub rank: u32,
    /// Query expression
    pub selector: Selector,
}

/// Ordered candidate list for one semantic role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSet {
    /// Role the candidates resolve
    pub role: FieldRole,
    /// Candidates in preference order
    pub candidates: Vec<LocatorCandidate>,
}

impl CandidateSet {
    /// Create an empty candidate set for a role
    #[must_use]
    pub fn new(role: FieldRole) -> Self {
        Self {
            role,
            candidates: Vec::new(),
        }
    }

    /// Append a candidate; rank follows insertion order
    #[must_use]
    pub fn candidate(mut self, selector: Selector) -> Self {
        let rank = self.candidates.len() as u32;
        self.candidates.push(LocatorCandidate { rank, selector });
        self
    }

    /// Number of candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the set has no candidates
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A control resolved from a candidate list
#[derive(Debug, Clone)]
pub struct ResolvedControl {
    /// Handle usable with the driver
    pub handle: ElementHandle,
    /// Rank of the winning candidate
    pub rank: u32,
}

/// Outcome of a single resolver scan
#[derive(Debug, Clone)]
pub enum Resolution {
    /// First qualifying candidate
    Found(ResolvedControl),
    /// No candidate qualified
    NotFound {
        /// How many candidates were scanned
        scanned: usize,
    },
}

impl Resolution {
    /// The resolved control, if any
    #[must_use]
    pub fn found(self) -> Option<ResolvedControl> {
        match self {
            Self::Found(control) => Some(control),
            Self::NotFound { .. } => None,
        }
    }
}

/// Scan a candidate list once, returning the first candidate whose element
/// exists, is visible, and is enabled.
///
/// # Errors
///
/// Only driver failures are errors; an empty result is [`Resolution::NotFound`].
pub async fn resolve_first(
    driver: &dyn FormDriver,
    set: &CandidateSet,
) -> TramitarResult<Resolution> {
    for candidate in &set.candidates {
        let Some(handle) = driver.find(&candidate.selector).await? else {
            continue;
        };
        let state = driver.state(&handle).await?;
        if state.qualifies() {
            tracing::debug!(
                role = set.role.as_str(),
                rank = candidate.rank,
                selector = %candidate.selector,
                "resolved control"
            );
            return Ok(Resolution::Found(ResolvedControl {
                handle,
                rank: candidate.rank,
            }));
        }
    }
    Ok(Resolution::NotFound {
        scanned: set.candidates.len(),
    })
}

/// Resolve a control that the current step cannot proceed without.
///
/// # Errors
///
/// Returns [`TramitarError::ElementNotFound`] naming the role when no
/// candidate qualifies.
pub async fn resolve_required(
    driver: &dyn FormDriver,
    set: &CandidateSet,
) -> TramitarResult<ResolvedControl> {
    match resolve_first(driver, set).await? {
        Resolution::Found(control) => Ok(control),
        Resolution::NotFound { scanned } => {
            tracing::warn!(role = set.role.as_str(), scanned, "no candidate qualified");
            Err(TramitarError::ElementNotFound {
                role: set.role.as_str().to_string(),
            })
        }
    }
}

/// Re-check the qualifying predicate on an already-resolved handle.
///
/// DOM state can change between discovery and use; callers re-validate
/// immediately before acting on a handle.
pub async fn revalidate(driver: &dyn FormDriver, handle: &ElementHandle) -> TramitarResult<bool> {
    Ok(driver.state(handle).await?.qualifies())
}

/// Declarative candidate tables keyed by (form variant, field role)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocatorCatalog {
    /// Per-variant role tables
    pub variants: HashMap<String, HashMap<FieldRole, CandidateSet>>,
}

impl LocatorCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate set for a role within a variant
    #[must_use]
    pub fn get(&self, variant: &str, role: FieldRole) -> Option<&CandidateSet> {
        self.variants.get(variant).and_then(|roles| roles.get(&role))
    }

    /// Candidate set the caller cannot proceed without.
    ///
    /// A role missing from the catalog resolves to the same deterministic
    /// signal as a role whose candidates all fail: `ElementNotFound`.
    pub fn require(&self, variant: &str, role: FieldRole) -> TramitarResult<&CandidateSet> {
        self.get(variant, role)
            .ok_or_else(|| TramitarError::ElementNotFound {
                role: role.as_str().to_string(),
            })
    }

    /// Insert or replace a candidate set
    pub fn set(&mut self, variant: impl Into<String>, set: CandidateSet) {
        self.variants
            .entry(variant.into())
            .or_default()
            .insert(set.role, set);
    }

    /// Registered variant names
    #[must_use]
    pub fn variant_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variants.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Built-in tables for the municipal report variants.
    ///
    /// Selector lists mirror the markup families seen across the city's
    /// street, sidewalk, graffiti and tree report forms; ranks go from the
    /// most specific stable hook down to text-content fallbacks.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for (variant, category_css, category_label) in [
            ("street", "input[value='Street']", "Street"),
            ("sidewalk", "input[value='Sidewalk']", "Sidewalk"),
            ("graffiti", "input[value='Graffiti']", "Graffiti"),
            ("tree", "input[value='Tree']", "Tree"),
        ] {
            for set in Self::common_sets() {
                catalog.set(variant, set);
            }
            catalog.set(
                variant,
                CandidateSet::new(FieldRole::CategoryControl)
                    .candidate(Selector::css(category_css))
                    .candidate(Selector::css_with_text("label", category_label))
                    .candidate(Selector::text(category_label)),
            );
        }
        catalog
    }

    fn common_sets() -> Vec<CandidateSet> {
        vec![
            CandidateSet::new(FieldRole::PrimaryAction)
                .candidate(Selector::css("button[data-action='start-report']"))
                .candidate(Selector::css_with_text("button", "Get started"))
                .candidate(Selector::css_with_text("a.button", "Report")),
            CandidateSet::new(FieldRole::NextControl)
                .candidate(Selector::css("button[data-action='next']"))
                .candidate(Selector::css_with_text("button", "Next"))
                .candidate(Selector::css_with_text("button", "Continue")),
            CandidateSet::new(FieldRole::SecondaryControl)
                .candidate(Selector::css("select#request-subtype"))
                .candidate(Selector::css("select[name='subtype']"))
                .candidate(Selector::css("select")),
            CandidateSet::new(FieldRole::GeocodeInput)
                .candidate(Selector::css("input#address-search"))
                .candidate(Selector::css("input[name='search_address']"))
                .candidate(Selector::css("input[placeholder*='address']")),
            CandidateSet::new(FieldRole::SearchControl)
                .candidate(Selector::css("button#address-search-btn"))
                .candidate(Selector::css(".search-button"))
                .candidate(Selector::css_with_text("button", "Search")),
            CandidateSet::new(FieldRole::MapCanvas)
                .candidate(Selector::css("div#map"))
                .candidate(Selector::css(".leaflet-container"))
                .candidate(Selector::css(".esri-view-surface")),
            CandidateSet::new(FieldRole::ZoomIn)
                .candidate(Selector::css(".leaflet-control-zoom-in"))
                .candidate(Selector::css("button[title='Zoom in']"))
                .candidate(Selector::css_with_text("button", "+")),
            CandidateSet::new(FieldRole::MapMarker)
                .candidate(Selector::class_pattern("leaflet-marker"))
                .candidate(Selector::class_pattern("esri-graphic"))
                .candidate(Selector::class_pattern("marker")),
            CandidateSet::new(FieldRole::LocationDescription)
                .candidate(Selector::css("textarea#location-details"))
                .candidate(Selector::css("textarea[name='location_description']"))
                .candidate(Selector::css("input[name='location_description']")),
            CandidateSet::new(FieldRole::DetailDescription)
                .candidate(Selector::css("textarea#description"))
                .candidate(Selector::css("textarea[name='description']"))
                .candidate(Selector::css("textarea")),
            CandidateSet::new(FieldRole::AttachmentInput)
                .candidate(Selector::css("input[type='file']")),
            CandidateSet::new(FieldRole::ContactAnonymous)
                .candidate(Selector::css("input#contact-anonymous"))
                .candidate(Selector::css("input[value='anonymous']"))
                .candidate(Selector::css_with_text("label", "anonymous")),
            CandidateSet::new(FieldRole::ContactEmail)
                .candidate(Selector::css("input[type='email']"))
                .candidate(Selector::css("input[name='email']")),
            CandidateSet::new(FieldRole::SubmitControl)
                .candidate(Selector::css("button[type='submit']"))
                .candidate(Selector::css_with_text("button", "Submit"))
                .candidate(Selector::css("input[type='submit']")),
            CandidateSet::new(FieldRole::ConfirmationNumber)
                .candidate(Selector::css("[data-field='service-request-number']"))
                .candidate(Selector::css(".confirmation-number"))
                .candidate(Selector::css("#request-number")),
            CandidateSet::new(FieldRole::ConfirmationAddress)
                .candidate(Selector::css("[data-field='request-address']"))
                .candidate(Selector::css(".confirmation-address")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{SimElement, SimulatedPage};

    mod selector_tests {
        use super::*;

        #[test]
        fn css_query_generation() {
            let query = Selector::css("button.primary").to_query();
            assert!(query.contains("querySelector"));
            assert!(query.contains("button.primary"));
        }

        #[test]
        fn class_pattern_query_generation() {
            let query = Selector::class_pattern("leaflet-marker").to_query();
            assert!(query.contains("className"));
            assert!(query.contains("leaflet-marker"));
        }

        #[test]
        fn display_is_compact() {
            assert_eq!(Selector::css("#map").to_string(), "css=#map");
            assert_eq!(
                Selector::css_with_text("button", "Next").to_string(),
                "css=button text=Next"
            );
        }

        #[test]
        fn selector_round_trips_through_json() {
            let selector = Selector::css_with_text("button", "Submit");
            let json = serde_json::to_string(&selector).unwrap();
            let back: Selector = serde_json::from_str(&json).unwrap();
            assert_eq!(selector, back);
        }
    }

    mod candidate_set_tests {
        use super::*;

        #[test]
        fn ranks_follow_insertion_order() {
            let set = CandidateSet::new(FieldRole::GeocodeInput)
                .candidate(Selector::css("#a"))
                .candidate(Selector::css("#b"))
                .candidate(Selector::css("#c"));
            assert_eq!(set.len(), 3);
            assert_eq!(set.candidates[0].rank, 0);
            assert_eq!(set.candidates[2].rank, 2);
        }
    }

    mod resolver_tests {
        use super::*;

        fn page_with_two_buttons() -> SimulatedPage {
            SimulatedPage::new()
                .with_element(
                    SimElement::new("hidden-btn", "button")
                        .matching_css("#preferred")
                        .visible(false),
                )
                .with_element(SimElement::new("shown-btn", "button").matching_css("#fallback"))
        }

        #[tokio::test]
        async fn first_qualifying_candidate_wins() {
            let page = page_with_two_buttons();
            let set = CandidateSet::new(FieldRole::PrimaryAction)
                .candidate(Selector::css("#preferred"))
                .candidate(Selector::css("#fallback"));

            let control = resolve_required(&page, &set).await.unwrap();
            assert_eq!(control.handle.id, "shown-btn");
            assert_eq!(control.rank, 1);
        }

        #[tokio::test]
        async fn hidden_and_disabled_elements_do_not_qualify() {
            let page = SimulatedPage::new().with_element(
                SimElement::new("dead-btn", "button")
                    .matching_css("#only")
                    .enabled(false),
            );
            let set =
                CandidateSet::new(FieldRole::PrimaryAction).candidate(Selector::css("#only"));

            let resolution = resolve_first(&page, &set).await.unwrap();
            assert!(matches!(resolution, Resolution::NotFound { scanned: 1 }));
        }

        #[tokio::test]
        async fn no_match_is_a_signal_not_an_error() {
            let page = SimulatedPage::new();
            let set = CandidateSet::new(FieldRole::PrimaryAction)
                .candidate(Selector::css("#a"))
                .candidate(Selector::css("#b"));

            let resolution = resolve_first(&page, &set).await.unwrap();
            assert!(resolution.found().is_none());
        }

        #[tokio::test]
        async fn required_resolution_names_the_role() {
            let page = SimulatedPage::new();
            let set =
                CandidateSet::new(FieldRole::PrimaryAction).candidate(Selector::css("#missing"));

            let err = resolve_required(&page, &set).await.unwrap_err();
            assert_eq!(err.to_string(), "ElementNotFound: primary action control");
        }

        #[tokio::test]
        async fn revalidate_notices_state_change() {
            let page = SimulatedPage::new()
                .with_element(SimElement::new("btn", "button").matching_css("#btn"));
            let set = CandidateSet::new(FieldRole::PrimaryAction).candidate(Selector::css("#btn"));
            let control = resolve_required(&page, &set).await.unwrap();
            assert!(revalidate(&page, &control.handle).await.unwrap());

            page.script_hide("btn");
            assert!(!revalidate(&page, &control.handle).await.unwrap());
        }
    }

    mod catalog_tests {
        use super::*;

        #[test]
        fn builtin_covers_all_variants() {
            let catalog = LocatorCatalog::builtin();
            assert_eq!(
                catalog.variant_names(),
                vec!["graffiti", "sidewalk", "street", "tree"]
            );
            for variant in catalog.variant_names() {
                assert!(catalog.get(variant, FieldRole::GeocodeInput).is_some());
                assert!(catalog.get(variant, FieldRole::CategoryControl).is_some());
                assert!(catalog.get(variant, FieldRole::SubmitControl).is_some());
            }
        }

        #[test]
        fn missing_role_is_element_not_found() {
            let catalog = LocatorCatalog::new();
            let err = catalog.require("street", FieldRole::MapMarker).unwrap_err();
            assert_eq!(err.to_string(), "ElementNotFound: map marker");
        }

        #[test]
        fn catalog_round_trips_through_json() {
            let catalog = LocatorCatalog::builtin();
            let json = serde_json::to_string(&catalog).unwrap();
            let back: LocatorCatalog = serde_json::from_str(&json).unwrap();
            assert_eq!(back.variant_names(), catalog.variant_names());
            assert_eq!(
                back.get("street", FieldRole::ZoomIn),
                catalog.get("street", FieldRole::ZoomIn)
            );
        }
    }
}
