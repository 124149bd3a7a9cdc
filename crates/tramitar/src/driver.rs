//! Abstract page-automation driver.
//!
//! The engine never talks to a browser directly; everything goes through the
//! [`FormDriver`] trait, which exposes the primitives the wizard needs:
//! query, state inspection, value read/write, activation, container submit,
//! key presses, point clicks, and page-level text/token reads. The trait
//! allows swapping implementations — the CDP driver behind the `browser`
//! feature for real submissions, [`SimulatedPage`] for tests.
//!
//! [`SimulatedPage`] is a scripted in-memory page: elements are declared with
//! the selectors they answer to, and activation effects describe how the page
//! reacts (a search press reveals the map, a marker click reverse-geocodes
//! the address field). That is enough to exercise every engine path without
//! a browser.

use crate::locator::{BoundingBox, Point, Selector};
use crate::result::{TramitarError, TramitarResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Observable state of a located element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Element is attached to the DOM
    pub exists: bool,
    /// Element is rendered and visible
    pub visible: bool,
    /// Element accepts interaction
    pub enabled: bool,
}

impl ElementState {
    /// State reported for a detached element
    pub const DETACHED: Self = Self {
        exists: false,
        visible: false,
        enabled: false,
    };

    /// The resolver predicate: exists ∧ visible ∧ enabled
    #[must_use]
    pub const fn qualifies(&self) -> bool {
        self.exists && self.visible && self.enabled
    }
}

/// Handle for a located element.
///
/// `id` is driver-interpreted: the simulated page uses its element key, the
/// CDP driver stores the winning query expression and re-evaluates it on
/// every operation (the dispatcher re-checks the qualifying predicate before
/// acting, so a stale handle is caught rather than acted on).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-interpreted element key
    pub id: String,
    /// Element tag name
    pub tag_name: String,
    /// Text content at discovery time, if any
    pub text: Option<String>,
}

impl ElementHandle {
    /// Create a new handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            text: None,
        }
    }
}

/// One option of a select-like control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    /// Underlying submitted value
    pub value: String,
    /// Visible label
    pub label: String,
    /// Whether the option is currently selectable
    pub enabled: bool,
}

impl OptionEntry {
    /// Create an enabled option
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            enabled: true,
        }
    }

    /// Create a disabled option
    #[must_use]
    pub fn disabled(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::new(value, label)
        }
    }
}

/// Abstract driver trait for page automation.
///
/// Implementations:
///
/// - `ChromiumFormDriver` — real CDP control (`browser` feature)
/// - [`SimulatedPage`] — scripted in-memory page for tests
#[async_trait]
pub trait FormDriver: Send + Sync {
    /// Navigate to a URL
    async fn navigate(&mut self, url: &str) -> TramitarResult<()>;

    /// Find the first element matching a selector
    async fn find(&self, selector: &Selector) -> TramitarResult<Option<ElementHandle>>;

    /// Read the element's observable state
    async fn state(&self, handle: &ElementHandle) -> TramitarResult<ElementState>;

    /// Read the element's value
    async fn value(&self, handle: &ElementHandle) -> TramitarResult<String>;

    /// Write the element's value
    async fn set_value(&self, handle: &ElementHandle, value: &str) -> TramitarResult<()>;

    /// Read the checked state of a radio/checkbox
    async fn is_checked(&self, handle: &ElementHandle) -> TramitarResult<bool>;

    /// Enumerate the options of a select-like control
    async fn options(&self, handle: &ElementHandle) -> TramitarResult<Vec<OptionEntry>>;

    /// Select an option by value
    async fn select_option(&self, handle: &ElementHandle, value: &str) -> TramitarResult<()>;

    /// Direct programmatic activation (stage 1 of the dispatcher)
    async fn invoke(&self, handle: &ElementHandle) -> TramitarResult<()>;

    /// Synthetic bubbling activation event (stage 2 of the dispatcher)
    async fn dispatch_activation(&self, handle: &ElementHandle) -> TramitarResult<()>;

    /// Submit the element's containing form (stage 3 of the dispatcher)
    async fn submit_container(&self, handle: &ElementHandle) -> TramitarResult<()>;

    /// Press a key with the element focused
    async fn press_key(&self, handle: &ElementHandle, key: &str) -> TramitarResult<()>;

    /// Click a point in page coordinates
    async fn click_point(&self, point: Point) -> TramitarResult<()>;

    /// Bounding box of the element, if rendered
    async fn bounding_box(&self, handle: &ElementHandle) -> TramitarResult<Option<BoundingBox>>;

    /// Attach a file to a file input
    async fn attach_file(&self, handle: &ElementHandle, path: &str) -> TramitarResult<()>;

    /// Full visible text of the page
    async fn page_text(&self) -> TramitarResult<String>;

    /// Opaque token that changes when the page content changes
    async fn page_token(&self) -> TramitarResult<String>;

    /// Close the underlying session
    async fn close(&mut self) -> TramitarResult<()>;
}

// ============================================================================
// Simulated page
// ============================================================================

/// A scripted element of the simulated page
#[derive(Debug, Clone)]
pub struct SimElement {
    /// Element key, also the handle id
    pub id: String,
    /// Tag name
    pub tag: String,
    /// CSS/XPath expressions this element answers to
    pub selectors: Vec<String>,
    /// Text content
    pub text: String,
    /// Class names
    pub classes: Vec<String>,
    /// Current value
    pub value: String,
    /// Checked state
    pub checked: bool,
    /// Visibility
    pub visible: bool,
    /// Enabled state
    pub enabled: bool,
    /// Options, for select-like controls
    pub options: Vec<OptionEntry>,
    /// Containing form key, if the element sits in a submittable container
    pub form: Option<String>,
    /// Rendered bounding box
    pub bbox: Option<BoundingBox>,
}

impl SimElement {
    /// Create a visible, enabled element
    #[must_use]
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            selectors: Vec::new(),
            text: String::new(),
            classes: Vec::new(),
            value: String::new(),
            checked: false,
            visible: true,
            enabled: true,
            options: Vec::new(),
            form: None,
            bbox: None,
        }
    }

    /// Register a CSS (or XPath) expression this element matches
    #[must_use]
    pub fn matching_css(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Add a class name
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set current value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Set visibility
    #[must_use]
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set enabled state
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set options
    #[must_use]
    pub fn with_options(mut self, options: Vec<OptionEntry>) -> Self {
        self.options = options;
        self
    }

    /// Place the element inside a submittable container
    #[must_use]
    pub fn in_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    /// Set the rendered bounding box
    #[must_use]
    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Css(s) | Selector::XPath(s) => self.selectors.iter().any(|c| c == s),
            Selector::Text(t) => self.text.contains(t.as_str()),
            Selector::CssWithText { css, text } => {
                self.selectors.iter().any(|c| c == css) && self.text.contains(text.as_str())
            }
            Selector::ClassPattern(p) => self.classes.iter().any(|c| c.contains(p.as_str())),
        }
    }

    fn handle(&self) -> ElementHandle {
        ElementHandle {
            id: self.id.clone(),
            tag_name: self.tag.clone(),
            text: (!self.text.is_empty()).then(|| self.text.clone()),
        }
    }
}

/// A scripted reaction of the simulated page
#[derive(Debug, Clone)]
pub enum PageEffect {
    /// Set an element's value
    SetValue {
        /// Target element key
        target: String,
        /// New value
        value: String,
    },
    /// Set an element's checked state
    SetChecked {
        /// Target element key
        target: String,
        /// New checked state
        checked: bool,
    },
    /// Show or hide an element
    SetVisible {
        /// Target element key
        target: String,
        /// New visibility
        visible: bool,
    },
    /// Enable or disable an element
    SetEnabled {
        /// Target element key
        target: String,
        /// New enabled state
        enabled: bool,
    },
    /// Replace a control's option list
    SetOptions {
        /// Target element key
        target: String,
        /// New options
        options: Vec<OptionEntry>,
    },
    /// Replace the page text
    SetPageText {
        /// New page text
        text: String,
    },
    /// Advance the page content token
    BumpToken,
}

#[derive(Debug, Default)]
struct PageModel {
    elements: Vec<SimElement>,
    page_text: String,
    token: u64,
    url: String,
    closed: bool,
    calls: Vec<String>,
    clicked_points: Vec<Point>,
    attachments: Vec<(String, String)>,
    on_activate: HashMap<String, Vec<PageEffect>>,
    on_enter: HashMap<String, Vec<PageEffect>>,
    on_submit: HashMap<String, Vec<PageEffect>>,
    on_click_point: Vec<PageEffect>,
    fail_invoke: HashSet<String>,
    fail_synthetic: HashSet<String>,
}

impl PageModel {
    fn element(&self, id: &str) -> Option<&SimElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    fn element_mut(&mut self, id: &str) -> Option<&mut SimElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    fn require(&self, id: &str) -> TramitarResult<&SimElement> {
        self.element(id)
            .ok_or_else(|| TramitarError::driver(format!("stale handle: {id}")))
    }

    fn apply(&mut self, effects: &[PageEffect]) {
        for effect in effects {
            match effect {
                PageEffect::SetValue { target, value } => {
                    if let Some(el) = self.element_mut(target) {
                        el.value = value.clone();
                    }
                }
                PageEffect::SetChecked { target, checked } => {
                    if let Some(el) = self.element_mut(target) {
                        el.checked = *checked;
                    }
                }
                PageEffect::SetVisible { target, visible } => {
                    if let Some(el) = self.element_mut(target) {
                        el.visible = *visible;
                    }
                }
                PageEffect::SetEnabled { target, enabled } => {
                    if let Some(el) = self.element_mut(target) {
                        el.enabled = *enabled;
                    }
                }
                PageEffect::SetOptions { target, options } => {
                    if let Some(el) = self.element_mut(target) {
                        el.options = options.clone();
                    }
                }
                PageEffect::SetPageText { text } => {
                    self.page_text = text.clone();
                }
                PageEffect::BumpToken => {
                    self.token += 1;
                }
            }
        }
    }
}

/// Scripted in-memory page implementing [`FormDriver`].
///
/// Cheap to clone; clones share the same page model, so a test can keep a
/// handle for inspection while the engine owns the boxed driver.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPage {
    model: Arc<Mutex<PageModel>>,
}

impl SimulatedPage {
    /// Create an empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PageModel> {
        self.model.lock().expect("page model poisoned")
    }

    /// Add an element
    #[must_use]
    pub fn with_element(self, element: SimElement) -> Self {
        self.lock().elements.push(element);
        self
    }

    /// Set the page text
    #[must_use]
    pub fn with_page_text(self, text: impl Into<String>) -> Self {
        self.lock().page_text = text.into();
        self
    }

    /// Script effects applied when an element is activated
    #[must_use]
    pub fn on_activate(self, id: impl Into<String>, effects: Vec<PageEffect>) -> Self {
        self.lock().on_activate.insert(id.into(), effects);
        self
    }

    /// Script effects applied when Enter is pressed in an element
    #[must_use]
    pub fn on_enter(self, id: impl Into<String>, effects: Vec<PageEffect>) -> Self {
        self.lock().on_enter.insert(id.into(), effects);
        self
    }

    /// Script effects applied when a container is submitted
    #[must_use]
    pub fn on_submit(self, form: impl Into<String>, effects: Vec<PageEffect>) -> Self {
        self.lock().on_submit.insert(form.into(), effects);
        self
    }

    /// Script effects applied on any point click
    #[must_use]
    pub fn on_click_point(self, effects: Vec<PageEffect>) -> Self {
        self.lock().on_click_point = effects;
        self
    }

    /// Make direct invocation fail for an element (style-hidden controls)
    #[must_use]
    pub fn failing_invoke(self, id: impl Into<String>) -> Self {
        self.lock().fail_invoke.insert(id.into());
        self
    }

    /// Make synthetic activation fail for an element as well
    #[must_use]
    pub fn failing_synthetic(self, id: impl Into<String>) -> Self {
        self.lock().fail_synthetic.insert(id.into());
        self
    }

    /// Hide an element mid-test
    pub fn script_hide(&self, id: &str) {
        if let Some(el) = self.lock().element_mut(id) {
            el.visible = false;
        }
    }

    /// Read an element's current value
    #[must_use]
    pub fn value_of(&self, id: &str) -> Option<String> {
        self.lock().element(id).map(|e| e.value.clone())
    }

    /// Read an element's checked state
    #[must_use]
    pub fn checked(&self, id: &str) -> bool {
        self.lock().element(id).is_some_and(|e| e.checked)
    }

    /// Ordered driver call log
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Points clicked via `click_point`
    #[must_use]
    pub fn clicked_points(&self) -> Vec<Point> {
        self.lock().clicked_points.clone()
    }

    /// Files attached so far, as (element key, path)
    #[must_use]
    pub fn attachments(&self) -> Vec<(String, String)> {
        self.lock().attachments.clone()
    }

    /// Whether the session was closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[async_trait]
impl FormDriver for SimulatedPage {
    async fn navigate(&mut self, url: &str) -> TramitarResult<()> {
        let mut model = self.lock();
        model.calls.push(format!("navigate:{url}"));
        model.url = url.to_string();
        model.token += 1;
        Ok(())
    }

    async fn find(&self, selector: &Selector) -> TramitarResult<Option<ElementHandle>> {
        let model = self.lock();
        Ok(model
            .elements
            .iter()
            .find(|e| e.matches(selector))
            .map(SimElement::handle))
    }

    async fn state(&self, handle: &ElementHandle) -> TramitarResult<ElementState> {
        let model = self.lock();
        Ok(model.element(&handle.id).map_or(ElementState::DETACHED, |e| {
            ElementState {
                exists: true,
                visible: e.visible,
                enabled: e.enabled,
            }
        }))
    }

    async fn value(&self, handle: &ElementHandle) -> TramitarResult<String> {
        let model = self.lock();
        Ok(model.require(&handle.id)?.value.clone())
    }

    async fn set_value(&self, handle: &ElementHandle, value: &str) -> TramitarResult<()> {
        let mut model = self.lock();
        model.calls.push(format!("set_value:{}", handle.id));
        model
            .element_mut(&handle.id)
            .ok_or_else(|| TramitarError::driver(format!("stale handle: {}", handle.id)))?
            .value = value.to_string();
        Ok(())
    }

    async fn is_checked(&self, handle: &ElementHandle) -> TramitarResult<bool> {
        let model = self.lock();
        Ok(model.require(&handle.id)?.checked)
    }

    async fn options(&self, handle: &ElementHandle) -> TramitarResult<Vec<OptionEntry>> {
        let model = self.lock();
        Ok(model.require(&handle.id)?.options.clone())
    }

    async fn select_option(&self, handle: &ElementHandle, value: &str) -> TramitarResult<()> {
        let mut model = self.lock();
        model.calls.push(format!("select:{}:{value}", handle.id));
        model
            .element_mut(&handle.id)
            .ok_or_else(|| TramitarError::driver(format!("stale handle: {}", handle.id)))?
            .value = value.to_string();
        Ok(())
    }

    async fn invoke(&self, handle: &ElementHandle) -> TramitarResult<()> {
        let mut model = self.lock();
        model.calls.push(format!("invoke:{}", handle.id));
        model.require(&handle.id)?;
        if model.fail_invoke.contains(&handle.id) {
            return Err(TramitarError::driver("element not interactable"));
        }
        if let Some(effects) = model.on_activate.get(&handle.id).cloned() {
            model.apply(&effects);
        }
        Ok(())
    }

    async fn dispatch_activation(&self, handle: &ElementHandle) -> TramitarResult<()> {
        let mut model = self.lock();
        model.calls.push(format!("dispatch:{}", handle.id));
        model.require(&handle.id)?;
        if model.fail_synthetic.contains(&handle.id) {
            return Err(TramitarError::driver("event dispatch rejected"));
        }
        if let Some(effects) = model.on_activate.get(&handle.id).cloned() {
            model.apply(&effects);
        }
        Ok(())
    }

    async fn submit_container(&self, handle: &ElementHandle) -> TramitarResult<()> {
        let mut model = self.lock();
        model.calls.push(format!("submit:{}", handle.id));
        let form = model
            .require(&handle.id)?
            .form
            .clone()
            .ok_or_else(|| TramitarError::driver("element has no submittable container"))?;
        if let Some(effects) = model.on_submit.get(&form).cloned() {
            model.apply(&effects);
        }
        Ok(())
    }

    async fn press_key(&self, handle: &ElementHandle, key: &str) -> TramitarResult<()> {
        let mut model = self.lock();
        model.calls.push(format!("key:{}:{key}", handle.id));
        model.require(&handle.id)?;
        if key == "Enter" {
            if let Some(effects) = model.on_enter.get(&handle.id).cloned() {
                model.apply(&effects);
            }
        }
        Ok(())
    }

    async fn click_point(&self, point: Point) -> TramitarResult<()> {
        let mut model = self.lock();
        model.calls.push(format!("click_point:{},{}", point.x, point.y));
        model.clicked_points.push(point);
        let effects = model.on_click_point.clone();
        model.apply(&effects);
        Ok(())
    }

    async fn bounding_box(&self, handle: &ElementHandle) -> TramitarResult<Option<BoundingBox>> {
        let model = self.lock();
        Ok(model.require(&handle.id)?.bbox)
    }

    async fn attach_file(&self, handle: &ElementHandle, path: &str) -> TramitarResult<()> {
        let mut model = self.lock();
        model.calls.push(format!("attach:{}", handle.id));
        let id = handle.id.clone();
        model
            .element_mut(&id)
            .ok_or_else(|| TramitarError::driver(format!("stale handle: {id}")))?
            .value = path.to_string();
        model.attachments.push((id, path.to_string()));
        Ok(())
    }

    async fn page_text(&self) -> TramitarResult<String> {
        Ok(self.lock().page_text.clone())
    }

    async fn page_token(&self) -> TramitarResult<String> {
        Ok(self.lock().token.to_string())
    }

    async fn close(&mut self) -> TramitarResult<()> {
        let mut model = self.lock();
        model.calls.push("close".to_string());
        model.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod element_state_tests {
        use super::*;

        #[test]
        fn qualifies_requires_all_three() {
            let good = ElementState {
                exists: true,
                visible: true,
                enabled: true,
            };
            assert!(good.qualifies());
            assert!(!ElementState { visible: false, ..good }.qualifies());
            assert!(!ElementState { enabled: false, ..good }.qualifies());
            assert!(!ElementState::DETACHED.qualifies());
        }
    }

    mod simulated_page_tests {
        use super::*;

        #[tokio::test]
        async fn find_matches_registered_selectors() {
            let page = SimulatedPage::new().with_element(
                SimElement::new("geo", "input")
                    .matching_css("input#address-search")
                    .with_value("37.7, -122.4"),
            );
            let handle = page
                .find(&Selector::css("input#address-search"))
                .await
                .unwrap()
                .expect("element registered");
            assert_eq!(handle.id, "geo");
            assert_eq!(page.value(&handle).await.unwrap(), "37.7, -122.4");
        }

        #[tokio::test]
        async fn class_pattern_matches_substring() {
            let page = SimulatedPage::new().with_element(
                SimElement::new("pin", "div").with_class("leaflet-marker-icon blue"),
            );
            let found = page
                .find(&Selector::class_pattern("leaflet-marker"))
                .await
                .unwrap();
            assert!(found.is_some());
        }

        #[tokio::test]
        async fn activation_effects_mutate_the_page() {
            let page = SimulatedPage::new()
                .with_element(SimElement::new("btn", "button").matching_css("#go"))
                .with_element(SimElement::new("map", "div").matching_css("#map").visible(false))
                .on_activate(
                    "btn",
                    vec![PageEffect::SetVisible {
                        target: "map".to_string(),
                        visible: true,
                    }],
                );
            let handle = page.find(&Selector::css("#go")).await.unwrap().unwrap();
            page.invoke(&handle).await.unwrap();

            let map = page.find(&Selector::css("#map")).await.unwrap().unwrap();
            assert!(page.state(&map).await.unwrap().visible);
        }

        #[tokio::test]
        async fn failing_invoke_still_records_the_attempt() {
            let page = SimulatedPage::new()
                .with_element(SimElement::new("btn", "button").matching_css("#go"))
                .failing_invoke("btn");
            let handle = page.find(&Selector::css("#go")).await.unwrap().unwrap();
            assert!(page.invoke(&handle).await.is_err());
            assert_eq!(page.calls(), vec!["invoke:btn"]);
        }

        #[tokio::test]
        async fn submit_requires_a_container() {
            let page = SimulatedPage::new()
                .with_element(SimElement::new("loose", "button").matching_css("#loose"));
            let handle = page.find(&Selector::css("#loose")).await.unwrap().unwrap();
            assert!(page.submit_container(&handle).await.is_err());
        }

        #[tokio::test]
        async fn navigation_bumps_the_page_token() {
            let mut page = SimulatedPage::new();
            let before = page.page_token().await.unwrap();
            page.navigate("https://city.example/report").await.unwrap();
            assert_ne!(page.page_token().await.unwrap(), before);
        }

        #[tokio::test]
        async fn clones_share_the_model() {
            let page = SimulatedPage::new()
                .with_element(SimElement::new("f", "input").matching_css("#f"));
            let mut owned: Box<dyn FormDriver> = Box::new(page.clone());
            owned.close().await.unwrap();
            assert!(page.is_closed());
        }
    }
}
