//! Multi-step submission sequencer.
//!
//! One submission is a linear walk through the wizard steps: start the
//! report, select the category pair, resolve the location, enter details,
//! choose contact handling, submit, extract the confirmation. Each step has
//! a completion predicate (a checked control, a committed value, a changed
//! page token) and a retry budget; a press that "succeeds" without moving
//! the predicate escalates the dispatcher to a later activation stage on the
//! next attempt instead of repeating the no-op.
//!
//! The sequencer never returns a `Result`: every run, fatal or not, ends in
//! a [`ConfirmationRecord`] that says how far the flow got, what degraded,
//! and what was extracted. Cancellation is cooperative and only observed at
//! step boundaries, so a step that has started always runs to its own
//! conclusion. The driver session is released on every exit path.

use crate::confirm::{self, ConfirmationExtractor, ConfirmationRecord, Extraction};
use crate::dependent::{self, CategoryOptionTable, MatchKind, SecondaryOutcome};
use crate::dispatch::{self, ActivationStage};
use crate::driver::ElementHandle;
use crate::locator::{self, FieldRole, LocatorCatalog};
use crate::location::{LocationRequest, LocationWorkflow};
use crate::result::{TramitarError, TramitarResult};
use crate::session::SessionHandle;
use crate::wait::{self, WaitOptions};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// States of the submission wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    /// Navigate to the form and start the report
    Start,
    /// Select the primary category and resolve the dependent secondary
    CategorySelect,
    /// Run the location resolution workflow
    LocationEntry,
    /// Enter the issue description and optional attachment
    DetailEntry,
    /// Anonymous reporting or contact e-mail
    ContactInfo,
    /// Final submission
    FinalSubmit,
    /// Confirmation reached; extraction runs here
    Done,
    /// Terminal failure state; reached only through a fatal error
    Failed,
}

impl WizardStep {
    /// Step name used in records, logs and error messages
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::CategorySelect => "category_select",
            Self::LocationEntry => "location_entry",
            Self::DetailEntry => "detail_entry",
            Self::ContactInfo => "contact_info",
            Self::FinalSubmit => "final_submit",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Successor in the linear flow; terminal states have none
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::CategorySelect),
            Self::CategorySelect => Some(Self::LocationEntry),
            Self::LocationEntry => Some(Self::DetailEntry),
            Self::DetailEntry => Some(Self::ContactInfo),
            Self::ContactInfo => Some(Self::FinalSubmit),
            Self::FinalSubmit => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Whether the step ends the flow
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the submitter wants to be contacted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactPreference {
    /// Report anonymously
    Anonymous,
    /// Leave a contact e-mail
    Email(String),
}

impl Default for ContactPreference {
    fn default() -> Self {
        Self::Anonymous
    }
}

/// Everything one submission needs, deserializable from a request file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// Form variant, keys the locator catalog (e.g. "street")
    pub variant: String,
    /// Primary category value (e.g. "Street")
    pub category: String,
    /// Preferred secondary category, matched against value or label
    #[serde(default)]
    pub secondary_hint: Option<String>,
    /// Raw "lat, lon" string for the geocode input
    pub coordinates: String,
    /// Supplementary location description
    pub location_description: String,
    /// Issue description
    pub detail_description: String,
    /// Path of a file to attach, if any
    #[serde(default)]
    pub attachment_path: Option<String>,
    /// Contact handling
    #[serde(default)]
    pub contact: ContactPreference,
    /// URL of the report form
    pub form_url: String,
}

/// Sequencer tuning
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Press attempts per verified step before the step fails
    pub retry_budget: u32,
    /// Wait budget shared by the step predicates
    pub wait: WaitOptions,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            wait: WaitOptions::default(),
        }
    }
}

/// Drives one submission through the wizard steps
pub struct StepSequencer {
    session: SessionHandle,
    catalog: LocatorCatalog,
    table: CategoryOptionTable,
    extractor: ConfirmationExtractor,
    config: SequencerConfig,
    cancel: CancellationToken,
}

impl StepSequencer {
    /// Create a sequencer owning the session for one run
    #[must_use]
    pub fn new(
        session: SessionHandle,
        catalog: LocatorCatalog,
        table: CategoryOptionTable,
        config: SequencerConfig,
    ) -> Self {
        Self {
            session,
            catalog,
            table,
            extractor: ConfirmationExtractor::new(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach an external cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the submission to completion.
    ///
    /// Failure is encoded in the returned record, never thrown past it; the
    /// session is released before this returns regardless of outcome.
    pub async fn run(mut self, request: &SubmissionRequest) -> ConfirmationRecord {
        let started_at = Utc::now();
        let session_id = self.session.id();
        let mut completed = Vec::new();
        let mut notes = Vec::new();

        let result = self.execute(request, &mut completed, &mut notes).await;
        if let Err(e) = self.session.release().await {
            tracing::warn!(error = %e, "session release failed");
        }

        let finished_at = Utc::now();
        match result {
            Ok(extraction) => {
                tracing::info!(
                    request_id = extraction.request_id.as_deref().unwrap_or("<none>"),
                    "submission completed"
                );
                ConfirmationRecord {
                    success: true,
                    request_id: extraction.request_id,
                    address: extraction.address,
                    error: None,
                    completed_steps: completed,
                    notes,
                    started_at,
                    finished_at,
                    session_id,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, completed = completed.len(), "submission failed");
                ConfirmationRecord {
                    success: false,
                    request_id: None,
                    address: None,
                    error: Some(e.to_string()),
                    completed_steps: completed,
                    notes,
                    started_at,
                    finished_at,
                    session_id,
                }
            }
        }
    }

    async fn execute(
        &mut self,
        request: &SubmissionRequest,
        completed: &mut Vec<String>,
        notes: &mut Vec<String>,
    ) -> TramitarResult<Extraction> {
        let mut step = WizardStep::Start;
        loop {
            if self.cancel.is_cancelled() {
                return Err(TramitarError::Cancelled {
                    step: step.as_str().to_string(),
                });
            }
            tracing::info!(step = step.as_str(), "step starting");
            match step {
                WizardStep::Start => self.step_start(request).await?,
                WizardStep::CategorySelect => self.step_category(request, notes).await?,
                WizardStep::LocationEntry => self.step_location(request, notes).await?,
                WizardStep::DetailEntry => self.step_detail(request, notes).await?,
                WizardStep::ContactInfo => self.step_contact(request, notes).await?,
                WizardStep::FinalSubmit => self.step_submit(request).await?,
                WizardStep::Done => {
                    let extraction = self.step_done(request, notes).await?;
                    completed.push(step.as_str().to_string());
                    return Ok(extraction);
                }
                // Failure is represented by the error path, never entered.
                WizardStep::Failed => {
                    return Err(TramitarError::driver("entered failed state"));
                }
            }
            completed.push(step.as_str().to_string());
            step = step.next().unwrap_or(WizardStep::Done);
        }
    }

    async fn step_start(&mut self, request: &SubmissionRequest) -> TramitarResult<()> {
        self.session.driver_mut().navigate(&request.form_url).await?;
        let driver = self.session.driver();
        let before = driver.page_token().await?;
        let set = self.catalog.require(&request.variant, FieldRole::PrimaryAction)?;
        let control = locator::resolve_required(driver, set).await?;

        let before = before.as_str();
        self.press_verified(
            &control.handle,
            FieldRole::PrimaryAction,
            WizardStep::Start,
            "page did not change after start",
            move || async move { Ok(driver.page_token().await? != before) },
        )
        .await
    }

    async fn step_category(
        &self,
        request: &SubmissionRequest,
        notes: &mut Vec<String>,
    ) -> TramitarResult<()> {
        let driver = self.session.driver();
        let set = self
            .catalog
            .require(&request.variant, FieldRole::CategoryControl)?;
        let control = locator::resolve_required(driver, set).await?;
        let handle = &control.handle;
        self.press_verified(
            handle,
            FieldRole::CategoryControl,
            WizardStep::CategorySelect,
            "category control never reported checked",
            move || async move { driver.is_checked(handle).await },
        )
        .await?;

        match self.catalog.get(&request.variant, FieldRole::SecondaryControl) {
            None => notes.push("secondary category control not cataloged".to_string()),
            Some(secondary_set) => {
                let outcome = dependent::resolve_secondary(
                    driver,
                    secondary_set,
                    &self.table,
                    &request.category,
                    request.secondary_hint.as_deref(),
                    &self.config.wait.scaled_down(2),
                )
                .await?;
                match outcome {
                    SecondaryOutcome::Selected(selection) => {
                        if selection.matched == MatchKind::FirstEnabled {
                            notes.push(format!(
                                "secondary hint unmatched, selected '{}'",
                                selection.label
                            ));
                        }
                    }
                    SecondaryOutcome::NoEnabledOptions => notes.push(format!(
                        "no enabled secondary options for '{}'",
                        request.category
                    )),
                    SecondaryOutcome::Unavailable => notes.push(format!(
                        "secondary control never resolved for '{}'",
                        request.category
                    )),
                }
            }
        }
        self.advance_if_present(&request.variant).await
    }

    async fn step_location(
        &self,
        request: &SubmissionRequest,
        notes: &mut Vec<String>,
    ) -> TramitarResult<()> {
        let workflow = LocationWorkflow::new(
            self.session.driver(),
            &self.catalog,
            &request.variant,
            self.config.wait.clone(),
        );
        let outcome = workflow
            .run(&LocationRequest {
                coordinates: request.coordinates.clone(),
                description: request.location_description.clone(),
            })
            .await?;
        if !outcome.resolved {
            notes.push(format!(
                "LocationUnresolved: geocode field still '{}'",
                outcome.final_value
            ));
        }
        self.advance_if_present(&request.variant).await
    }

    async fn step_detail(
        &self,
        request: &SubmissionRequest,
        notes: &mut Vec<String>,
    ) -> TramitarResult<()> {
        let driver = self.session.driver();
        let set = self
            .catalog
            .require(&request.variant, FieldRole::DetailDescription)?;
        let control = locator::resolve_required(driver, set).await?;
        driver
            .set_value(&control.handle, &request.detail_description)
            .await?;

        let handle = &control.handle;
        let text = request.detail_description.as_str();
        let committed = wait::wait_until(
            &self.config.wait.scaled_down(4),
            "detail description committed",
            move || async move { Ok(driver.value(handle).await? == text) },
        )
        .await?;
        if !committed.satisfied {
            return Err(TramitarError::StepVerificationTimeout {
                step: WizardStep::DetailEntry.as_str().to_string(),
                detail: "description value not committed".to_string(),
            });
        }

        if let Some(path) = &request.attachment_path {
            let attached = match self.catalog.get(&request.variant, FieldRole::AttachmentInput) {
                Some(attach_set) => locator::resolve_first(driver, attach_set).await?.found(),
                None => None,
            };
            match attached {
                Some(input) => driver.attach_file(&input.handle, path).await?,
                None => notes.push("attachment input not found, attachment skipped".to_string()),
            }
        }
        self.advance_if_present(&request.variant).await
    }

    async fn step_contact(
        &self,
        request: &SubmissionRequest,
        notes: &mut Vec<String>,
    ) -> TramitarResult<()> {
        let driver = self.session.driver();
        match &request.contact {
            ContactPreference::Anonymous => {
                let found = match self.catalog.get(&request.variant, FieldRole::ContactAnonymous) {
                    Some(set) => locator::resolve_first(driver, set).await?.found(),
                    None => None,
                };
                match found {
                    Some(control) => {
                        let handle = &control.handle;
                        self.press_verified(
                            handle,
                            FieldRole::ContactAnonymous,
                            WizardStep::ContactInfo,
                            "anonymous option never reported checked",
                            move || async move { driver.is_checked(handle).await },
                        )
                        .await?;
                    }
                    None => notes.push("anonymous contact option not found".to_string()),
                }
            }
            ContactPreference::Email(address) => {
                let set = self
                    .catalog
                    .require(&request.variant, FieldRole::ContactEmail)?;
                let control = locator::resolve_required(driver, set).await?;
                driver.set_value(&control.handle, address).await?;
            }
        }
        self.advance_if_present(&request.variant).await
    }

    async fn step_submit(&self, request: &SubmissionRequest) -> TramitarResult<()> {
        let driver = self.session.driver();
        let before = driver.page_token().await?;
        let set = self
            .catalog
            .require(&request.variant, FieldRole::SubmitControl)?;
        let control = locator::resolve_required(driver, set).await?;

        let before = before.as_str();
        self.press_verified(
            &control.handle,
            FieldRole::SubmitControl,
            WizardStep::FinalSubmit,
            "page token unchanged",
            move || async move { Ok(driver.page_token().await? != before) },
        )
        .await
    }

    async fn step_done(
        &self,
        request: &SubmissionRequest,
        notes: &mut Vec<String>,
    ) -> TramitarResult<Extraction> {
        let extraction = confirm::harvest(
            self.session.driver(),
            &self.catalog,
            &request.variant,
            &self.extractor,
        )
        .await?;
        if extraction.request_id.is_none() {
            notes.push("confirmation number not found".to_string());
        }
        Ok(extraction)
    }

    /// Press a per-page "next" control when the variant has one resolvable;
    /// single-page variants simply don't.
    async fn advance_if_present(&self, variant: &str) -> TramitarResult<()> {
        let Some(set) = self.catalog.get(variant, FieldRole::NextControl) else {
            return Ok(());
        };
        let driver = self.session.driver();
        if let Some(control) = locator::resolve_first(driver, set).await?.found() {
            dispatch::press(driver, &control.handle, FieldRole::NextControl).await?;
        }
        Ok(())
    }

    /// Press a control and wait for its completion predicate, escalating the
    /// activation stage on each attempt that pressed without effect.
    async fn press_verified<F, Fut>(
        &self,
        handle: &ElementHandle,
        role: FieldRole,
        step: WizardStep,
        failure_detail: &str,
        mut verify: F,
    ) -> TramitarResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TramitarResult<bool>>,
    {
        let driver = self.session.driver();
        let attempts = self.config.retry_budget.max(1);
        let per_attempt = self.config.wait.scaled_down(u64::from(attempts));
        let mut floor = ActivationStage::DirectInvoke;
        for attempt in 1..=attempts {
            let outcome = dispatch::press_from(driver, handle, role, floor).await?;
            let verified = wait::wait_until(&per_attempt, step.as_str(), &mut verify).await?;
            if verified.satisfied {
                return Ok(());
            }
            tracing::warn!(
                step = step.as_str(),
                attempt,
                stage = outcome.stage.as_str(),
                "press had no observable effect"
            );
            floor = escalate(outcome.stage);
        }
        Err(TramitarError::StepVerificationTimeout {
            step: step.as_str().to_string(),
            detail: failure_detail.to_string(),
        })
    }
}

impl std::fmt::Debug for StepSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepSequencer")
            .field("session", &self.session)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Next stage to try after one that pressed without effect
const fn escalate(stage: ActivationStage) -> ActivationStage {
    match stage {
        ActivationStage::DirectInvoke => ActivationStage::SyntheticEvent,
        ActivationStage::SyntheticEvent | ActivationStage::ContainerSubmit => {
            ActivationStage::ContainerSubmit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{OptionEntry, PageEffect, SimElement, SimulatedPage};
    use crate::locator::BoundingBox;

    const COORDS: &str = "37.755196,-122.423207";
    const ADDRESS: &str = "3232 22ND ST, SAN FRANCISCO, CA 94110";
    const CONFIRMATION: &str =
        "Thank you for your report.\nService Request Number: SF1234567\nAddress: 3232 22ND ST, SAN FRANCISCO, CA 94110";

    fn config() -> SequencerConfig {
        SequencerConfig {
            retry_budget: 3,
            wait: WaitOptions::new().with_timeout(300).with_poll_interval(5),
        }
    }

    fn request() -> SubmissionRequest {
        SubmissionRequest {
            variant: "street".to_string(),
            category: "Street".to_string(),
            secondary_hint: Some("Pothole".to_string()),
            coordinates: COORDS.to_string(),
            location_description: "northwest corner".to_string(),
            detail_description: "Large pothole blocking the bike lane".to_string(),
            attachment_path: None,
            contact: ContactPreference::Anonymous,
            form_url: "https://city.example/report".to_string(),
        }
    }

    /// A full scripted street-report form, happy path.
    fn street_form() -> SimulatedPage {
        street_form_with(SimElement::new("cat", "input").matching_css("input[value='Street']"))
    }

    fn street_form_with(category: SimElement) -> SimulatedPage {
        SimulatedPage::new()
            .with_element(
                SimElement::new("start", "button").matching_css("button[data-action='start-report']"),
            )
            .on_activate("start", vec![PageEffect::BumpToken])
            .with_element(category)
            .on_activate(
                "cat",
                vec![PageEffect::SetChecked {
                    target: "cat".to_string(),
                    checked: true,
                }],
            )
            .with_element(
                SimElement::new("subtype", "select")
                    .matching_css("select#request-subtype")
                    .with_options(vec![
                        OptionEntry::new("pothole", "Pothole"),
                        OptionEntry::new("crack", "Surface crack"),
                    ]),
            )
            .with_element(SimElement::new("geo", "input").matching_css("input#address-search"))
            .with_element(
                SimElement::new("search", "button").matching_css("button#address-search-btn"),
            )
            .on_activate(
                "search",
                vec![PageEffect::SetVisible {
                    target: "map".to_string(),
                    visible: true,
                }],
            )
            .with_element(
                SimElement::new("map", "div")
                    .matching_css("div#map")
                    .visible(false)
                    .with_bbox(BoundingBox::new(0.0, 0.0, 600.0, 400.0)),
            )
            .with_element(SimElement::new("zoom", "button").matching_css(".leaflet-control-zoom-in"))
            .with_element(SimElement::new("pin", "div").with_class("leaflet-marker-icon"))
            .on_activate(
                "pin",
                vec![PageEffect::SetValue {
                    target: "geo".to_string(),
                    value: ADDRESS.to_string(),
                }],
            )
            .with_element(
                SimElement::new("loc-desc", "textarea").matching_css("textarea#location-details"),
            )
            .with_element(SimElement::new("desc", "textarea").matching_css("textarea#description"))
            .with_element(
                SimElement::new("anon", "input").matching_css("input#contact-anonymous"),
            )
            .on_activate(
                "anon",
                vec![PageEffect::SetChecked {
                    target: "anon".to_string(),
                    checked: true,
                }],
            )
            .with_element(SimElement::new("submit", "button").matching_css("button[type='submit']"))
            .on_activate(
                "submit",
                vec![
                    PageEffect::BumpToken,
                    PageEffect::SetPageText {
                        text: CONFIRMATION.to_string(),
                    },
                ],
            )
    }

    fn sequencer(page: &SimulatedPage) -> StepSequencer {
        StepSequencer::new(
            SessionHandle::acquire(Box::new(page.clone())),
            LocatorCatalog::builtin(),
            CategoryOptionTable::new(),
            config(),
        )
    }

    #[tokio::test]
    async fn happy_path_walks_every_step_and_extracts_the_confirmation() {
        let page = street_form();
        let record = sequencer(&page).run(&request()).await;

        assert!(record.success, "notes: {:?} error: {:?}", record.notes, record.error);
        assert_eq!(record.request_id, Some("SF1234567".to_string()));
        assert_eq!(record.address, Some(ADDRESS.to_string()));
        assert_eq!(
            record.completed_steps,
            vec![
                "start",
                "category_select",
                "location_entry",
                "detail_entry",
                "contact_info",
                "final_submit",
                "done"
            ]
        );
        assert!(record.error.is_none());
        assert!(record.finished_at >= record.started_at);
        assert!(page.is_closed(), "session must be released");

        // State the steps left behind.
        assert!(page.checked("cat"));
        assert_eq!(page.value_of("subtype").unwrap(), "pothole");
        assert_eq!(page.value_of("geo").unwrap(), ADDRESS);
        assert_eq!(
            page.value_of("desc").unwrap(),
            "Large pothole blocking the bike lane"
        );
        assert!(page.checked("anon"));
    }

    #[tokio::test]
    async fn missing_primary_action_fails_with_nothing_completed() {
        let page = SimulatedPage::new();
        let record = sequencer(&page).run(&request()).await;

        assert!(!record.success);
        assert_eq!(
            record.error.as_deref(),
            Some("ElementNotFound: primary action control")
        );
        assert!(record.completed_steps.is_empty());
        assert!(page.is_closed(), "session must be released on failure too");
    }

    #[tokio::test]
    async fn unresolved_location_degrades_but_still_submits() {
        // Marker is inert: the click happens but no address comes back.
        let page = street_form().on_activate("pin", vec![]);
        let mut cfg = config();
        cfg.wait = WaitOptions::new().with_timeout(120).with_poll_interval(5);
        let record = StepSequencer::new(
            SessionHandle::acquire(Box::new(page.clone())),
            LocatorCatalog::builtin(),
            CategoryOptionTable::new(),
            cfg,
        )
        .run(&request())
        .await;

        assert!(record.success, "error: {:?}", record.error);
        assert_eq!(record.request_id, Some("SF1234567".to_string()));
        assert!(
            record
                .notes
                .iter()
                .any(|n| n.starts_with("LocationUnresolved")),
            "notes: {:?}",
            record.notes
        );
    }

    #[tokio::test]
    async fn no_effect_press_escalates_to_container_submit() {
        // The category radio only flips when its containing form is
        // submitted; the first two stages "succeed" without effect.
        let page = street_form_with(
            SimElement::new("cat", "input")
                .matching_css("input[value='Street']")
                .in_form("report-form"),
        )
        .on_activate("cat", vec![])
        .on_submit(
            "report-form",
            vec![PageEffect::SetChecked {
                target: "cat".to_string(),
                checked: true,
            }],
        );
        let record = sequencer(&page).run(&request()).await;

        assert!(record.success, "error: {:?}", record.error);
        assert!(page.calls().contains(&"submit:cat".to_string()));
    }

    #[tokio::test]
    async fn attachment_path_reaches_the_file_input() {
        let page = street_form()
            .with_element(SimElement::new("attach", "input").matching_css("input[type='file']"));
        let mut req = request();
        req.attachment_path = Some("/tmp/pothole.jpg".to_string());
        let record = sequencer(&page).run(&req).await;

        assert!(record.success, "error: {:?}", record.error);
        assert_eq!(
            page.attachments(),
            vec![("attach".to_string(), "/tmp/pothole.jpg".to_string())]
        );
    }

    #[tokio::test]
    async fn missing_attachment_input_is_noted_not_fatal() {
        let mut req = request();
        req.attachment_path = Some("/tmp/pothole.jpg".to_string());
        let record = sequencer(&street_form()).run(&req).await;

        assert!(record.success, "error: {:?}", record.error);
        assert!(record
            .notes
            .iter()
            .any(|n| n.contains("attachment skipped")), "notes: {:?}", record.notes);
    }

    #[tokio::test]
    async fn pre_cancelled_run_releases_the_session_and_reports_the_step() {
        let page = street_form();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let record = sequencer(&page).with_cancellation(cancel).run(&request()).await;

        assert!(!record.success);
        assert_eq!(record.error.as_deref(), Some("Cancelled before step start"));
        assert!(record.completed_steps.is_empty());
        assert!(page.is_closed());
    }

    #[tokio::test]
    async fn email_contact_is_entered_when_requested() {
        let page = street_form()
            .with_element(SimElement::new("email", "input").matching_css("input[type='email']"));
        let mut req = request();
        req.contact = ContactPreference::Email("reporter@example.org".to_string());
        let record = sequencer(&page).run(&req).await;

        assert!(record.success, "error: {:?}", record.error);
        assert_eq!(page.value_of("email").unwrap(), "reporter@example.org");
        assert!(!page.checked("anon"));
    }

    #[tokio::test]
    async fn record_serializes_with_camel_case_keys() {
        let page = street_form();
        let record = sequencer(&page).run(&request()).await;
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["requestId"], "SF1234567");
        assert!(json["completedSteps"].is_array());
    }

    mod step_machine_tests {
        use super::*;

        #[test]
        fn linear_order_ends_at_done() {
            let mut step = WizardStep::Start;
            let mut seen = vec![step];
            while let Some(next) = step.next() {
                step = next;
                seen.push(step);
            }
            assert_eq!(step, WizardStep::Done);
            assert!(step.is_terminal());
            assert_eq!(seen.len(), 7);
        }

        #[test]
        fn failed_is_terminal() {
            assert!(WizardStep::Failed.is_terminal());
            assert!(WizardStep::Failed.next().is_none());
        }
    }

    mod request_tests {
        use super::*;

        #[test]
        fn request_deserializes_with_defaults() {
            let json = r#"{
                "variant": "street",
                "category": "Street",
                "coordinates": "37.755196,-122.423207",
                "location_description": "corner",
                "detail_description": "pothole",
                "form_url": "https://city.example/report"
            }"#;
            let req: SubmissionRequest = serde_json::from_str(json).unwrap();
            assert_eq!(req.contact, ContactPreference::Anonymous);
            assert!(req.secondary_hint.is_none());
            assert!(req.attachment_path.is_none());
        }
    }
}
