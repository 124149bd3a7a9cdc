//! Tramitar — resilient automation engine for municipal complaint forms.
//!
//! Tramitar drives a city's report-an-issue wizard end to end: it resolves
//! unstable controls through ranked locator candidates, activates them
//! through a staged dispatch chain, walks the wizard steps with verified
//! completion predicates, resolves a raw coordinate pair into an address via
//! the form's own map widget, selects dependent category options once they
//! stabilize, and extracts the service-request number from the confirmation
//! page. Every run ends in a [`ConfirmationRecord`] — degraded outcomes are
//! recorded as notes, and only a missing required control, an exhausted
//! dispatch chain, or an unverifiable step aborts a submission.
//!
//! # Example
//!
//! ```
//! use tramitar::{
//!     CategoryOptionTable, ContactPreference, LocatorCatalog, SequencerConfig,
//!     SessionHandle, SimulatedPage, StepSequencer, SubmissionRequest,
//! };
//!
//! # async fn run() {
//! let session = SessionHandle::acquire(Box::new(SimulatedPage::new()));
//! let sequencer = StepSequencer::new(
//!     session,
//!     LocatorCatalog::builtin(),
//!     CategoryOptionTable::new(),
//!     SequencerConfig::default(),
//! );
//! let record = sequencer
//!     .run(&SubmissionRequest {
//!         variant: "street".to_string(),
//!         category: "Street".to_string(),
//!         secondary_hint: Some("Pothole".to_string()),
//!         coordinates: "37.755196,-122.423207".to_string(),
//!         location_description: "northwest corner".to_string(),
//!         detail_description: "Large pothole".to_string(),
//!         attachment_path: None,
//!         contact: ContactPreference::Anonymous,
//!         form_url: "https://city.example/report".to_string(),
//!     })
//!     .await;
//! println!("request id: {:?}", record.request_id);
//! # }
//! ```
//!
//! The `browser` feature adds `ChromiumFormDriver`, a real Chromium-backed
//! [`FormDriver`] over the DevTools protocol.

#![forbid(unsafe_code)]

pub mod confirm;
pub mod dependent;
pub mod dispatch;
pub mod driver;
pub mod locator;
pub mod location;
pub mod result;
pub mod session;
pub mod wait;
pub mod wizard;

#[cfg(feature = "browser")]
pub mod chromium;

pub use confirm::{ConfirmationExtractor, ConfirmationRecord, Extraction};
pub use dependent::{CategoryOptionTable, MatchKind, SecondaryOutcome, SecondarySelection};
pub use dispatch::{ActivationStage, DispatchOutcome};
pub use driver::{ElementHandle, ElementState, FormDriver, OptionEntry, PageEffect, SimElement, SimulatedPage};
pub use locator::{
    BoundingBox, CandidateSet, FieldRole, LocatorCandidate, LocatorCatalog, Point, Resolution,
    ResolvedControl, Selector,
};
pub use location::{LocationOutcome, LocationRequest, LocationWorkflow, MarkerStrategy};
pub use result::{TramitarError, TramitarResult};
pub use session::SessionHandle;
pub use wait::{WaitOptions, WaitOutcome, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
pub use wizard::{
    ContactPreference, SequencerConfig, StepSequencer, SubmissionRequest, WizardStep,
};

#[cfg(feature = "browser")]
pub use chromium::{ChromiumConfig, ChromiumFormDriver};
