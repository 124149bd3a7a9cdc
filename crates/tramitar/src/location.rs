//! Location resolution against the form's embedded map widget.
//!
//! The engine does not geocode anything itself. It types a raw
//! "lat, lon" string into the geocode input, triggers the widget's own
//! search, nudges the map (two zoom-ins, then a marker or center click), and
//! then *observes* whether the widget reverse-geocoded an address back into
//! the field. Success is defined purely as "the field's value now differs
//! from the coordinate string we typed".
//!
//! Marker detection is best-effort by design: the widgets ship
//! theme-dependent marker markup, so the candidates are class patterns and
//! the fallback is a click on the geometric center of the map's bounding
//! box. An unresolved location is recorded, not fatal — a degraded address
//! beats a blocked submission.

use crate::dispatch;
use crate::driver::FormDriver;
use crate::locator::{self, FieldRole, LocatorCatalog, ResolvedControl};
use crate::result::{TramitarError, TramitarResult};
use crate::wait::{self, WaitOptions};
use serde::{Deserialize, Serialize};

/// Inputs to the location workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRequest {
    /// Raw "lat, lon" string
    pub coordinates: String,
    /// Free-text supplementary description
    pub description: String,
}

/// Which map interaction placed the pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStrategy {
    /// A marker-like element was activated
    Marker,
    /// Fallback click on the map's geometric center
    MapCenter,
    /// No map widget or bounding box available; nothing was clicked
    Skipped,
}

impl MarkerStrategy {
    /// Diagnostic name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Marker => "marker",
            Self::MapCenter => "map_center",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of the location workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOutcome {
    /// Whether the geocode field's value now differs from the raw coordinates
    pub resolved: bool,
    /// Final value of the geocode field (address on success, otherwise
    /// whatever remains in the field)
    pub final_value: String,
    /// Map interaction that was performed
    pub strategy: MarkerStrategy,
}

/// Drives coordinate entry, search, map interaction and description entry
pub struct LocationWorkflow<'a> {
    driver: &'a dyn FormDriver,
    catalog: &'a LocatorCatalog,
    variant: &'a str,
    opts: WaitOptions,
}

impl std::fmt::Debug for LocationWorkflow<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationWorkflow")
            .field("variant", &self.variant)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl<'a> LocationWorkflow<'a> {
    /// Create a workflow bound to one driver, catalog and form variant
    #[must_use]
    pub fn new(
        driver: &'a dyn FormDriver,
        catalog: &'a LocatorCatalog,
        variant: &'a str,
        opts: WaitOptions,
    ) -> Self {
        Self {
            driver,
            catalog,
            variant,
            opts,
        }
    }

    /// Run the full workflow.
    ///
    /// # Errors
    ///
    /// Fatal only when a required control (geocode input, description field)
    /// cannot be resolved or the driver fails; an unresolved location is
    /// reported through [`LocationOutcome::resolved`].
    pub async fn run(&self, request: &LocationRequest) -> TramitarResult<LocationOutcome> {
        let driver = self.driver;

        let geocode_set = self.catalog.require(self.variant, FieldRole::GeocodeInput)?;
        let geocode = locator::resolve_required(driver, geocode_set).await?;
        driver.set_value(&geocode.handle, &request.coordinates).await?;
        tracing::info!(coordinates = %request.coordinates, "coordinates entered");

        self.trigger_search(&geocode).await?;
        let map = self.wait_for_map().await?;
        self.zoom_in_twice().await?;
        let strategy = self.place_pin(map.as_ref()).await?;

        // An address replacing the coordinate string is the only success
        // signal the widget gives us.
        let coords = request.coordinates.as_str();
        let geocode_handle = &geocode.handle;
        let reverse = wait::wait_until(
            &self.opts.scaled_down(2),
            "reverse-geocoded address",
            move || async move {
                let value = driver.value(geocode_handle).await?;
                Ok(!value.is_empty() && value != coords)
            },
        )
        .await?;
        let final_value = driver.value(&geocode.handle).await?;
        if reverse.satisfied {
            tracing::info!(address = %final_value, strategy = strategy.as_str(), "location resolved");
        } else {
            tracing::warn!(strategy = strategy.as_str(), "location unresolved, continuing with field as-is");
        }

        // Description is written regardless of the resolution outcome.
        let desc_set = self
            .catalog
            .require(self.variant, FieldRole::LocationDescription)?;
        let description = locator::resolve_required(driver, desc_set).await?;
        driver
            .set_value(&description.handle, &request.description)
            .await?;
        driver.press_key(&description.handle, "Enter").await?;

        Ok(LocationOutcome {
            resolved: reverse.satisfied,
            final_value,
            strategy,
        })
    }

    /// Prefer the dedicated search control; fall back to the input's own
    /// default search behavior (Enter).
    async fn trigger_search(&self, geocode: &ResolvedControl) -> TramitarResult<()> {
        if let Some(set) = self.catalog.get(self.variant, FieldRole::SearchControl) {
            if let Some(search) = locator::resolve_first(self.driver, set).await?.found() {
                dispatch::press(self.driver, &search.handle, FieldRole::SearchControl).await?;
                return Ok(());
            }
        }
        tracing::debug!("no search control, submitting via Enter on the geocode input");
        self.driver.press_key(&geocode.handle, "Enter").await
    }

    async fn wait_for_map(&self) -> TramitarResult<Option<ResolvedControl>> {
        let Some(set) = self.catalog.get(self.variant, FieldRole::MapCanvas) else {
            return Ok(None);
        };
        let driver = self.driver;
        wait::wait_for_value(&self.opts, "map widget render", move || async move {
            Ok(locator::resolve_first(driver, set).await?.found())
        })
        .await
    }

    /// Exactly two zoom activations; a missing or inert zoom control is not
    /// worth failing the submission over.
    async fn zoom_in_twice(&self) -> TramitarResult<()> {
        let Some(set) = self.catalog.get(self.variant, FieldRole::ZoomIn) else {
            return Ok(());
        };
        let Some(zoom) = locator::resolve_first(self.driver, set).await?.found() else {
            tracing::debug!("no zoom-in control resolvable");
            return Ok(());
        };
        for _ in 0..2 {
            if !locator::revalidate(self.driver, &zoom.handle).await? {
                break;
            }
            if let Err(e) = dispatch::press(self.driver, &zoom.handle, FieldRole::ZoomIn).await {
                tracing::warn!(error = %e, "zoom-in activation failed");
                break;
            }
        }
        Ok(())
    }

    async fn place_pin(&self, map: Option<&ResolvedControl>) -> TramitarResult<MarkerStrategy> {
        if let Some(set) = self.catalog.get(self.variant, FieldRole::MapMarker) {
            let driver = self.driver;
            let marker = wait::wait_for_value(
                &self.opts.scaled_down(4),
                "map marker",
                move || async move { Ok(locator::resolve_first(driver, set).await?.found()) },
            )
            .await?;
            if let Some(marker) = marker {
                match dispatch::press(self.driver, &marker.handle, FieldRole::MapMarker).await {
                    Ok(_) => return Ok(MarkerStrategy::Marker),
                    Err(TramitarError::ActionDispatchFailed { message, .. }) => {
                        tracing::warn!(message, "marker activation failed, using center click");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        if let Some(map) = map {
            if let Some(bbox) = self.driver.bounding_box(&map.handle).await? {
                self.driver.click_point(bbox.center()).await?;
                return Ok(MarkerStrategy::MapCenter);
            }
        }
        tracing::warn!("no marker and no map bounding box, pin placement skipped");
        Ok(MarkerStrategy::Skipped)
    }
}
