//! Built-in simulated street form for dry runs.
//!
//! The scripted page mirrors the markup families the built-in catalog
//! targets: a start button that swaps the page, a category radio, a
//! dependent subtype select, a geocode input wired to a map whose marker
//! reverse-geocodes the address, description fields, an anonymous option
//! and a submit that renders a confirmation.

use tramitar::{
    BoundingBox, ContactPreference, OptionEntry, PageEffect, SimElement, SimulatedPage,
    SubmissionRequest,
};

const DEMO_ADDRESS: &str = "3232 22ND ST, SAN FRANCISCO, CA 94110";

/// A default street-pothole request targeting the demo form
#[must_use]
pub fn demo_request() -> SubmissionRequest {
    SubmissionRequest {
        variant: "street".to_string(),
        category: "Street".to_string(),
        secondary_hint: Some("Pothole".to_string()),
        coordinates: "37.755196,-122.423207".to_string(),
        location_description: "northwest corner, near the hydrant".to_string(),
        detail_description: "Large pothole blocking the bike lane".to_string(),
        attachment_path: None,
        contact: ContactPreference::Anonymous,
        form_url: "https://city.example/report".to_string(),
    }
}

/// The scripted street report form
#[must_use]
pub fn demo_form() -> SimulatedPage {
    let confirmation = format!(
        "Thank you for your report.\nService Request Number: SF1234567\nAddress: {DEMO_ADDRESS}"
    );
    SimulatedPage::new()
        .with_element(
            SimElement::new("start", "button").matching_css("button[data-action='start-report']"),
        )
        .on_activate("start", vec![PageEffect::BumpToken])
        .with_element(SimElement::new("cat", "input").matching_css("input[value='Street']"))
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
        .with_element(SimElement::new("search", "button").matching_css("button#address-search-btn"))
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
                value: DEMO_ADDRESS.to_string(),
            }],
        )
        .with_element(
            SimElement::new("loc-desc", "textarea").matching_css("textarea#location-details"),
        )
        .with_element(SimElement::new("desc", "textarea").matching_css("textarea#description"))
        .with_element(SimElement::new("anon", "input").matching_css("input#contact-anonymous"))
        .on_activate(
            "anon",
            vec![PageEffect::SetChecked {
                target: "anon".to_string(),
                checked: true,
            }],
        )
        .with_element(SimElement::new("attach", "input").matching_css("input[type='file']"))
        .with_element(SimElement::new("email", "input").matching_css("input[type='email']"))
        .with_element(SimElement::new("submit", "button").matching_css("button[type='submit']"))
        .on_activate(
            "submit",
            vec![
                PageEffect::BumpToken,
                PageEffect::SetPageText { text: confirmation },
            ],
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tramitar::{
        CategoryOptionTable, LocatorCatalog, SequencerConfig, SessionHandle, StepSequencer,
        WaitOptions,
    };

    #[tokio::test]
    async fn demo_form_completes_the_demo_request() {
        let page = demo_form();
        let sequencer = StepSequencer::new(
            SessionHandle::acquire(Box::new(page.clone())),
            LocatorCatalog::builtin(),
            CategoryOptionTable::new(),
            SequencerConfig {
                retry_budget: 3,
                wait: WaitOptions::new().with_timeout(300).with_poll_interval(5),
            },
        );
        let record = sequencer.run(&demo_request()).await;
        assert!(record.success, "error: {:?}", record.error);
        assert_eq!(record.request_id.as_deref(), Some("SF1234567"));
        assert!(page.is_closed());
    }
}
