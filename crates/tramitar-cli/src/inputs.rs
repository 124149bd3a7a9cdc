//! Loading of request, catalog and option-table files

use crate::error::{CliError, CliResult};
use std::path::Path;
use tramitar::{CategoryOptionTable, LocatorCatalog, SubmissionRequest};

/// Load a submission request from a JSON file
pub fn load_request(path: &Path) -> CliResult<SubmissionRequest> {
    let text = std::fs::read_to_string(path)?;
    let request: SubmissionRequest = serde_json::from_str(&text)?;
    if request.coordinates.trim().is_empty() {
        return Err(CliError::invalid_argument("request has empty coordinates"));
    }
    if request.form_url.trim().is_empty() {
        return Err(CliError::invalid_argument("request has empty form_url"));
    }
    Ok(request)
}

/// Load a locator catalog, falling back to the built-in tables
pub fn load_catalog(path: Option<&Path>) -> CliResult<LocatorCatalog> {
    match path {
        None => Ok(LocatorCatalog::builtin()),
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let catalog: LocatorCatalog = serde_json::from_str(&text)?;
            if catalog.variant_names().is_empty() {
                return Err(CliError::config("catalog file declares no variants"));
            }
            Ok(catalog)
        }
    }
}

/// Load a category option table; absent means empty
pub fn load_table(path: Option<&Path>) -> CliResult<CategoryOptionTable> {
    match path {
        None => Ok(CategoryOptionTable::new()),
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn request_loads_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "variant": "street",
                "category": "Street",
                "coordinates": "37.755196,-122.423207",
                "location_description": "corner",
                "detail_description": "pothole",
                "form_url": "https://city.example/report"
            }}"#
        )
        .unwrap();
        let request = load_request(file.path()).unwrap();
        assert_eq!(request.variant, "street");
    }

    #[test]
    fn empty_coordinates_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "variant": "street",
                "category": "Street",
                "coordinates": "  ",
                "location_description": "corner",
                "detail_description": "pothole",
                "form_url": "https://city.example/report"
            }}"#
        )
        .unwrap();
        assert!(matches!(
            load_request(file.path()),
            Err(CliError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn missing_catalog_file_falls_back_to_builtin() {
        let catalog = load_catalog(None).unwrap();
        assert!(catalog.variant_names().contains(&"street"));
    }

    #[test]
    fn catalog_round_trips_through_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&LocatorCatalog::builtin()).unwrap();
        file.write_all(json.as_bytes()).unwrap();
        let catalog = load_catalog(Some(file.path())).unwrap();
        assert_eq!(
            catalog.variant_names(),
            LocatorCatalog::builtin().variant_names()
        );
    }
}
