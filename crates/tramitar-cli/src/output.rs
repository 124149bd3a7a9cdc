//! Record output and console summary

use crate::error::CliResult;
use console::style;
use std::path::Path;
use tramitar::ConfirmationRecord;

/// Write the confirmation record as pretty JSON
pub fn write_record(record: &ConfirmationRecord, path: &Path) -> CliResult<()> {
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), "record written");
    Ok(())
}

/// Print a human-readable run summary to stdout
pub fn print_summary(record: &ConfirmationRecord, quiet: bool) {
    if quiet {
        return;
    }
    if record.success {
        println!("{} submission completed", style("ok").green().bold());
        match &record.request_id {
            Some(id) => println!("  request number  {}", style(id).cyan()),
            None => println!("  request number  {}", style("not found").yellow()),
        }
        if let Some(address) = &record.address {
            println!("  address         {address}");
        }
    } else {
        println!("{} submission failed", style("error").red().bold());
        if let Some(error) = &record.error {
            println!("  {error}");
        }
    }
    println!(
        "  steps           {}",
        record.completed_steps.join(" > ")
    );
    for note in &record.notes {
        println!("  {} {note}", style("note").yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record() -> ConfirmationRecord {
        ConfirmationRecord {
            success: true,
            request_id: Some("SF1234567".to_string()),
            address: Some("3232 22ND ST".to_string()),
            error: None,
            completed_steps: vec!["start".to_string(), "done".to_string()],
            notes: vec![],
            started_at: Utc::now(),
            finished_at: Utc::now(),
            session_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn record_is_written_as_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json");
        write_record(&record(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["requestId"], "SF1234567");
        assert_eq!(value["success"], true);
    }
}
