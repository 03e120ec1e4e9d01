//! Event fixture I/O for the CLI and integration tests.
//!
//! Events are stored as JSON Lines: one `EventRecord` per line, blank lines
//! ignored. The columnar detector reader stays outside this crate; anything
//! that can emit this format can feed a pass.

pub mod synthetic;

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::analysis::EventRecord;

/// Read every event of a JSON Lines file
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<EventRecord>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening events file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {} line {}", path.display(), idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: EventRecord = serde_json::from_str(&line)
            .with_context(|| format!("parsing {} line {}", path.display(), idx + 1))?;
        events.push(event);
    }
    log::info!("Read {} events from {}", events.len(), path.display());
    Ok(events)
}

/// Write records as JSON Lines, creating parent directories as needed
pub fn write_json_lines<P: AsRef<Path>, T: Serialize>(path: P, records: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)
            .with_context(|| format!("serializing record for {}", path.display()))?;
        writer.write_all(b"\n")?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

pub fn write_events<P: AsRef<Path>>(path: P, events: &[EventRecord]) -> Result<()> {
    write_json_lines(path, events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::synthetic::{SyntheticConfig, SyntheticGenerator};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("halo_muon_fixtures_{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_write_then_read_events() {
        let config = SyntheticConfig {
            events: 5,
            ..SyntheticConfig::default()
        };
        let events = SyntheticGenerator::new(config, 1).unwrap().generate();
        let path = temp_path("events.jsonl");

        write_events(&path, &events).unwrap();
        let loaded = read_events(&path).unwrap();

        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded[0].id, events[0].id);
        assert_eq!(loaded[4].hits.len(), events[4].hits.len());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_parse_error_names_line() {
        let path = temp_path("broken.jsonl");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "\n{\"id\": {\"run\": 1, \"event\": 1}}\nnot json\n").unwrap();

        let err = read_events(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(read_events("/nonexistent/events.jsonl").is_err());
    }
}
