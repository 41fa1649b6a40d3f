//! JSON-lines activity event input.
//!
//! One event per line; blank lines are skipped. A line that fails to parse
//! does not stop the read: it is kept as a [`MalformedLine`] so the driver
//! can report it alongside the events that did parse.

use std::{
  fs::File,
  io::{BufRead, BufReader},
  path::Path,
};

use ghg_core::event::ActivityEvent;

use crate::Result;

/// An input line that is not a valid activity event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
  /// 1-based line number within its source.
  pub line:    usize,
  pub message: String,
}

impl MalformedLine {
  /// Stand-in event id for the rejection report.
  pub fn id(&self) -> String { format!("line:{}", self.line) }
}

#[derive(Debug, Default)]
pub struct EventBatch {
  pub events:    Vec<ActivityEvent>,
  pub malformed: Vec<MalformedLine>,
}

impl EventBatch {
  pub fn len(&self) -> usize { self.events.len() + self.malformed.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Append another batch, e.g. the next input file.
  pub fn extend(&mut self, other: EventBatch) {
    self.events.extend(other.events);
    self.malformed.extend(other.malformed);
  }
}

/// Read every line of `reader`. Only I/O failures are errors.
pub fn read_events(reader: impl BufRead) -> Result<EventBatch> {
  let mut batch = EventBatch::default();
  for (index, line) in reader.lines().enumerate() {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    match ActivityEvent::from_json(&line) {
      Ok(event) => batch.events.push(event),
      Err(e) => batch.malformed.push(MalformedLine { line: index + 1, message: e.to_string() }),
    }
  }
  Ok(batch)
}

/// [`read_events`] over a file. Malformed-line messages name the file.
pub fn read_events_file(path: &Path) -> Result<EventBatch> {
  let mut batch = read_events(BufReader::new(File::open(path)?))?;
  for malformed in &mut batch.malformed {
    malformed.message = format!("{}: {}", path.display(), malformed.message);
  }
  Ok(batch)
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;

  const INPUT: &str = r#"{"activity_event_id": "a", "scope": 1, "category": "mobile-combustion", "activity": "Diesel Fuel - Diesel Fuel", "raw_data": 103.45, "units": "gallon"}

not json
{"activity_event_id": "b", "scope": 2, "category": "purchased-electricity", "activity": "Mixed (electricity)", "raw_data": "1000", "units": "kwh", "supplier": "eversource"}
{"activity_event_id": "c", "scope": 7, "category": "x", "activity": "y", "raw_data": 1, "units": "kwh"}
"#;

  #[test]
  fn good_lines_parse_and_bad_lines_are_kept_with_line_numbers() {
    let batch = read_events(Cursor::new(INPUT)).unwrap();

    let ids: Vec<_> = batch.events.iter().map(|e| e.activity_event_id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);

    let lines: Vec<_> = batch.malformed.iter().map(MalformedLine::id).collect();
    assert_eq!(lines, ["line:3", "line:5"]);
    assert_eq!(batch.len(), 4);
  }

  #[test]
  fn numeric_raw_data_keeps_its_decimal_text() {
    let batch = read_events(Cursor::new(INPUT)).unwrap();
    assert_eq!(batch.events[0].raw_data.to_plain_string(), "103.45");
    assert_eq!(batch.events[1].extra["supplier"], "eversource");
  }

  #[test]
  fn empty_input_is_an_empty_batch() {
    let batch = read_events(Cursor::new("\n\n")).unwrap();
    assert!(batch.is_empty());
  }
}
