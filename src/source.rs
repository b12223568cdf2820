//! Sources of link events
//!
//! The view never subscribes to anything itself; it is handed an
//! [`EventSource`] and polls it. Two sources are provided:
//!
//! - [`FileSource`] - events read from a JSON file or any reader
//! - [`ChannelSource`] - events pushed through a `tokio::sync::watch` channel

use std::collections::VecDeque;
use std::fs;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::graph::LinksEvent;

/// Errors that can occur while reading events
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read events: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse events: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Failed to parse event on line {line}: {source}")]
    LineError {
        line: usize,
        source: serde_json::Error,
    },
}

/// A supplier of link events
pub trait EventSource {
    /// Next pending event, if any
    fn poll(&mut self) -> Option<LinksEvent>;

    /// Where events come from, for log messages
    fn description(&self) -> &str;
}

/// Parse one or more events from text.
///
/// Accepts a single event object, a JSON array of events, or one event
/// object per line.
pub fn parse_events(text: &str) -> Result<Vec<LinksEvent>, SourceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    match serde_json::from_str::<LinksEvent>(trimmed) {
        Ok(event) => Ok(vec![event]),
        Err(whole) => {
            let lines: Vec<(usize, &str)> = trimmed
                .lines()
                .enumerate()
                .map(|(i, line)| (i + 1, line.trim()))
                .filter(|(_, line)| !line.is_empty())
                .collect();

            if lines.len() < 2 {
                return Err(whole.into());
            }

            lines
                .into_iter()
                .map(|(line, text)| {
                    serde_json::from_str(text).map_err(|source| SourceError::LineError { line, source })
                })
                .collect()
        }
    }
}

/// Events read up front from a file or reader
#[derive(Debug)]
pub struct FileSource {
    events: VecDeque<LinksEvent>,
    description: String,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let text = fs::read_to_string(path)?;
        Self::from_text(&text, &format!("file: {}", path.display()))
    }

    pub fn from_reader(mut reader: impl Read, description: &str) -> Result<Self, SourceError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_text(&text, description)
    }

    pub fn from_text(text: &str, description: &str) -> Result<Self, SourceError> {
        let events = parse_events(text)?;
        debug!(count = events.len(), source = description, "loaded events");
        Ok(Self {
            events: events.into(),
            description: description.to_string(),
        })
    }

    /// Events not yet polled
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl EventSource for FileSource {
    fn poll(&mut self) -> Option<LinksEvent> {
        self.events.pop_front()
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Events pushed by a producer through a watch channel.
///
/// Only the latest event is kept; a producer that sends faster than the view
/// polls has its intermediate events replaced.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: watch::Receiver<LinksEvent>,
    description: String,
}

impl ChannelSource {
    pub fn new(receiver: watch::Receiver<LinksEvent>, source_description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", source_description),
        }
    }

    /// Create a connected (sender, source) pair
    pub fn create(source_description: &str) -> (watch::Sender<LinksEvent>, Self) {
        let (tx, rx) = watch::channel(LinksEvent::default());
        (tx, Self::new(rx, source_description))
    }
}

impl EventSource for ChannelSource {
    fn poll(&mut self) -> Option<LinksEvent> {
        // the last value sent before the sender closed is still unseen here
        let current = self.receiver.borrow_and_update();
        if current.has_changed() {
            Some(LinksEvent::clone(&current))
        } else {
            None
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Link;
    use crate::moments::Moments;

    const EVENT: &str = r#"{"links":[{"parent":"a","child":"b","durationMoments":{"m0":1,"m1":2,"m2":0,"m3":0,"m4":0}}]}"#;

    #[test]
    fn test_parse_single_event() {
        let events = parse_events(EVENT).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].links[0].parent, "a");
    }

    #[test]
    fn test_parse_array() {
        let events = parse_events(&format!("[{}, {{\"links\": []}}]", EVENT)).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[1].links.is_empty());
    }

    #[test]
    fn test_parse_json_lines() {
        let text = format!("{}\n\n{}\n", EVENT, r#"{"links":[]}"#);
        let events = parse_events(&text).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_parse_json_lines_reports_line() {
        let text = format!("{}\n{{\"links\": 5}}\n", EVENT);
        match parse_events(&text) {
            Err(SourceError::LineError { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_events("  \n").unwrap().is_empty());
        assert!(matches!(
            parse_events("{not json"),
            Err(SourceError::ParseError(_))
        ));
    }

    #[test]
    fn test_file_source_polls_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        fs::write(&path, format!("{}\n{}\n", EVENT, r#"{"links":[]}"#)).unwrap();

        let mut source = FileSource::open(&path).unwrap();
        assert_eq!(source.remaining(), 2);
        assert!(source.description().starts_with("file: "));
        assert_eq!(source.poll().unwrap().links.len(), 1);
        assert_eq!(source.poll().unwrap().links.len(), 0);
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_channel_source() {
        let (tx, mut source) = ChannelSource::create("test");
        assert_eq!(source.description(), "channel: test");
        assert!(source.poll().is_none());

        let event = LinksEvent::new(vec![Link::new("a", "b", Moments::of(3.0))]);
        tx.send(event.clone()).unwrap();
        assert_eq!(source.poll(), Some(event));
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_channel_source_keeps_latest() {
        let (tx, mut source) = ChannelSource::create("test");
        tx.send(LinksEvent::new(vec![Link::new("a", "b", Moments::of(1.0))]))
            .unwrap();
        tx.send(LinksEvent::new(vec![Link::new("c", "d", Moments::of(1.0))]))
            .unwrap();

        assert_eq!(source.poll().unwrap().links[0].parent, "c");
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_channel_source_delivers_after_sender_dropped() {
        let (tx, mut source) = ChannelSource::create("once");
        let event = LinksEvent::new(vec![Link::new("a", "b", Moments::of(2.0))]);
        tx.send(event.clone()).unwrap();
        drop(tx);

        assert_eq!(source.poll(), Some(event));
        assert!(source.poll().is_none());
    }
}
