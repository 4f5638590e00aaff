//! Kismet device export ingestion.
//!
//! The export is newline-delimited JSON, one device per line. Every line is
//! parsed on its own: a malformed line is counted and skipped, and the rest of
//! the stream is still processed.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::interface::DeviceSighting;
use crate::store::devices::{DeviceStore, UpsertSummary};
use crate::telemetry::log::LogManager;

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("failed to read kismet source {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum KismetLineError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line is not valid utf-8")]
    Encoding,
    #[error("record has no mac address")]
    MissingMac,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Epoch(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    mac: Option<String>,
    #[serde(default)]
    ssid: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default, alias = "last_seen")]
    timestamp: Option<RawTimestamp>,
}

/// Epoch seconds from RFC 3339 or `%Y-%m-%dT%H:%M:%SZ` text (read as UTC).
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis() as f64 / 1000.0);
    }
    let head = text.split('+').next().unwrap_or(text);
    NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|naive| naive.and_utc().timestamp() as f64)
}

/// Parses one export line. Blank lines yield `Ok(None)`.
///
/// A missing or unreadable timestamp means the device was seen `now`.
pub fn parse_line(line: &str, now: f64) -> Result<Option<DeviceSighting>, KismetLineError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let raw: RawRecord = serde_json::from_str(line)?;
    let mac = raw
        .mac
        .map(|mac| mac.trim().to_ascii_uppercase())
        .filter(|mac| !mac.is_empty())
        .ok_or(KismetLineError::MissingMac)?;
    let last_seen = match raw.timestamp {
        Some(RawTimestamp::Epoch(seconds)) if seconds.is_finite() => seconds,
        Some(RawTimestamp::Text(text)) => parse_timestamp(&text).unwrap_or(now),
        _ => now,
    };
    Ok(Some(DeviceSighting {
        mac,
        ssid: raw.ssid,
        lat: raw.lat,
        lon: raw.lon,
        last_seen,
    }))
}

/// Counts for one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub ingested: usize,
    pub skipped: usize,
    pub blank: usize,
    pub upsert: UpsertSummary,
}

/// Feeds parsed Kismet records into a [`DeviceStore`].
pub struct KismetIngestor {
    store: Arc<DeviceStore>,
    skipped_total: AtomicU64,
    logger: LogManager,
}

impl KismetIngestor {
    pub fn new(store: Arc<DeviceStore>) -> Self {
        Self {
            store,
            skipped_total: AtomicU64::new(0),
            logger: LogManager::new("kismet"),
        }
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// Malformed lines skipped over the lifetime of this ingestor.
    pub fn skipped_total(&self) -> u64 {
        self.skipped_total.load(Ordering::Relaxed)
    }

    /// Reads every line of `reader` and upserts the valid records in one
    /// store update. Expired sightings are pruned relative to `now`.
    pub fn ingest_reader<R: BufRead>(&self, mut reader: R, now: f64) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();
        let mut batch = Vec::new();
        let mut buffer = Vec::new();
        let mut line_no = 0usize;

        loop {
            buffer.clear();
            let read = reader
                .read_until(b'\n', &mut buffer)
                .map_err(|source| IngestError::Read {
                    path: "<reader>".into(),
                    source,
                })?;
            if read == 0 {
                break;
            }
            line_no += 1;

            let parsed = std::str::from_utf8(&buffer)
                .map_err(|_| KismetLineError::Encoding)
                .and_then(|line| parse_line(line, now));
            match parsed {
                Ok(Some(sighting)) => {
                    batch.push(sighting);
                    report.ingested += 1;
                }
                Ok(None) => report.blank += 1,
                Err(err) => {
                    report.skipped += 1;
                    self.logger
                        .trace(&format!("skipping line {}: {}", line_no, err));
                }
            }
        }

        report.upsert = self.store.upsert_batch(batch, now);
        self.skipped_total
            .fetch_add(report.skipped as u64, Ordering::Relaxed);
        if report.skipped > 0 {
            self.logger.warn(&format!(
                "skipped {} malformed line(s) ({} total)",
                report.skipped,
                self.skipped_total()
            ));
        }
        Ok(report)
    }
}

/// Longest unterminated line kept between polls.
pub const MAX_FRAGMENT_BYTES: usize = 64 * 1024;

/// Follows a growing export file between polls.
///
/// Only complete lines are consumed; a trailing fragment waits for the next
/// poll. A fragment longer than [`MAX_FRAGMENT_BYTES`] is dropped and counted
/// as one skipped line, along with the rest of that line when it arrives. A
/// file that shrinks is treated as rotated and re-read from the start.
pub struct KismetTail {
    path: PathBuf,
    offset: u64,
    pending: Vec<u8>,
    discarding: bool,
}

impl KismetTail {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            pending: Vec::new(),
            discarding: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_new_bytes(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let len = file.metadata()?.len();
        if len < self.offset {
            self.offset = 0;
            self.pending.clear();
            self.discarding = false;
        }
        file.seek(SeekFrom::Start(self.offset))?;
        let mut fresh = Vec::new();
        file.read_to_end(&mut fresh)?;
        self.offset += fresh.len() as u64;
        Ok(Some(fresh))
    }

    /// Ingests lines appended since the previous poll. The store is pruned
    /// even when nothing new arrived.
    pub fn poll(&mut self, ingestor: &KismetIngestor, now: f64) -> Result<IngestReport, IngestError> {
        let fresh = self.read_new_bytes().map_err(|source| IngestError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        let Some(fresh) = fresh else {
            ingestor
                .logger
                .trace(&format!("{} not present yet", self.path.display()));
            ingestor.store.prune_expired(now);
            return Ok(IngestReport::default());
        };

        self.pending.extend_from_slice(&fresh);
        if self.discarding {
            match self.pending.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.pending.drain(..=end);
                    self.discarding = false;
                }
                None => self.pending.clear(),
            }
        }
        let complete = match self.pending.iter().rposition(|&b| b == b'\n') {
            Some(last) => {
                let rest = self.pending.split_off(last + 1);
                std::mem::replace(&mut self.pending, rest)
            }
            None => Vec::new(),
        };
        let mut report = ingestor.ingest_reader(Cursor::new(complete), now)?;

        if self.pending.len() > MAX_FRAGMENT_BYTES {
            ingestor.logger.warn(&format!(
                "dropping {} byte unterminated line in {}",
                self.pending.len(),
                self.path.display()
            ));
            self.pending.clear();
            self.discarding = true;
            report.skipped += 1;
            ingestor.skipped_total.fetch_add(1, Ordering::Relaxed);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::RetentionPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn ingest_text(kismet: &KismetIngestor, text: &str, now: f64) -> IngestReport {
        kismet.ingest_reader(Cursor::new(text.as_bytes()), now).unwrap()
    }

    fn ingestor(ttl: f64) -> KismetIngestor {
        let store = DeviceStore::new(RetentionPolicy::with_capacity(64).with_ttl(ttl));
        KismetIngestor::new(Arc::new(store))
    }

    #[test]
    fn truncated_line_is_skipped_and_counted() {
        let kismet = ingestor(300.0);
        let input = "{\"mac\":\"AA:BB:CC:DD:EE:FF\",\"ssid\":\"test\",\"lat\":1.0,\"lon\":2.0,\"timestamp\":100}\n{bad json";
        let report = ingest_text(&kismet, input, 150.0);
        assert_eq!(report.ingested, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(kismet.skipped_total(), 1);

        let devices = kismet.store().list();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].mac, "AA:BB:CC:DD:EE:FF");
        assert_eq!(devices[0].ssid.as_deref(), Some("test"));
        assert_eq!(devices[0].position(), Some((1.0, 2.0)));
        assert_eq!(devices[0].last_seen, 100.0);
    }

    #[test]
    fn valid_and_invalid_lines_are_counted_exactly() {
        let kismet = ingestor(1e9);
        let mut input = String::new();
        for idx in 0..7 {
            input.push_str(&format!("{{\"mac\":\"00:00:00:00:00:{:02X}\",\"timestamp\":{}}}\n", idx, idx));
        }
        for bad in ["nope", "{\"ssid\":\"no mac\"}", "[1,2,3]", "{\"mac\":\"AA\",\"lat\":\"north\"}"] {
            input.push_str(bad);
            input.push('\n');
        }
        input.push_str("\n   \n");

        let report = ingest_text(&kismet, &input, 10.0);
        assert_eq!(report.ingested, 7);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.blank, 2);
        assert_eq!(kismet.store().len(), 7);
    }

    #[test]
    fn invalid_utf8_line_does_not_abort_the_stream() {
        let kismet = ingestor(1e9);
        let mut bytes = b"{\"mac\":\"aa:01\",\"timestamp\":1}\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(b"{\"mac\":\"aa:02\",\"timestamp\":2}\n");
        let report = kismet.ingest_reader(Cursor::new(bytes), 5.0).unwrap();
        assert_eq!((report.ingested, report.skipped), (2, 1));
        assert!(kismet.store().get("AA:01").is_some());
    }

    #[test]
    fn timestamps_accept_last_seen_and_text_forms() {
        let epoch = parse_line(r#"{"mac":"aa","last_seen":42.5}"#, 0.0).unwrap().unwrap();
        assert_eq!(epoch.last_seen, 42.5);

        let text = parse_line(r#"{"mac":"aa","timestamp":"1970-01-01T00:01:40Z"}"#, 0.0)
            .unwrap()
            .unwrap();
        assert_eq!(text.last_seen, 100.0);

        let offset = parse_line(r#"{"mac":"aa","timestamp":"1970-01-01T00:01:40+00:00"}"#, 0.0)
            .unwrap()
            .unwrap();
        assert_eq!(offset.last_seen, 100.0);

        let missing = parse_line(r#"{"mac":"aa"}"#, 77.0).unwrap().unwrap();
        assert_eq!(missing.last_seen, 77.0);
        assert_eq!(missing.mac, "AA");
    }

    #[test]
    fn stale_sightings_are_pruned_on_ingest() {
        let kismet = ingestor(300.0);
        let input = "{\"mac\":\"aa\",\"timestamp\":100}\n{\"mac\":\"bb\",\"timestamp\":900}\n";
        let report = ingest_text(&kismet, input, 1000.0);
        assert_eq!(report.ingested, 2);
        assert_eq!(report.upsert.evicted, 1);
        assert_eq!(kismet.store().len(), 1);
        assert!(kismet.store().get("BB").is_some());
    }

    #[test]
    fn tail_reads_only_appended_complete_lines() {
        let kismet = ingestor(1e9);
        let mut file = NamedTempFile::new().unwrap();
        let mut tail = KismetTail::new(file.path());

        write!(file, "{{\"mac\":\"aa\",\"timestamp\":1}}\n{{\"mac\":\"bb\",").unwrap();
        file.flush().unwrap();
        let first = tail.poll(&kismet, 10.0).unwrap();
        assert_eq!((first.ingested, first.skipped), (1, 0));

        writeln!(file, "\"timestamp\":2}}").unwrap();
        file.flush().unwrap();
        let second = tail.poll(&kismet, 10.0).unwrap();
        assert_eq!((second.ingested, second.skipped), (1, 0));

        let third = tail.poll(&kismet, 10.0).unwrap();
        assert_eq!(third.ingested, 0);
        assert_eq!(kismet.store().len(), 2);
    }

    #[test]
    fn tail_restarts_after_truncation_and_tolerates_missing_file() {
        let kismet = ingestor(1e9);
        let mut missing = KismetTail::new("/nonexistent/kismet.jsonl");
        assert_eq!(missing.poll(&kismet, 0.0).unwrap(), IngestReport::default());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{\"mac\":\"aa\",\"timestamp\":1}}").unwrap();
        writeln!(file, "{{\"mac\":\"bb\",\"timestamp\":1}}").unwrap();
        file.flush().unwrap();
        let mut tail = KismetTail::new(file.path());
        assert_eq!(tail.poll(&kismet, 5.0).unwrap().ingested, 2);

        file.as_file().set_len(0).unwrap();
        let mut handle = file.reopen().unwrap();
        handle.seek(SeekFrom::Start(0)).unwrap();
        writeln!(handle, "{{\"mac\":\"cc\",\"timestamp\":3}}").unwrap();
        handle.flush().unwrap();
        assert_eq!(tail.poll(&kismet, 5.0).unwrap().ingested, 1);
        assert_eq!(kismet.store().len(), 3);
    }

    #[test]
    fn oversized_fragment_is_dropped_and_counted_once() {
        let kismet = ingestor(1e9);
        let mut file = NamedTempFile::new().unwrap();
        let mut tail = KismetTail::new(file.path());

        file.write_all(&vec![b'x'; MAX_FRAGMENT_BYTES + 1]).unwrap();
        file.flush().unwrap();
        let first = tail.poll(&kismet, 10.0).unwrap();
        assert_eq!((first.ingested, first.skipped), (0, 1));

        file.write_all(&vec![b'x'; 1024]).unwrap();
        file.flush().unwrap();
        assert_eq!(tail.poll(&kismet, 10.0).unwrap().skipped, 0);

        write!(file, "xx\n{{\"mac\":\"aa\",\"timestamp\":1}}\n").unwrap();
        file.flush().unwrap();
        let last = tail.poll(&kismet, 10.0).unwrap();
        assert_eq!((last.ingested, last.skipped), (1, 0));
        assert_eq!(kismet.skipped_total(), 1);
        assert_eq!(kismet.store().len(), 1);
    }
}
