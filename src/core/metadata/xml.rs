//! Sony/XDCAM-style sidecar XML decoding.
//!
//! A video `DIR/BASE.EXT` may carry a companion `DIR/BASEM01.XML` holding a
//! `NonRealTimeMeta` document whose `CreationDate` element has the recording
//! instant in its `value` attribute, RFC3339-formatted.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::core::models::{CaptureReading, FileRecord};

const SOURCE_SIDECAR: &str = "XML:CreationDate";
const SOURCE_DIRECT: &str = "XML:CreationDate(direct)";

pub struct XmlExtractor;

impl XmlExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Sidecar path: look for the companion XML next to a video file.
    pub fn extract(&self, record: &FileRecord) -> CaptureReading {
        let Some(xml_path) = find_sidecar(&record.path) else {
            return CaptureReading::missing("XML metadata file not found");
        };
        extract_from(&xml_path, SOURCE_SIDECAR)
    }

    /// Direct path: the record itself is the XML document.
    pub fn extract_direct(&self, record: &FileRecord) -> CaptureReading {
        extract_from(&record.path, SOURCE_DIRECT)
    }
}

impl Default for XmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_from(xml_path: &Path, source_tag: &str) -> CaptureReading {
    let data = match fs::read_to_string(xml_path) {
        Ok(data) => data,
        Err(e) => return CaptureReading::missing(format!("failed to read XML: {e}")),
    };

    let value = match creation_date_value(&data) {
        Ok(Some(value)) => value,
        Ok(None) => return CaptureReading::missing("CreationDate not found in XML"),
        Err(e) => return CaptureReading::missing(format!("failed to parse XML: {e}")),
    };

    match DateTime::<FixedOffset>::parse_from_rfc3339(&value) {
        Ok(t) => CaptureReading::found(t, source_tag),
        Err(e) => CaptureReading::missing(format!("invalid date format: {e}")),
    }
}

/// Pull `CreationDate/@value` out of a `NonRealTimeMeta` document.
fn creation_date_value(xml: &str) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.local_name();
                let name = name.as_ref();

                if !saw_root {
                    if name != b"NonRealTimeMeta" {
                        // Some other document type; CreationDate is absent.
                        return Ok(None);
                    }
                    saw_root = true;
                    continue;
                }

                if name == b"CreationDate" {
                    for attr in e.attributes().with_checks(false).flatten() {
                        if attr.key.local_name().as_ref() == b"value" {
                            let value = attr.unescape_value()?;
                            return Ok(Some(value.into_owned()));
                        }
                    }
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Locate `BASEM01.XML` (then `BASEM01.xml`) next to a video path.
fn find_sidecar(video_path: &Path) -> Option<PathBuf> {
    let dir = video_path.parent()?;
    let stem = video_path.file_stem()?.to_string_lossy();

    for suffix in ["M01.XML", "M01.xml"] {
        let candidate = dir.join(format!("{stem}{suffix}"));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
