//! Capture-time extraction.
//!
//! One reading per scanned file: videos look for a sidecar XML, XML files
//! are parsed directly, everything else goes through the EXIF decoder. A
//! file with no recoverable capture time is not an error at this level; the
//! pipeline places it under the unclassified directory.

mod exif;
mod xml;

pub use exif::ExifExtractor;
pub use xml::XmlExtractor;

use crate::core::models::{CaptureReading, FileRecord};

pub struct CaptureExtractor {
    exif: ExifExtractor,
    xml: XmlExtractor,
}

impl CaptureExtractor {
    pub fn new() -> Self {
        Self {
            exif: ExifExtractor::new(),
            xml: XmlExtractor::new(),
        }
    }

    pub fn extract(&self, record: &FileRecord) -> CaptureReading {
        if record.is_video {
            return self.xml.extract(record);
        }
        if record.extension == "xml" {
            return self.xml.extract_direct(record);
        }
        self.exif.extract(record)
    }
}

impl Default for CaptureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn record(path: std::path::PathBuf, extension: &str, is_video: bool) -> FileRecord {
        FileRecord {
            name: path.file_name().unwrap().to_string_lossy().to_string(),
            size: fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
            modified: SystemTime::now(),
            extension: extension.to_string(),
            is_video,
            path,
        }
    }

    #[test]
    fn video_dispatches_to_sidecar_xml() {
        let temp = tempdir().unwrap();
        let video = temp.path().join("C0005.MP4");
        fs::write(&video, b"not-really-video").unwrap();

        let reading = CaptureExtractor::new().extract(&record(video, "mp4", true));
        // No sidecar present: the XML branch's error proves the dispatch.
        assert_eq!(reading.error, "XML metadata file not found");
    }

    #[test]
    fn xml_file_dispatches_to_direct_parse() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("take.xml");
        fs::write(
            &path,
            "<NonRealTimeMeta><CreationDate value=\"2025-03-01T12:00:00Z\"/></NonRealTimeMeta>",
        )
        .unwrap();

        let reading = CaptureExtractor::new().extract(&record(path, "xml", false));
        assert_eq!(reading.source_tag, "XML:CreationDate(direct)");
    }

    #[test]
    fn still_image_dispatches_to_exif() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("photo.jpg");
        fs::write(&path, b"photo-bytes").unwrap();

        let reading = CaptureExtractor::new().extract(&record(path, "jpg", false));
        assert!(reading.error.starts_with("no EXIF data:"));
    }
}
