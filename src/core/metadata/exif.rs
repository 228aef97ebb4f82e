//! EXIF capture-time decoding.
//!
//! Reads just enough of the EXIF container to recover the capture datetime:
//! for JPEG, the marker stream is walked until the `Exif` APP1 segment; for
//! TIFF-based files (ARW/NEF/DNG and plain TIFF) the file prefix is treated
//! as the TIFF structure directly. Inside, IFD0 is chased to the Exif
//! sub-IFD and the `DateTimeOriginal` / `DateTimeDigitized` ASCII tags are
//! decoded. Timestamps carry no zone and are interpreted as local time.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

use crate::core::models::{CaptureReading, FileRecord};

/// TIFF tag: pointer to the Exif sub-IFD.
const TAG_EXIF_IFD: u16 = 0x8769;
/// Exif tag: DateTimeOriginal.
const TAG_DATETIME_ORIGINAL: u16 = 0x9003;
/// Exif tag: DateTimeDigitized.
const TAG_DATETIME_DIGITIZED: u16 = 0x9004;

/// How much of a bare TIFF file is read. EXIF IFDs sit near the front;
/// offsets past this window are treated as absent tags.
const TIFF_PREFIX_LIMIT: u64 = 4 * 1024 * 1024;

const SOURCE_DATETIME_ORIGINAL: &str = "EXIF:DateTimeOriginal";
const SOURCE_DATETIME_DIGITIZED: &str = "EXIF:DateTimeDigitized";

pub struct ExifExtractor;

impl ExifExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, record: &FileRecord) -> CaptureReading {
        let tiff = match read_tiff_block(&record.path) {
            Ok(data) => data,
            Err(e) => return CaptureReading::missing(format!("no EXIF data: {e}")),
        };

        match parse_capture_datetime(&tiff) {
            Some((naive, source_tag)) => CaptureReading::found(to_local(naive), source_tag),
            None => CaptureReading::missing("no capture time found in EXIF"),
        }
    }
}

impl Default for ExifExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// EXIF datetimes are zone-less local wall-clock values.
fn to_local(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    match Local.from_local_datetime(&naive).earliest() {
        Some(t) => t.fixed_offset(),
        None => Utc.from_utc_datetime(&naive).fixed_offset(),
    }
}

/// Locate the TIFF structure holding the EXIF IFDs.
fn read_tiff_block(path: &Path) -> Result<Vec<u8>, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut reader = BufReader::new(file);

    let mut head = [0u8; 2];
    reader
        .read_exact(&mut head)
        .map_err(|_| "file too short".to_string())?;

    match &head {
        [0xFF, 0xD8] => find_jpeg_exif_segment(&mut reader),
        [b'I', b'I'] | [b'M', b'M'] => {
            let mut data = head.to_vec();
            reader
                .take(TIFF_PREFIX_LIMIT - 2)
                .read_to_end(&mut data)
                .map_err(|e| e.to_string())?;
            Ok(data)
        }
        _ => Err("unrecognized container format".to_string()),
    }
}

/// Walk JPEG markers until the `Exif\0\0` APP1 segment, returning its TIFF
/// payload.
fn find_jpeg_exif_segment<R: Read>(r: &mut R) -> Result<Vec<u8>, String> {
    const EXIF_HEADER: &[u8] = b"Exif\0\0";

    loop {
        let marker = match read_marker(r) {
            Ok(Some(m)) => m,
            Ok(None) | Err(_) => return Err("no Exif segment in JPEG".to_string()),
        };

        // EOI / SOS: image data follows, no more metadata segments.
        if marker == 0xD9 || marker == 0xDA {
            return Err("no Exif segment in JPEG".to_string());
        }
        // Standalone markers carry no length word.
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            continue;
        }

        let seg_len = read_u16_be(r).map_err(|e| e.to_string())?;
        if seg_len < 2 {
            return Err("corrupt JPEG segment length".to_string());
        }
        let remaining = (seg_len - 2) as usize;

        if marker == 0xE1 {
            let mut data = vec![0u8; remaining];
            r.read_exact(&mut data).map_err(|e| e.to_string())?;
            if data.starts_with(EXIF_HEADER) {
                return Ok(data[EXIF_HEADER.len()..].to_vec());
            }
        } else {
            discard(r, remaining).map_err(|e| e.to_string())?;
        }
    }
}

fn read_marker<R: Read>(r: &mut R) -> io::Result<Option<u8>> {
    // Markers are 0xFF followed by a non-0xFF byte.
    let mut b = [0u8; 1];
    loop {
        if r.read_exact(&mut b).is_err() {
            return Ok(None);
        }
        if b[0] == 0xFF {
            break;
        }
    }
    loop {
        if r.read_exact(&mut b).is_err() {
            return Ok(None);
        }
        if b[0] != 0xFF {
            return Ok(Some(b[0]));
        }
    }
}

fn read_u16_be<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    Ok(u16::from_be_bytes(b))
}

fn discard<R: Read>(r: &mut R, mut n: usize) -> io::Result<()> {
    let mut buf = [0u8; 8192];
    while n > 0 {
        let take = buf.len().min(n);
        r.read_exact(&mut buf[..take])?;
        n -= take;
    }
    Ok(())
}

/// Extract the preferred capture datetime from a TIFF block.
fn parse_capture_datetime(tiff: &[u8]) -> Option<(NaiveDateTime, &'static str)> {
    if tiff.len() < 8 {
        return None;
    }
    let little = match &tiff[0..2] {
        b"II" => true,
        b"MM" => false,
        _ => return None,
    };
    if read_u16(tiff, 2, little)? != 42 {
        return None;
    }
    let ifd0 = read_u32(tiff, 4, little)? as usize;

    let exif_ifd = find_ifd_entry(tiff, ifd0, little, TAG_EXIF_IFD)
        .and_then(|(_, _, value_off)| read_u32(tiff, value_off, little))? as usize;

    for (tag, source) in [
        (TAG_DATETIME_ORIGINAL, SOURCE_DATETIME_ORIGINAL),
        (TAG_DATETIME_DIGITIZED, SOURCE_DATETIME_DIGITIZED),
    ] {
        if let Some(text) = read_ascii_entry(tiff, exif_ifd, little, tag) {
            if let Some(naive) = parse_exif_datetime(&text) {
                return Some((naive, source));
            }
        }
    }
    None
}

/// Walk one IFD looking for `tag`; yields (type, count, value-field offset).
fn find_ifd_entry(tiff: &[u8], ifd: usize, little: bool, tag: u16) -> Option<(u16, u32, usize)> {
    let n = read_u16(tiff, ifd, little)? as usize;
    let mut off = ifd + 2;
    for _ in 0..n {
        if off + 12 > tiff.len() {
            return None;
        }
        if read_u16(tiff, off, little)? == tag {
            let typ = read_u16(tiff, off + 2, little)?;
            let count = read_u32(tiff, off + 4, little)?;
            return Some((typ, count, off + 8));
        }
        off += 12;
    }
    None
}

/// Read an ASCII (type 2) tag value, inline or via offset.
fn read_ascii_entry(tiff: &[u8], ifd: usize, little: bool, tag: u16) -> Option<String> {
    let (typ, count, value_off) = find_ifd_entry(tiff, ifd, little, tag)?;
    if typ != 2 || count == 0 {
        return None;
    }
    let count = count as usize;
    let start = if count <= 4 {
        value_off
    } else {
        read_u32(tiff, value_off, little)? as usize
    };
    let bytes = tiff.get(start..start + count)?;
    let text: String = bytes
        .iter()
        .take_while(|b| **b != 0)
        .map(|b| *b as char)
        .collect();
    Some(text)
}

fn parse_exif_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), "%Y:%m:%d %H:%M:%S").ok()
}

fn read_u16(buf: &[u8], off: usize, little: bool) -> Option<u16> {
    let b: [u8; 2] = buf.get(off..off + 2)?.try_into().ok()?;
    Some(if little {
        u16::from_le_bytes(b)
    } else {
        u16::from_be_bytes(b)
    })
}

fn read_u32(buf: &[u8], off: usize, little: bool) -> Option<u32> {
    let b: [u8; 4] = buf.get(off..off + 4)?.try_into().ok()?;
    Some(if little {
        u32::from_le_bytes(b)
    } else {
        u32::from_be_bytes(b)
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::fs;
    use std::time::SystemTime;
    use tempfile::tempdir;

    /// Build a minimal little-endian TIFF block: IFD0 with one ExifIFD
    /// pointer, an Exif IFD with one ASCII datetime tag.
    pub(crate) fn tiff_with_datetime(tag: u16, value: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"II");
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes()); // IFD0 offset

        // IFD0: one entry pointing at the Exif IFD.
        let exif_ifd: u32 = 8 + 2 + 12 + 4;
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&TAG_EXIF_IFD.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes()); // LONG
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&exif_ifd.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // next IFD

        // Exif IFD: one ASCII entry, value stored out-of-line.
        let mut ascii = value.as_bytes().to_vec();
        ascii.push(0);
        let value_off: u32 = exif_ifd + 2 + 12 + 4;
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes()); // ASCII
        out.extend_from_slice(&(ascii.len() as u32).to_le_bytes());
        out.extend_from_slice(&value_off.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // next IFD
        out.extend_from_slice(&ascii);
        out
    }

    /// Wrap a TIFF block in a JPEG with a single Exif APP1 segment.
    pub(crate) fn jpeg_with_exif(tiff: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        let payload_len = (tiff.len() + 6 + 2) as u16;
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&payload_len.to_be_bytes());
        out.extend_from_slice(b"Exif\0\0");
        out.extend_from_slice(tiff);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }

    fn record_for(path: &std::path::Path) -> FileRecord {
        FileRecord {
            path: path.to_path_buf(),
            name: path.file_name().unwrap().to_string_lossy().to_string(),
            size: fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            modified: SystemTime::now(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
            is_video: false,
        }
    }

    #[test]
    fn decodes_datetime_original_from_jpeg() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("photo.jpg");
        let tiff = tiff_with_datetime(TAG_DATETIME_ORIGINAL, "2026:01:02 10:30:00");
        fs::write(&path, jpeg_with_exif(&tiff)).unwrap();

        let reading = ExifExtractor::new().extract(&record_for(&path));
        assert_eq!(reading.source_tag, "EXIF:DateTimeOriginal");
        let t = reading.capture_time.unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2026, 1, 2));
        assert_eq!((t.hour(), t.minute()), (10, 30));
    }

    #[test]
    fn decodes_datetime_from_bare_tiff() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("still.arw");
        fs::write(
            &path,
            tiff_with_datetime(TAG_DATETIME_ORIGINAL, "2024:06:15 08:00:01"),
        )
        .unwrap();

        let reading = ExifExtractor::new().extract(&record_for(&path));
        assert!(reading.error.is_empty());
        let t = reading.capture_time.unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2024, 6, 15));
    }

    #[test]
    fn falls_back_to_datetime_digitized() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("photo.jpg");
        let tiff = tiff_with_datetime(TAG_DATETIME_DIGITIZED, "2023:11:05 23:59:59");
        fs::write(&path, jpeg_with_exif(&tiff)).unwrap();

        let reading = ExifExtractor::new().extract(&record_for(&path));
        assert_eq!(reading.source_tag, "EXIF:DateTimeDigitized");
        assert!(reading.capture_time.is_some());
    }

    #[test]
    fn jpeg_without_exif_segment_reports_no_exif_data() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("photo.jpg");
        fs::write(&path, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();

        let reading = ExifExtractor::new().extract(&record_for(&path));
        assert!(reading.capture_time.is_none());
        assert!(reading.error.starts_with("no EXIF data:"), "{}", reading.error);
    }

    #[test]
    fn non_image_bytes_report_no_exif_data() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("photo.jpg");
        fs::write(&path, b"photo-bytes").unwrap();

        let reading = ExifExtractor::new().extract(&record_for(&path));
        assert!(reading.error.starts_with("no EXIF data:"));
    }

    #[test]
    fn exif_without_date_tags_reports_missing_capture_time() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("photo.jpg");
        // Valid TIFF whose Exif IFD carries an unrelated tag.
        let tiff = tiff_with_datetime(0x010F, "NotADate");
        fs::write(&path, jpeg_with_exif(&tiff)).unwrap();

        let reading = ExifExtractor::new().extract(&record_for(&path));
        assert_eq!(reading.error, "no capture time found in EXIF");
    }

    #[test]
    fn missing_file_reports_no_exif_data() {
        let temp = tempdir().unwrap();
        let reading = ExifExtractor::new().extract(&record_for(&temp.path().join("absent.jpg")));
        assert!(reading.error.starts_with("no EXIF data:"));
    }

    #[test]
    fn big_endian_tiff_parses() {
        let mut out = Vec::new();
        out.extend_from_slice(b"MM");
        out.extend_from_slice(&42u16.to_be_bytes());
        out.extend_from_slice(&8u32.to_be_bytes());
        let exif_ifd: u32 = 8 + 2 + 12 + 4;
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&TAG_EXIF_IFD.to_be_bytes());
        out.extend_from_slice(&4u16.to_be_bytes());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&exif_ifd.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        let ascii = b"2022:02:02 02:02:02\0";
        let value_off: u32 = exif_ifd + 2 + 12 + 4;
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&TAG_DATETIME_ORIGINAL.to_be_bytes());
        out.extend_from_slice(&2u16.to_be_bytes());
        out.extend_from_slice(&(ascii.len() as u32).to_be_bytes());
        out.extend_from_slice(&value_off.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(ascii);

        let (naive, source) = parse_capture_datetime(&out).unwrap();
        assert_eq!(source, "EXIF:DateTimeOriginal");
        assert_eq!(naive.year(), 2022);
    }
}
