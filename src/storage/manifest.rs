// src/storage/manifest.rs
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::core::Template;
use crate::utils::error::{HarnessError, Result};

/// One template's byte range inside the enrollment blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub template_id: String,
    pub length: u64,
    pub offset: u64,
}

impl ManifestEntry {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Ordered index of the enrollment blob. Lines are
/// `templateId length offset`; ranges are contiguous from offset zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    index: HashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a template of `length` bytes at the current end of the blob.
    pub fn push(&mut self, template_id: &str, length: u64) -> Result<&ManifestEntry> {
        if template_id.is_empty() || template_id.chars().any(char::is_whitespace) {
            return Err(HarnessError::Gallery(format!(
                "Invalid template identifier '{}'",
                template_id
            )));
        }
        if self.index.contains_key(template_id) {
            return Err(HarnessError::Gallery(format!(
                "Duplicate template identifier '{}'",
                template_id
            )));
        }

        let offset = self.total_len();
        offset.checked_add(length).ok_or_else(|| {
            HarnessError::Gallery("Enrollment blob exceeds 64-bit addressing".into())
        })?;

        self.index.insert(template_id.to_string(), self.entries.len());
        self.entries.push(ManifestEntry {
            template_id: template_id.to_string(),
            length,
            offset,
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn parse(reader: impl BufRead) -> Result<Self> {
        let mut manifest = Self::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            let [id, length, offset] = fields[..] else {
                return Err(HarnessError::Gallery(format!(
                    "Manifest line {}: expected 'templateId length offset'",
                    number + 1
                )));
            };
            let length: u64 = length.parse().map_err(|_| {
                HarnessError::Gallery(format!("Manifest line {}: bad length", number + 1))
            })?;
            let offset: u64 = offset.parse().map_err(|_| {
                HarnessError::Gallery(format!("Manifest line {}: bad offset", number + 1))
            })?;

            if offset != manifest.total_len() {
                return Err(HarnessError::Gallery(format!(
                    "Manifest line {}: offset {} does not follow previous range ending at {}",
                    number + 1,
                    offset,
                    manifest.total_len()
                )));
            }
            manifest.push(id, length)?;
        }
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            HarnessError::Gallery(format!("Cannot open manifest {}: {}", path.display(), e))
        })?;
        Self::parse(BufReader::new(file))
    }

    pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
        for entry in &self.entries {
            writeln!(writer, "{} {} {}", entry.template_id, entry.length, entry.offset)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.write_to(BufWriter::new(File::create(path)?))
    }

    /// Checks that every range lies inside a blob of `blob_len` bytes.
    pub fn check_blob_len(&self, blob_len: u64) -> Result<()> {
        if self.total_len() != blob_len {
            return Err(HarnessError::Gallery(format!(
                "Manifest describes {} bytes but blob holds {}",
                self.total_len(),
                blob_len
            )));
        }
        Ok(())
    }

    pub fn total_len(&self) -> u64 {
        self.entries.last().map_or(0, ManifestEntry::end)
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enrollment order of a template identifier.
    pub fn position(&self, template_id: &str) -> Option<usize> {
        self.index.get(template_id).copied()
    }

    pub fn read_template<R: Read + Seek>(blob: &mut R, entry: &ManifestEntry) -> Result<Template> {
        blob.seek(SeekFrom::Start(entry.offset))?;
        let length = usize::try_from(entry.length).map_err(|_| {
            HarnessError::Gallery(format!("Template {} is too large", entry.template_id))
        })?;
        let mut bytes = vec![0u8; length];
        blob.read_exact(&mut bytes)?;
        Ok(Template(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_push_assigns_contiguous_offsets() {
        let mut manifest = Manifest::new();
        manifest.push("E1", 10).unwrap();
        manifest.push("E2", 0).unwrap();
        manifest.push("E3", 5).unwrap();

        let offsets: Vec<u64> = manifest.entries().iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 10, 10]);
        assert_eq!(manifest.total_len(), 15);
        assert_eq!(manifest.position("E3"), Some(2));
    }

    #[test]
    fn test_duplicate_and_blank_ids_are_rejected() {
        let mut manifest = Manifest::new();
        manifest.push("E1", 1).unwrap();
        assert!(manifest.push("E1", 1).is_err());
        assert!(manifest.push("has space", 1).is_err());
        assert!(manifest.push("", 1).is_err());
    }

    #[test]
    fn test_parse_and_write_are_consistent() {
        let text = "E1 4 0\nE2 0 4\n\nE3 6 4\n";
        let manifest = Manifest::parse(Cursor::new(text)).unwrap();
        assert_eq!(manifest.len(), 3);

        let mut written = Vec::new();
        manifest.write_to(&mut written).unwrap();
        assert_eq!(String::from_utf8(written).unwrap(), "E1 4 0\nE2 0 4\nE3 6 4\n");
    }

    #[test]
    fn test_parse_rejects_gaps_and_bad_fields() {
        assert!(Manifest::parse(Cursor::new("E1 4 0\nE2 4 5\n")).is_err());
        assert!(Manifest::parse(Cursor::new("E1 4\n")).is_err());
        assert!(Manifest::parse(Cursor::new("E1 x 0\n")).is_err());
    }

    #[test]
    fn test_offsets_beyond_four_gib() {
        let big = 3 * (1u64 << 31);
        let text = format!("E1 {big} 0\nE2 {big} {big}\n");
        let manifest = Manifest::parse(Cursor::new(text)).unwrap();
        assert_eq!(manifest.total_len(), 2 * big);
        assert!(manifest.total_len() > u32::MAX as u64);
    }

    #[test]
    fn test_read_template_uses_offsets() {
        let mut manifest = Manifest::new();
        manifest.push("A", 2).unwrap();
        manifest.push("B", 3).unwrap();
        let mut blob = Cursor::new(vec![1u8, 2, 3, 4, 5]);

        let entry = manifest.entries()[1].clone();
        let template = Manifest::read_template(&mut blob, &entry).unwrap();
        assert_eq!(template.as_bytes(), &[3, 4, 5]);
        assert!(manifest.check_blob_len(5).is_ok());
        assert!(manifest.check_blob_len(6).is_err());
    }
}
