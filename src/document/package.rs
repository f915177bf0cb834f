use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::xml::{local_name, parse_xml_part, XmlEvent, XmlPart};
use crate::errors::DocumentError;

/// An OOXML package held in memory
#[derive(Debug, Clone)]
pub struct Package {
    pub entries: Vec<PackageEntry>,
}

/// One ZIP entry with the metadata needed to write it back unchanged
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl Package {
    /// Read every entry of a ZIP container
    pub fn read(bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut zip =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| DocumentError::extraction("package", e))?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).map_err(|e| DocumentError::extraction("package", e))?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| DocumentError::extraction(file.name(), e))?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn entry(&self, name: &str) -> Option<&PackageEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Parse a required XML part
    pub fn xml_part(&self, name: &str) -> Result<XmlPart, DocumentError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| DocumentError::extraction(name, "part is missing from the package"))?;
        parse_xml_part(name, &entry.data)
    }

    /// Relationship id to resolved part name for a source part
    ///
    /// `ppt/presentation.xml` reads `ppt/_rels/presentation.xml.rels` and
    /// resolves targets relative to `ppt/`.
    pub fn relationships(&self, source_part: &str) -> Result<HashMap<String, String>, DocumentError> {
        let (dir, file) = source_part.rsplit_once('/').unwrap_or(("", source_part));
        let rels_name = if dir.is_empty() {
            format!("_rels/{}.rels", file)
        } else {
            format!("{}/_rels/{}.rels", dir, file)
        };
        if !self.contains(&rels_name) {
            return Ok(HashMap::new());
        }

        let rels = self.xml_part(&rels_name)?;
        Ok(rels
            .events
            .iter()
            .filter(|e| matches!(e, XmlEvent::Start { name, .. } | XmlEvent::Empty { name, .. } if local_name(name) == "Relationship"))
            .filter_map(|e| Some((e.attr("Id")?.to_string(), resolve_target(dir, e.attr("Target")?))))
            .collect())
    }

    /// Entry names matching `{prefix}{N}.xml`, sorted by N
    pub fn numbered_parts(&self, prefix: &str) -> Vec<String> {
        let mut parts: Vec<(u32, String)> = self
            .entries
            .iter()
            .filter_map(|e| {
                let number = e.name.strip_prefix(prefix)?.strip_suffix(".xml")?.parse().ok()?;
                Some((number, e.name.clone()))
            })
            .collect();
        parts.sort();
        parts.into_iter().map(|(_, name)| name).collect()
    }

    /// Write the package, swapping in replaced part contents
    pub fn write_with_replacements(&self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, DocumentError> {
        let zip_error = |name: &str, e: &dyn std::fmt::Display| DocumentError::extraction(name, e);
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            let data = replacements.get(&entry.name).unwrap_or(&entry.data);
            let compression = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut options = SimpleFileOptions::default()
                .compression_method(compression)
                .last_modified_time(entry.last_modified);
            if let Some(mode) = entry.unix_mode {
                options = options.unix_permissions(mode);
            }
            if entry.is_dir || entry.name.ends_with('/') {
                zout.add_directory(entry.name.as_str(), options)
                    .map_err(|e| zip_error(&entry.name, &e))?;
            } else {
                zout.start_file(entry.name.as_str(), options)
                    .map_err(|e| zip_error(&entry.name, &e))?;
                zout.write_all(data).map_err(|e| zip_error(&entry.name, &e))?;
            }
        }
        let cursor = zout.finish().map_err(|e| zip_error("package", &e))?;
        Ok(cursor.into_inner())
    }
}

/// Resolve a relationship target against the source part's directory
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
