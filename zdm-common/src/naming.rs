//! Destination naming
//!
//! Renders the configured folder/filename templates for one recording file.
//! The same rendering is used when uploading and when verifying, so both
//! passes agree on where a file should live.

use crate::models::{ProviderRecording, RecordingFile};
use crate::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use std::path::{Path, PathBuf};

/// Placeholders understood by filename and folder templates
pub const PLACEHOLDERS: &[&str] = &[
    "meeting_time",
    "topic",
    "rec_type",
    "recording_id",
    "file_extension",
    "year",
    "month",
    "day",
];

pub const DEFAULT_FILENAME_TEMPLATE: &str =
    "{meeting_time} - {topic} - {rec_type} - {recording_id}.{file_extension}";
pub const DEFAULT_FOLDER_TEMPLATE: &str = "{topic} - {meeting_time}";
pub const DEFAULT_STRFTIME: &str = "%Y.%m.%d - %I.%M %p UTC";

const MAX_COMPONENT_BYTES: usize = 255;

/// Where one file goes: folder components (already sanitized) plus file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationName {
    pub folder: Vec<String>,
    pub filename: String,
}

impl DestinationName {
    /// Folder components joined with `/`
    pub fn folder_path(&self) -> String {
        self.folder.join("/")
    }

    /// Scratch location under a local download directory
    pub fn local_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for component in &self.folder {
            path.push(component);
        }
        path.push(&self.filename);
        path
    }
}

/// Validated folder/filename templates
#[derive(Debug, Clone)]
pub struct NamingTemplate {
    filename: String,
    folder: String,
    strftime: String,
    timezone: Tz,
}

impl NamingTemplate {
    pub fn new(filename: &str, folder: &str, strftime: &str, timezone: Tz) -> Result<Self> {
        validate_template(filename)?;
        validate_template(folder)?;
        if StrftimeItems::new(strftime).any(|item| matches!(item, Item::Error)) {
            return Err(Error::Config(format!("invalid strftime pattern '{}'", strftime)));
        }

        Ok(Self {
            filename: filename.to_string(),
            folder: folder.to_string(),
            strftime: strftime.to_string(),
            timezone,
        })
    }

    /// Render the destination for `file` of `recording`
    pub fn render(&self, recording: &ProviderRecording, file: &RecordingFile) -> DestinationName {
        let local = recording.start_time.with_timezone(&self.timezone);
        let meeting_time = local.format(&self.strftime).to_string();
        let year = local.format("%Y").to_string();
        let month = local.format("%m").to_string();
        let day = local.format("%d").to_string();
        let topic = clean_topic(&recording.topic);
        let rec_type = title_case(&file.type_label().replace('_', " "));
        let file_extension = file.file_extension.to_lowercase();

        let values: [(&str, &str); 8] = [
            ("meeting_time", &meeting_time),
            ("topic", &topic),
            ("rec_type", &rec_type),
            ("recording_id", &file.id),
            ("file_extension", &file_extension),
            ("year", &year),
            ("month", &month),
            ("day", &day),
        ];

        let filename = sanitize_filename(&fill(&self.filename, &values));
        let folder = fill(&self.folder, &values)
            .split('/')
            .filter(|c| !c.trim().is_empty())
            .map(sanitize_filename)
            .collect();

        DestinationName { folder, filename }
    }
}

fn validate_template(template: &str) -> Result<()> {
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            Error::Config(format!("unclosed placeholder in template '{}'", template))
        })?;
        let name = &after[..close];
        if !PLACEHOLDERS.contains(&name) {
            return Err(Error::Config(format!(
                "unknown placeholder '{{{}}}' in template '{}'",
                name, template
            )));
        }
        rest = &after[close + 1..];
    }
    Ok(())
}

fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

/// Strip characters that cannot appear in file names on any platform
pub fn clean_topic(topic: &str) -> String {
    topic
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') && !c.is_control())
        .collect()
}

/// Capitalize the first letter of every word, lowercase the rest
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Make one path component safe for local disks and the destination
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = clean_topic(name);
    let trimmed = cleaned.trim_start().trim_end_matches(['.', ' ']);

    let mut out = String::new();
    for c in trimmed.chars() {
        if out.len() + c.len_utf8() > MAX_COMPONENT_BYTES {
            break;
        }
        out.push(c);
    }

    if out.is_empty() {
        "_".to_string()
    } else {
        out
    }
}
