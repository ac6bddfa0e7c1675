use reqwest::multipart::{Form, Part};

use crate::error::{IntakeError, Result};

/// A binary attachment in an outbound form
#[derive(Debug, Clone)]
pub struct BinaryPart {
    /// Form field name
    pub field: String,
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// One outbound multipart request: text fields plus binary parts
#[derive(Debug, Clone, Default)]
pub struct SubmissionPayload {
    pub fields: Vec<(String, String)>,
    pub parts: Vec<BinaryPart>,
}

impl SubmissionPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn part(mut self, part: BinaryPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Render as a multipart form body
    pub fn to_form(&self) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        for part in &self.parts {
            let body = Part::bytes(part.bytes.clone())
                .file_name(part.filename.clone())
                .mime_str(&part.mime)
                .map_err(|e| {
                    IntakeError::Validation(format!("bad mime type {:?}: {}", part.mime, e))
                })?;
            form = form.part(part.field.clone(), body);
        }
        Ok(form)
    }
}

/// An image attached to a structured observation
#[derive(Debug, Clone)]
pub struct ImageFile {
    /// Original file name, used only for its extension
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Load from disk, guessing the mime type from the extension
    pub fn from_path(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime = image_mime(&name).to_string();
        Ok(Self { name, mime, bytes })
    }

    pub fn extension(&self) -> &str {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
    }

    /// Part named by position (1-based), keeping the original extension
    pub fn into_part(self, position: usize) -> BinaryPart {
        let field = format!("image_{}", position);
        BinaryPart {
            filename: format!("{}.{}", field, self.extension()),
            field,
            mime: self.mime,
            bytes: self.bytes,
        }
    }
}

fn image_mime(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_parts_named_positionally() {
        let part = ImageFile::new("IMG_0042.PNG", "image/png", vec![1, 2]).into_part(2);
        assert_eq!(part.field, "image_2");
        assert_eq!(part.filename, "image_2.PNG");
    }

    #[test]
    fn test_image_without_extension_defaults_to_jpg() {
        let part = ImageFile::new("photo", "image/jpeg", vec![]).into_part(1);
        assert_eq!(part.filename, "image_1.jpg");
    }

    #[test]
    fn test_bad_mime_is_rejected() {
        let payload = SubmissionPayload::new().part(BinaryPart {
            field: "audio".into(),
            filename: "a.wav".into(),
            mime: "not a mime".into(),
            bytes: vec![],
        });
        assert!(payload.to_form().is_err());
    }
}
