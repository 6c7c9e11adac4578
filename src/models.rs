//! Data models and structures
//!
//! Defines the host-facing wire types: the save configuration, the
//! workflow metadata bundle, and the descriptors returned to the UI.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Output format selector, matching the labels shown in the host's
/// file type dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Png,
    Jpeg,
    WebpLossless,
    WebpLossy,
}

impl FileType {
    /// Labels in dropdown order. These are wire values; changing them
    /// breaks saved workflows.
    pub const LABELS: [&'static str; 4] = ["PNG", "JPEG", "WEBP (lossless)", "WEBP (lossy)"];

    pub fn label(&self) -> &'static str {
        match self {
            FileType::Png => "PNG",
            FileType::Jpeg => "JPEG",
            FileType::WebpLossless => "WEBP (lossless)",
            FileType::WebpLossy => "WEBP (lossy)",
        }
    }

    /// Parses a dropdown label. Unknown labels fall back to PNG so that
    /// workflows saved by newer or foreign node versions still load.
    pub fn from_label(label: &str) -> Self {
        match label {
            "PNG" => FileType::Png,
            "JPEG" => FileType::Jpeg,
            "WEBP (lossless)" => FileType::WebpLossless,
            "WEBP (lossy)" => FileType::WebpLossy,
            other => {
                tracing::warn!("Unrecognized file type '{}', falling back to PNG", other);
                FileType::Png
            }
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for FileType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for FileType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(FileType::from_label(&label))
    }
}

/// Per-call save options, deserializable from the host's node inputs.
/// Missing fields take the node's advertised defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveConfig {
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,
    #[serde(default)]
    pub file_type: FileType,
    #[serde(default = "default_save_metadata")]
    pub save_metadata: bool,
}

fn default_filename_prefix() -> String {
    "ComfyUI".to_string()
}

fn default_save_metadata() -> bool {
    true
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            filename_prefix: default_filename_prefix(),
            file_type: FileType::default(),
            save_metadata: default_save_metadata(),
        }
    }
}

/// Workflow metadata supplied through the node's hidden inputs: the
/// generation prompt plus any named extra structures (wire name
/// `extra_pnginfo`, typically holding the workflow graph).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Value>,
    #[serde(default, rename = "extra_pnginfo")]
    pub extra_info: Map<String, Value>,
}

impl MetadataBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, prompt: Value) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_info.insert(key.into(), value);
        self
    }

    /// PNG text chunks: one `prompt` chunk if a prompt is present, then
    /// one chunk per extra-info entry. Values are ASCII-escaped JSON so
    /// the chunks stay Latin-1 clean.
    pub fn png_chunks(&self) -> Result<Vec<(String, String)>> {
        let mut chunks = Vec::new();
        if let Some(prompt) = &self.prompt {
            chunks.push(("prompt".to_string(), ascii_json(prompt)?));
        }
        for (key, value) in &self.extra_info {
            chunks.push((key.clone(), ascii_json(value)?));
        }
        Ok(chunks)
    }

    /// The EXIF user comment: a single JSON object with the prompt under
    /// `prompt` and every extra-info entry at top level. An entirely
    /// empty bundle still serializes to `{}`.
    pub fn exif_comment(&self) -> Result<String> {
        let mut merged = Map::new();
        if let Some(prompt) = &self.prompt {
            merged.insert("prompt".to_string(), prompt.clone());
        }
        for (key, value) in &self.extra_info {
            merged.insert(key.clone(), value.clone());
        }
        ascii_json(&Value::Object(merged))
    }
}

/// Where a saved image lives from the host's point of view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Output,
    Temp,
}

/// One saved file, as reported back to the host UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedImage {
    pub filename: String,
    pub subfolder: String,
    #[serde(rename = "type")]
    pub kind: ImageKind,
}

impl SavedImage {
    pub fn output(filename: String, subfolder: String) -> Self {
        Self {
            filename,
            subfolder,
            kind: ImageKind::Output,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiImages {
    pub images: Vec<SavedImage>,
}

/// The node's return value: descriptors wrapped under `ui.images`, the
/// shape the host expects from an output node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveSummary {
    pub ui: UiImages,
}

impl SaveSummary {
    pub fn new(images: Vec<SavedImage>) -> Self {
        Self {
            ui: UiImages { images },
        }
    }

    pub fn images(&self) -> &[SavedImage] {
        &self.ui.images
    }
}

/// Process-wide host settings injected at node construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSettings {
    /// Force-disables metadata embedding regardless of per-call flags.
    pub disable_metadata: bool,
}

impl HostSettings {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            disable_metadata: std::env::var("COMFY_DISABLE_METADATA")
                .map(|v| truthy(&v))
                .unwrap_or(false),
        }
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Serializes a value to JSON with every non-ASCII character escaped as
/// `\uXXXX` (surrogate pairs above the BMP), byte-compatible with what
/// the host's Python-side nodes embed.
pub fn ascii_json(value: &Value) -> Result<String> {
    let raw = serde_json::to_string(value)?;
    if raw.is_ascii() {
        return Ok(raw);
    }
    let mut escaped = String::with_capacity(raw.len() + 16);
    for ch in raw.chars() {
        if ch.is_ascii() {
            escaped.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_type_labels_round_trip() {
        for label in FileType::LABELS {
            let file_type = FileType::from_label(label);
            assert_eq!(file_type.label(), label);
        }
    }

    #[test]
    fn test_unknown_file_type_falls_back_to_png() {
        assert_eq!(FileType::from_label("AVIF"), FileType::Png);
        assert_eq!(FileType::from_label(""), FileType::Png);
    }

    #[test]
    fn test_file_type_serde_uses_labels() {
        let json = serde_json::to_string(&FileType::WebpLossy).unwrap();
        assert_eq!(json, "\"WEBP (lossy)\"");

        let parsed: FileType = serde_json::from_str("\"JPEG\"").unwrap();
        assert_eq!(parsed, FileType::Jpeg);
    }

    #[test]
    fn test_save_config_defaults() {
        let config: SaveConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.filename_prefix, "ComfyUI");
        assert_eq!(config.file_type, FileType::Png);
        assert!(config.save_metadata);
    }

    #[test]
    fn test_save_config_from_host_json() {
        let config: SaveConfig = serde_json::from_value(json!({
            "filename_prefix": "render/final",
            "file_type": "WEBP (lossless)",
            "save_metadata": false,
        }))
        .unwrap();
        assert_eq!(config.filename_prefix, "render/final");
        assert_eq!(config.file_type, FileType::WebpLossless);
        assert!(!config.save_metadata);
    }

    #[test]
    fn test_metadata_bundle_png_chunks() {
        let bundle = MetadataBundle::new()
            .with_prompt(json!({"seed": 42}))
            .with_extra("workflow", json!({"nodes": []}));

        let chunks = bundle.png_chunks().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], ("prompt".to_string(), "{\"seed\":42}".to_string()));
        assert_eq!(
            chunks[1],
            ("workflow".to_string(), "{\"nodes\":[]}".to_string())
        );
    }

    #[test]
    fn test_metadata_bundle_exif_comment_merges_extras() {
        let bundle = MetadataBundle::new()
            .with_prompt(json!({"seed": 42}))
            .with_extra("workflow", json!({"nodes": []}));

        let comment = bundle.exif_comment().unwrap();
        let parsed: Value = serde_json::from_str(&comment).unwrap();
        assert_eq!(parsed["prompt"]["seed"], json!(42));
        assert_eq!(parsed["workflow"]["nodes"], json!([]));
    }

    #[test]
    fn test_empty_bundle_exif_comment_is_empty_object() {
        let bundle = MetadataBundle::new();
        assert_eq!(bundle.exif_comment().unwrap(), "{}");
        assert!(bundle.png_chunks().unwrap().is_empty());
    }

    #[test]
    fn test_ascii_json_escapes_non_ascii() {
        assert_eq!(
            ascii_json(&json!("café")).unwrap(),
            "\"caf\\u00e9\"".to_string()
        );
        // Above the BMP: surrogate pair
        assert_eq!(
            ascii_json(&json!("🎨")).unwrap(),
            "\"\\ud83c\\udfa8\"".to_string()
        );
        assert_eq!(ascii_json(&json!({"a": 1})).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_saved_image_wire_shape() {
        let image = SavedImage::output("Test_00000_.png".to_string(), String::new());
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "filename": "Test_00000_.png",
                "subfolder": "",
                "type": "output",
            })
        );
    }

    #[test]
    fn test_save_summary_wire_shape() {
        let summary = SaveSummary::new(vec![SavedImage::output(
            "a_00000_.png".to_string(),
            "sub".to_string(),
        )]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["ui"]["images"][0]["filename"], "a_00000_.png");
        assert_eq!(json["ui"]["images"][0]["subfolder"], "sub");
        assert_eq!(json["ui"]["images"][0]["type"], "output");
    }

    #[test]
    fn test_truthy_values() {
        assert!(truthy("1"));
        assert!(truthy("true"));
        assert!(truthy("YES"));
        assert!(truthy(" True "));
        assert!(!truthy("0"));
        assert!(!truthy("false"));
        assert!(!truthy(""));
    }
}
