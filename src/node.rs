//! Node declaration
//!
//! The schema a host's node browser needs to surface this node: class
//! and display names, category, and the full input layout with its
//! defaults.

use serde::{Deserialize, Serialize};

use crate::models::{FileType, SaveConfig};

pub const CLASS_NAME: &str = "SaveImageExtended";
pub const DISPLAY_NAME: &str = "Save Image (Extended)";
pub const CATEGORY: &str = "image";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDefinition {
    pub class_name: String,
    pub display_name: String,
    pub category: String,
    pub output_node: bool,
    pub return_types: Vec<String>,
    pub inputs: Vec<InputSlot>,
    pub hidden_inputs: Vec<HiddenSlot>,
}

/// A visible node input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSlot {
    pub name: String,
    #[serde(flatten)]
    pub kind: InputKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum InputKind {
    Image,
    String { default: String },
    Combo { options: Vec<String> },
    Boolean { default: bool },
}

/// A hidden input the host wires up itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HiddenSlot {
    pub name: String,
    pub source: String,
}

/// The full declaration, with input defaults taken from [`SaveConfig`]
/// so schema and runtime cannot drift apart.
pub fn definition() -> NodeDefinition {
    let defaults = SaveConfig::default();
    NodeDefinition {
        class_name: CLASS_NAME.to_string(),
        display_name: DISPLAY_NAME.to_string(),
        category: CATEGORY.to_string(),
        output_node: true,
        return_types: Vec::new(),
        inputs: vec![
            InputSlot {
                name: "images".to_string(),
                kind: InputKind::Image,
            },
            InputSlot {
                name: "filename_prefix".to_string(),
                kind: InputKind::String {
                    default: defaults.filename_prefix,
                },
            },
            InputSlot {
                name: "file_type".to_string(),
                kind: InputKind::Combo {
                    options: FileType::LABELS.iter().map(|s| s.to_string()).collect(),
                },
            },
            InputSlot {
                name: "save_metadata".to_string(),
                kind: InputKind::Boolean {
                    default: defaults.save_metadata,
                },
            },
        ],
        hidden_inputs: vec![
            HiddenSlot {
                name: "prompt".to_string(),
                source: "PROMPT".to_string(),
            },
            HiddenSlot {
                name: "extra_pnginfo".to_string(),
                source: "EXTRA_PNGINFO".to_string(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_wire_shape() {
        let json = serde_json::to_value(definition()).unwrap();

        assert_eq!(json["class_name"], "SaveImageExtended");
        assert_eq!(json["display_name"], "Save Image (Extended)");
        assert_eq!(json["category"], "image");
        assert_eq!(json["output_node"], json!(true));
        assert_eq!(json["return_types"], json!([]));

        assert_eq!(json["inputs"][0], json!({"name": "images", "type": "IMAGE"}));
        assert_eq!(
            json["inputs"][1],
            json!({"name": "filename_prefix", "type": "STRING", "default": "ComfyUI"})
        );
        assert_eq!(
            json["inputs"][2],
            json!({
                "name": "file_type",
                "type": "COMBO",
                "options": ["PNG", "JPEG", "WEBP (lossless)", "WEBP (lossy)"],
            })
        );
        assert_eq!(
            json["inputs"][3],
            json!({"name": "save_metadata", "type": "BOOLEAN", "default": true})
        );

        assert_eq!(
            json["hidden_inputs"],
            json!([
                {"name": "prompt", "source": "PROMPT"},
                {"name": "extra_pnginfo", "source": "EXTRA_PNGINFO"},
            ])
        );
    }

    #[test]
    fn test_definition_round_trips() {
        let def = definition();
        let json = serde_json::to_string(&def).unwrap();
        let back: NodeDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn test_combo_options_match_parseable_labels() {
        for slot in definition().inputs {
            if let InputKind::Combo { options } = slot.kind {
                for option in options {
                    assert_eq!(FileType::from_label(&option).label(), option);
                }
            }
        }
    }
}
