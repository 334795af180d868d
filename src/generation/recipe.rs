// SPDX-License-Identifier: GPL-3.0-only

//! Processing recipe sent to the generation service
//!
//! The recipe is a node graph: every node has a `class_type` and `inputs`,
//! and an input wired to another node is written as `[node_id, output_index]`.
//!
//! ```text
//! 58 visitor photo ─┬─ 21 background removal ─ 30 invert mask ──┐
//!                   ├─ 40 blur ─ 48 blend (masked by 2) ─ 20 ──── 27 blend ─ 51 watermark ─ 53 save
//!  2 base layer ────┘                                              52 frame logo ─┘
//! ```

use crate::constants;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Node ids of the recipe graph
pub mod nodes {
    pub const BASE_LAYER: &str = "2";
    pub const BACKGROUND_BLEND: &str = "20";
    pub const BACKGROUND_REMOVAL: &str = "21";
    pub const SUBJECT_COMPOSITE: &str = "27";
    pub const INVERTED_MASK: &str = "30";
    pub const BLUR: &str = "40";
    pub const BLURRED_BLEND: &str = "48";
    pub const WATERMARK: &str = "51";
    pub const WATERMARK_LOGO: &str = "52";
    pub const SAVE: &str = "53";
    pub const VISITOR_PHOTO: &str = "58";
}

/// Tunable parameters of the recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeParams {
    /// Background layer image, already present on the generation server
    pub base_image: String,
    /// Frame/logo image used by the watermark node
    pub watermark_image: String,
    /// Background removal confidence threshold
    pub removal_threshold: f64,
    pub blur_radius: u32,
    pub blur_sigma: f64,
    pub blend_mode: String,
    pub blend_strength: f64,
    /// Filename prefix of the saved output
    pub output_prefix: String,
}

impl Default for RecipeParams {
    fn default() -> Self {
        Self {
            base_image: "fantasma.png".to_string(),
            watermark_image: "frame.png".to_string(),
            removal_threshold: 0.5,
            blur_radius: 10,
            blur_sigma: 1.0,
            blend_mode: "mix: normal".to_string(),
            blend_strength: 1.0,
            output_prefix: constants::generation::OUTPUT_FILENAME_PREFIX.to_string(),
        }
    }
}

fn link(node: &str, output: u32) -> Value {
    json!([node, output])
}

fn blender(params: &RecipeParams, base: Value, blend: Value, mask: Value) -> Value {
    json!({
        "inputs": {
            "strength": params.blend_strength,
            "blend_mode": params.blend_mode,
            "base_image": base,
            "blend_image": blend,
            "mask": mask
        },
        "class_type": "ImageBlender",
        "_meta": { "title": "ImageBlender" }
    })
}

/// Build the recipe graph with the visitor photo embedded as base64
pub fn build_graph(params: &RecipeParams, image_base64: &str) -> Value {
    use nodes::*;

    let mut graph = serde_json::Map::new();

    graph.insert(
        BASE_LAYER.into(),
        json!({
            "inputs": { "image": params.base_image, "upload": "image" },
            "class_type": "LoadImage",
            "_meta": { "title": "Load Base Image" }
        }),
    );
    graph.insert(
        BACKGROUND_BLEND.into(),
        blender(
            params,
            link(BASE_LAYER, 0),
            link(BLURRED_BLEND, 0),
            link(BASE_LAYER, 1),
        ),
    );
    graph.insert(
        BACKGROUND_REMOVAL.into(),
        json!({
            "inputs": {
                "threshold": params.removal_threshold,
                "torchscript_jit": "default",
                "image": link(VISITOR_PHOTO, 0)
            },
            "class_type": "InspyrenetRembgAdvanced",
            "_meta": { "title": "Inspyrenet Rembg Advanced" }
        }),
    );
    graph.insert(
        SUBJECT_COMPOSITE.into(),
        blender(
            params,
            link(VISITOR_PHOTO, 0),
            link(BACKGROUND_BLEND, 0),
            link(INVERTED_MASK, 0),
        ),
    );
    graph.insert(
        INVERTED_MASK.into(),
        json!({
            "inputs": { "mask": link(BACKGROUND_REMOVAL, 1) },
            "class_type": "InvertMask",
            "_meta": { "title": "InvertMask" }
        }),
    );
    graph.insert(
        BLUR.into(),
        json!({
            "inputs": {
                "blur_radius": params.blur_radius,
                "sigma": params.blur_sigma,
                "image": link(VISITOR_PHOTO, 0)
            },
            "class_type": "ImageBlur",
            "_meta": { "title": "Image Blur" }
        }),
    );
    graph.insert(
        BLURRED_BLEND.into(),
        blender(
            params,
            link(VISITOR_PHOTO, 0),
            link(BLUR, 0),
            link(BASE_LAYER, 1),
        ),
    );
    graph.insert(
        WATERMARK.into(),
        json!({
            "inputs": {
                "move_watermark": false,
                "move_watermark_step": 10,
                "watermark_text": "",
                "font": "",
                "font_size": 1,
                "logo_scale_percentage": 100,
                "x_padding": 0,
                "y_padding": 0,
                "rotation": 0,
                "opacity": 0,
                "image": link(SUBJECT_COMPOSITE, 0),
                "logo_image": link(WATERMARK_LOGO, 0),
                "mask": link(WATERMARK_LOGO, 1)
            },
            "class_type": "KimaraAIWatermarker",
            "_meta": { "title": "Kimara.ai Advanced Watermarker" }
        }),
    );
    graph.insert(
        WATERMARK_LOGO.into(),
        json!({
            "inputs": { "image": params.watermark_image, "upload": "image" },
            "class_type": "LoadImage",
            "_meta": { "title": "Load Image" }
        }),
    );
    graph.insert(
        SAVE.into(),
        json!({
            "inputs": {
                "filename_prefix": params.output_prefix,
                "images": link(WATERMARK, 0)
            },
            "class_type": "SaveImage",
            "_meta": { "title": "Save Image" }
        }),
    );
    graph.insert(
        VISITOR_PHOTO.into(),
        json!({
            "inputs": { "data": image_base64 },
            "class_type": "LoadImageFromBase64",
            "_meta": { "title": "Load Image From Base64" }
        }),
    );

    Value::Object(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_embeds_photo_and_params() {
        let params = RecipeParams {
            blur_radius: 4,
            ..Default::default()
        };
        let graph = build_graph(&params, "QUJD");

        assert_eq!(graph["58"]["inputs"]["data"], "QUJD");
        assert_eq!(graph["40"]["inputs"]["blur_radius"], 4);
        assert_eq!(graph["2"]["inputs"]["image"], "fantasma.png");
        assert_eq!(graph["53"]["inputs"]["filename_prefix"], "tapp");
        assert_eq!(graph["21"]["inputs"]["threshold"], 0.5);
    }

    #[test]
    fn test_every_link_targets_an_existing_node() {
        let graph = build_graph(&RecipeParams::default(), "");
        let nodes = graph.as_object().unwrap();
        assert_eq!(nodes.len(), 11);

        for (id, node) in nodes {
            for (name, input) in node["inputs"].as_object().unwrap() {
                let pair = input
                    .as_array()
                    .filter(|a| a.len() == 2 && a[0].is_string() && a[1].is_u64());
                if let Some(pair) = pair {
                    let target = pair[0].as_str().unwrap();
                    assert!(
                        nodes.contains_key(target),
                        "node {} input {} links to missing node {}",
                        id,
                        name,
                        target
                    );
                }
            }
        }
    }

    #[test]
    fn test_save_node_consumes_watermark() {
        let graph = build_graph(&RecipeParams::default(), "");
        assert_eq!(graph[nodes::SAVE]["inputs"]["images"], json!(["51", 0]));
        assert_eq!(graph[nodes::SAVE]["class_type"], "SaveImage");
    }
}
