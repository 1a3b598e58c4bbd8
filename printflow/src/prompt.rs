//! Prompt templates for image generation.
//!
//! Image-to-3D conversion works far better on isolated, front-facing
//! subjects on clean backgrounds; these templates wrap a subject
//! description accordingly. `Custom` passes the prompt through verbatim.

use crate::request::ImageStyle;

/// The template applied for a style, with `{subject}` as the placeholder.
#[must_use]
pub fn style_template(style: ImageStyle) -> Option<&'static str> {
    match style {
        ImageStyle::Figurine => Some(
            "3D printable figurine of {subject}, \
             front-facing view, T-pose if character, \
             clean white background, studio lighting, \
             high detail, centered composition, \
             solid base for stability",
        ),
        ImageStyle::Object => Some(
            "Product photograph of {subject}, \
             white background, centered, \
             isometric view, studio lighting, \
             sharp details, no shadows, \
             isolated object",
        ),
        ImageStyle::Character => Some(
            "3D character design of {subject}, \
             full body, A-pose or T-pose, \
             front view, white background, \
             game-ready style, clear silhouette, \
             suitable for 3D modeling",
        ),
        ImageStyle::Sculpture => Some(
            "Classical sculpture of {subject}, \
             marble or bronze style, \
             dramatic lighting, museum quality, \
             detailed surface texture, \
             isolated on dark background",
        ),
        ImageStyle::Miniature => Some(
            "Tabletop miniature of {subject}, \
             28mm scale style, high detail, \
             heroic proportions, dynamic pose, \
             clean base, paintable surface detail",
        ),
        ImageStyle::Custom => None,
    }
}

/// Builds the provider prompt for a subject and style.
#[must_use]
pub fn build_prompt(subject: &str, style: ImageStyle) -> String {
    match style_template(style) {
        Some(template) => template.replace("{subject}", subject),
        None => subject.to_string(),
    }
}
