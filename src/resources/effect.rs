//! Effects and pass selection
//!
//! An effect maps each pass it participates in to a program. Authoring
//! formats name passes with annotation strings; those strings are parsed into
//! [`PassKind`] once, when the effect is created, and the render graph only
//! ever looks techniques up by enum.

use rustc_hash::FxHashMap;

use super::storage::ProgramId;
use crate::errors::{Result, UmbraError};

/// Shading technique used by the forward opaque pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForwardTechnique {
    /// Lambert diffuse only.
    Generic,
    #[default]
    Pbr,
    Phong,
    /// Visualizes normals and shadow cascades.
    Debug,
}

impl ForwardTechnique {
    pub const ALL: [ForwardTechnique; 4] = [
        ForwardTechnique::Generic,
        ForwardTechnique::Pbr,
        ForwardTechnique::Phong,
        ForwardTechnique::Debug,
    ];

    pub fn annotation(self) -> &'static str {
        match self {
            ForwardTechnique::Generic => "forward",
            ForwardTechnique::Pbr => "forward_pbr",
            ForwardTechnique::Phong => "forward_phong",
            ForwardTechnique::Debug => "forward_debug",
        }
    }
}

/// Render passes a technique can be written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Depth only, from the camera or from a single shadow map layer.
    DepthOpaque,
    /// Depth only, once per shadow cascade.
    CascadedDepthOpaque,
    Forward(ForwardTechnique),
    /// Weighted-blended OIT accumulation.
    Transparent,
}

impl PassKind {
    /// Parses an annotation string from an authoring format.
    pub fn from_annotation(annotation: &str) -> Option<PassKind> {
        let kind = match annotation {
            "depth_opaque" => PassKind::DepthOpaque,
            "cascaded_depth_opaque" => PassKind::CascadedDepthOpaque,
            "transparent" => PassKind::Transparent,
            other => PassKind::Forward(
                ForwardTechnique::ALL
                    .into_iter()
                    .find(|technique| technique.annotation() == other)?,
            ),
        };
        Some(kind)
    }
}

#[derive(Debug, Clone)]
pub struct Effect {
    pub name: String,
    techniques: FxHashMap<PassKind, ProgramId>,
}

impl Effect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            techniques: FxHashMap::default(),
        }
    }

    /// Builds the technique table from `(annotation, program)` pairs.
    pub fn from_annotations<'a>(
        name: impl Into<String>,
        annotations: impl IntoIterator<Item = (&'a str, ProgramId)>,
    ) -> Result<Self> {
        let mut effect = Self::new(name);
        for (annotation, program) in annotations {
            let pass = PassKind::from_annotation(annotation)
                .ok_or_else(|| UmbraError::UnknownPassAnnotation(annotation.to_owned()))?;
            effect.techniques.insert(pass, program);
        }
        Ok(effect)
    }

    #[must_use]
    pub fn with_technique(mut self, pass: PassKind, program: ProgramId) -> Self {
        self.techniques.insert(pass, program);
        self
    }

    pub fn program_for(&self, pass: PassKind) -> Option<ProgramId> {
        self.techniques.get(&pass).copied()
    }

    pub fn passes(&self) -> impl Iterator<Item = PassKind> + '_ {
        self.techniques.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotations_parse_to_pass_kinds() {
        assert_eq!(PassKind::from_annotation("depth_opaque"), Some(PassKind::DepthOpaque));
        assert_eq!(
            PassKind::from_annotation("forward_phong"),
            Some(PassKind::Forward(ForwardTechnique::Phong))
        );
        assert_eq!(PassKind::from_annotation("forward_shiny"), None);
    }

    #[test]
    fn unknown_annotation_fails_effect_creation() {
        let result = Effect::from_annotations("bad", [("depth_opaque", ProgramId(0)), ("nope", ProgramId(1))]);
        assert!(matches!(result, Err(UmbraError::UnknownPassAnnotation(a)) if a == "nope"));
    }
}
