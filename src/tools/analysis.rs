//! Canned analysis prompts.

use crate::{Error, ErrorContext};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisType {
    General,
    Objects,
    Text,
    Colors,
    Composition,
    Emotions,
}

impl AnalysisType {
    pub const ALL: [AnalysisType; 6] = [
        Self::General,
        Self::Objects,
        Self::Text,
        Self::Colors,
        Self::Composition,
        Self::Emotions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Objects => "objects",
            Self::Text => "text",
            Self::Colors => "colors",
            Self::Composition => "composition",
            Self::Emotions => "emotions",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Self::General => "Provide a comprehensive description of this image, including objects, people, setting, and overall composition.",
            Self::Objects => "Identify and list all objects, items, and things visible in this image. Be specific and detailed.",
            Self::Text => "Extract and transcribe any text, signs, labels, or written content visible in this image.",
            Self::Colors => "Analyze the color palette, dominant colors, and color scheme of this image. Describe the mood created by the colors.",
            Self::Composition => "Analyze the composition, framing, perspective, lighting, and artistic elements of this image.",
            Self::Emotions => "Describe the emotions, mood, and feelings conveyed by this image. What emotional response might it evoke?",
        }
    }
}

impl FromStr for AnalysisType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| {
                let choices: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                Error::validation_with_context(
                    format!("Invalid analysis type. Choose from: {}", choices.join(", ")),
                    ErrorContext::new()
                        .with_field_path("analysis_type")
                        .with_details(format!("got '{}'", s)),
                )
            })
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_names() {
        for t in AnalysisType::ALL {
            assert_eq!(t.as_str().parse::<AnalysisType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_type_lists_choices() {
        let err = "vibes".parse::<AnalysisType>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("general, objects, text, colors, composition, emotions"));
        assert!(msg.contains("got 'vibes'"));
    }

    #[test]
    fn prompts_are_distinct() {
        let mut prompts: Vec<_> = AnalysisType::ALL.iter().map(|t| t.prompt()).collect();
        prompts.dedup();
        assert_eq!(prompts.len(), AnalysisType::ALL.len());
    }
}
