use std::fmt;

use serde::{Deserialize, Serialize};

use crate::languages::AUTO;

/// Cross-language translation or same-language rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Translate,
    Paraphrase,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Translate => f.write_str("Translate"),
            Mode::Paraphrase => f.write_str("Paraphrase"),
        }
    }
}

/// Tone directive applied to the instruction.
///
/// Any string is accepted on the wire; names outside the known set land in
/// `Other` and get the neutral clause.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Style {
    Casual,
    #[default]
    Formal,
    Professional,
    Creative,
    Humorous,
    Academic,
    Technical,
    Conversational,
    Other(String),
}

impl Style {
    pub const ALL: [Style; 8] = [
        Style::Casual,
        Style::Formal,
        Style::Professional,
        Style::Creative,
        Style::Humorous,
        Style::Academic,
        Style::Technical,
        Style::Conversational,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Style::Casual => "Casual",
            Style::Formal => "Formal",
            Style::Professional => "Professional",
            Style::Creative => "Creative",
            Style::Humorous => "Humorous",
            Style::Academic => "Academic",
            Style::Technical => "Technical",
            Style::Conversational => "Conversational",
            Style::Other(name) => name,
        }
    }

    /// Instruction clause for this style.
    pub fn directive(&self) -> &'static str {
        match self {
            Style::Casual => "Use casual, friendly, and conversational language",
            Style::Formal => "Use formal, polite, and refined language",
            Style::Professional => "Use professional, clear, and business-appropriate language",
            Style::Creative => "Use creative, expressive, and engaging language",
            _ => NEUTRAL_DIRECTIVE,
        }
    }
}

pub const NEUTRAL_DIRECTIVE: &str = "Use natural language";

impl From<String> for Style {
    fn from(name: String) -> Self {
        Style::ALL
            .iter()
            .find(|s| s.as_str() == name)
            .cloned()
            .unwrap_or(Style::Other(name))
    }
}

impl From<Style> for String {
    fn from(style: Style) -> Self {
        style.as_str().to_string()
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn auto() -> String {
    AUTO.to_string()
}

/// Body of `POST /api/paraphrase`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    pub text: String,
    #[serde(default = "auto")]
    pub source_lang: String,
    #[serde(default = "auto")]
    pub target_lang: String,
    #[serde(default)]
    pub style: Style,
    pub mode: Mode,
}

impl TransformRequest {
    /// Build the single instruction string sent to the provider.
    pub fn instruction(&self) -> String {
        let style = self.style.directive();
        match self.mode {
            Mode::Translate => {
                let from = if self.source_lang == AUTO {
                    "from the original language".to_string()
                } else {
                    format!("from {}", self.source_lang)
                };
                format!(
                    "Instructions: Translate the following text {from} to {target}. {style}.\n\
                     Output only the translated text without any explanations or additional text.\n\
                     \n\
                     Text to translate:\n{text}",
                    target = self.target_lang,
                    text = self.text,
                )
            }
            Mode::Paraphrase => {
                let within = if self.target_lang == AUTO {
                    "in the same language as the source text".to_string()
                } else {
                    format!("in {}", self.target_lang)
                };
                format!(
                    "Instructions: Rewrite the following text {within}. {style}.\n\
                     Keep the original language and meaning but use different wording and structure.\n\
                     Output only the paraphrased text without any explanations or additional text.\n\
                     \n\
                     Text to paraphrase:\n{text}",
                    text = self.text,
                )
            }
        }
    }
}
