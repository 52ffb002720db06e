//! Persona definitions and lookup
//!
//! Each persona is a fixed record: a system prompt, a template that frames
//! the user's text, a fallback message shown when generation fails and a
//! sampling temperature that overrides the provider default.

use crate::{prompts, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Inventor,
    Translator,
    Curator,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Inventor, Persona::Translator, Persona::Curator];

    pub fn key(&self) -> &'static str {
        match self {
            Persona::Inventor => "inventor",
            Persona::Translator => "translator",
            Persona::Curator => "curator",
        }
    }

    /// Whether the persona's output carries an image prompt worth rendering.
    pub fn generates_images(&self) -> bool {
        matches!(self, Persona::Curator)
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonaDefinition {
    pub persona: Persona,
    pub name: &'static str,
    pub description: &'static str,
    pub system_prompt: &'static str,
    pub user_template: &'static str,
    pub fallback_message: &'static str,
    pub temperature: Option<f32>,
}

impl PersonaDefinition {
    pub fn format_user_message(&self, query: &str) -> String {
        prompts::render(self.user_template, &[("query", query)])
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonaSummary {
    pub name: &'static str,
    pub description: &'static str,
    pub temperature: Option<f32>,
}

impl From<&PersonaDefinition> for PersonaSummary {
    fn from(definition: &PersonaDefinition) -> Self {
        Self {
            name: definition.name,
            description: definition.description,
            temperature: definition.temperature,
        }
    }
}

const INVENTOR: PersonaDefinition = PersonaDefinition {
    persona: Persona::Inventor,
    name: "Inventor of Imaginary Tools",
    description: "Creates whimsical inventions to solve problems",
    system_prompt: prompts::INVENTOR_SYSTEM,
    user_template: prompts::INVENTOR_USER,
    fallback_message:
        "Sorry, I couldn't invent a solution for that problem right now. Please try again later.",
    temperature: Some(0.8),
};

const TRANSLATOR: PersonaDefinition = PersonaDefinition {
    persona: Persona::Translator,
    name: "Translator of Unspoken Feelings",
    description: "Interprets subtext and emotions in messages",
    system_prompt: prompts::TRANSLATOR_SYSTEM,
    user_template: prompts::TRANSLATOR_USER,
    fallback_message: "Sorry, I couldn't analyze that message right now. Please try again later.",
    temperature: Some(0.7),
};

const CURATOR: PersonaDefinition = PersonaDefinition {
    persona: Persona::Curator,
    name: "Dream Healer and Curator of Surreal Art",
    description: "Transforms dreams into surreal art and stories",
    system_prompt: prompts::CURATOR_SYSTEM,
    user_template: prompts::CURATOR_USER,
    fallback_message: "Sorry, I couldn't interpret that dream right now. Please try again later.",
    temperature: Some(0.9),
};

/// Read-only table of the built-in personas.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    definitions: Vec<PersonaDefinition>,
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PersonaRegistry {
    pub fn new() -> Self {
        Self {
            definitions: vec![INVENTOR, TRANSLATOR, CURATOR],
        }
    }

    pub fn resolve(&self, key: &str) -> Result<&PersonaDefinition> {
        self.definitions
            .iter()
            .find(|definition| definition.persona.key() == key)
            .ok_or_else(|| {
                Error::InvalidPersona(format!(
                    "Persona '{}' not supported. Available personas: {}",
                    key,
                    self.available().join(", ")
                ))
            })
    }

    pub fn get(&self, persona: Persona) -> &PersonaDefinition {
        match persona {
            Persona::Inventor => &self.definitions[0],
            Persona::Translator => &self.definitions[1],
            Persona::Curator => &self.definitions[2],
        }
    }

    pub fn available(&self) -> Vec<&'static str> {
        self.definitions
            .iter()
            .map(|definition| definition.persona.key())
            .collect()
    }

    pub fn definitions(&self) -> &[PersonaDefinition] {
        &self.definitions
    }
}
