//! Static bracket catalog
//!
//! The catalog is built once at startup, validated, and never mutated.
//! Titles rendered here are used both to issue the create command and to
//! recognize its confirmation, so rendering must be deterministic.

use crate::error::{LobbyError, Result};
use crate::types::{Bracket, OwnedLobby};
use serde::{Deserialize, Serialize};

/// Title template used by the default roster
pub const DEFAULT_TITLE_TEMPLATE: &str = "{min}-{upper}* | o!RL | Auto map select (!about)";

/// Ordered, immutable set of desired lobby brackets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketCatalog {
    brackets: Vec<Bracket>,
}

impl BracketCatalog {
    /// Build a catalog from an explicit bracket list
    pub fn new(brackets: Vec<Bracket>) -> Result<Self> {
        let catalog = Self { brackets };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The four-bracket roster of ranked auto-hosted lobbies
    pub fn default_roster() -> Self {
        let bracket = |min: f64, max: f64, score_v2: bool| Bracket {
            min_stars: min,
            max_stars: max,
            allow_double_time: false,
            score_v2,
            title_template: DEFAULT_TITLE_TEMPLATE.to_string(),
        };

        Self {
            brackets: vec![
                bracket(3.0, 4.0, false),
                bracket(4.0, 5.0, false),
                bracket(5.0, 6.0, false),
                bracket(6.0, 7.0, true),
            ],
        }
    }

    pub fn brackets(&self) -> &[Bracket] {
        &self.brackets
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    /// Render the lobby title for a bracket
    ///
    /// Placeholders: `{min}` and `{max}` are the bounds as written,
    /// `{upper}` is the upper bound minus 0.01 at two decimals.
    pub fn title_for(&self, bracket: &Bracket) -> String {
        render_title(bracket)
    }

    /// Brackets with no matching entry in the snapshot, in catalog order
    ///
    /// Owned lobbies are capped at one per bracket: a snapshot holding at
    /// least as many lobbies as the catalog has brackets leaves nothing
    /// missing, whatever their keys.
    pub fn missing_from(&self, snapshot: &[OwnedLobby]) -> Vec<&Bracket> {
        if snapshot.len() >= self.brackets.len() {
            return Vec::new();
        }

        self.brackets
            .iter()
            .filter(|bracket| !snapshot.iter().any(|owned| bracket.has_key(owned.min_stars)))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.brackets.is_empty() {
            return Err(config_error("Bracket catalog cannot be empty"));
        }

        for (i, bracket) in self.brackets.iter().enumerate() {
            if !bracket.min_stars.is_finite() || !bracket.max_stars.is_finite() {
                return Err(config_error(format!("Bracket {} has non-finite bounds", bracket)));
            }
            if bracket.min_stars < 0.0 || bracket.min_stars >= bracket.max_stars {
                return Err(config_error(format!(
                    "Bracket {} must satisfy 0 <= min < max",
                    bracket
                )));
            }
            if !bracket.title_template.contains("{min}") {
                return Err(config_error(format!(
                    "Title template for bracket {} must contain {{min}}",
                    bracket
                )));
            }

            for other in &self.brackets[..i] {
                if other.has_key(bracket.min_stars) {
                    return Err(config_error(format!(
                        "Duplicate bracket key {}",
                        bracket.min_stars
                    )));
                }
                if render_title(other) == render_title(bracket) {
                    return Err(config_error(format!(
                        "Brackets {} and {} render the same title",
                        other, bracket
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for BracketCatalog {
    fn default() -> Self {
        Self::default_roster()
    }
}

fn render_title(bracket: &Bracket) -> String {
    bracket
        .title_template
        .replace("{min}", &bracket.min_stars.to_string())
        .replace("{max}", &bracket.max_stars.to_string())
        .replace("{upper}", &format!("{:.2}", bracket.max_stars - 0.01))
}

fn config_error(message: impl Into<String>) -> anyhow::Error {
    LobbyError::ConfigurationError {
        message: message.into(),
    }
    .into()
}
