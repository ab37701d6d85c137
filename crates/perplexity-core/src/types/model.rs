//! Perplexity model catalog

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Models the extension lets the user pick from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PerplexityModel {
    #[default]
    #[serde(rename = "sonar")]
    Sonar,
    #[serde(rename = "sonar-pro")]
    SonarPro,
    #[serde(rename = "sonar-reasoning")]
    SonarReasoning,
    #[serde(rename = "sonar-reasoning-pro")]
    SonarReasoningPro,
    #[serde(rename = "sonar-deep-research")]
    SonarDeepResearch,
}

impl PerplexityModel {
    const ALL: [PerplexityModel; 5] = [
        PerplexityModel::Sonar,
        PerplexityModel::SonarPro,
        PerplexityModel::SonarReasoning,
        PerplexityModel::SonarReasoningPro,
        PerplexityModel::SonarDeepResearch,
    ];

    /// Every selectable model, in menu order
    pub fn all() -> &'static [PerplexityModel] {
        &Self::ALL
    }

    /// API identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            PerplexityModel::Sonar => "sonar",
            PerplexityModel::SonarPro => "sonar-pro",
            PerplexityModel::SonarReasoning => "sonar-reasoning",
            PerplexityModel::SonarReasoningPro => "sonar-reasoning-pro",
            PerplexityModel::SonarDeepResearch => "sonar-deep-research",
        }
    }
}

impl std::fmt::Display for PerplexityModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for model identifiers outside the catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown Perplexity model: {0}")]
pub struct UnknownModel(pub String);

impl FromStr for PerplexityModel {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}
