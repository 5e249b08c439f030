use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::errorbar_duster::DEFAULT_DUST_THRESHOLD;
use crate::exposure_grader::DEFAULT_EXPOSURE_THRESHOLD;
use crate::flag_scrubber::DEFAULT_FLAG_THRESHOLD;
use crate::pipeline::{CleansePipeline, StageSpec};
use crate::sentinel::{Band, SentinelPolicy, NULL_SENTINEL};

/// TOML description of a cleansing run: the shared sentinel policy and the stage sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanseConfig {
    #[serde(default = "default_null")]
    pub null: f64,
    #[serde(default = "default_bands")]
    pub bands: Vec<Band>,
    #[serde(default = "default_stages")]
    pub stages: Vec<StageSpec>,
}

fn default_null() -> f64 {
    NULL_SENTINEL
}

fn default_bands() -> Vec<Band> {
    Band::ALL.to_vec()
}

fn default_stages() -> Vec<StageSpec> {
    vec![
        StageSpec::Exposures {
            threshold: DEFAULT_EXPOSURE_THRESHOLD,
        },
        StageSpec::FlagScrub {
            threshold: DEFAULT_FLAG_THRESHOLD,
        },
        StageSpec::Dust {
            threshold: DEFAULT_DUST_THRESHOLD,
        },
    ]
}

impl Default for CleanseConfig {
    fn default() -> Self {
        Self {
            null: default_null(),
            bands: default_bands(),
            stages: default_stages(),
        }
    }
}

impl CleanseConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn policy(&self) -> SentinelPolicy {
        SentinelPolicy {
            null: self.null,
            bands: self.bands.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.policy().validate()?;
        for stage in &self.stages {
            stage.validate()?;
        }
        Ok(())
    }

    pub fn into_pipeline(self) -> Result<CleansePipeline> {
        let policy = self.policy();
        CleansePipeline::new(policy, self.stages)
    }
}
