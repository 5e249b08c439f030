use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diagnostics::{Diagnostic, StageOutcome};
use crate::error::{CleanseError, Result};
use crate::errorbar_duster::{check_dust_threshold, dust_error_bars, DEFAULT_DUST_THRESHOLD};
use crate::exposure_grader::{cleanse_and_grade_exposures, DEFAULT_EXPOSURE_THRESHOLD};
use crate::flag_scrubber::{scrub_flagged_points, FlagLookup, DEFAULT_FLAG_THRESHOLD};
use crate::night_cleanser::{cleanse_nights, flag_nights, DEFAULT_NIGHT_THRESHOLD};
use crate::ratios::{check_ratio_threshold, ExposureRatios, NightRatios};
use crate::schema::PhotometryTable;
use crate::sentinel::{Band, SentinelPolicy};

/// One configured cleansing stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageSpec {
    Nights {
        #[serde(default = "default_night_threshold")]
        threshold: f64,
    },
    Exposures {
        #[serde(default = "default_exposure_threshold")]
        threshold: f64,
    },
    FlagNights {
        #[serde(default = "default_night_threshold")]
        threshold: f64,
    },
    FlagScrub {
        #[serde(default = "default_flag_threshold")]
        threshold: f64,
    },
    Dust {
        #[serde(default = "default_dust_threshold")]
        threshold: f64,
    },
}

fn default_night_threshold() -> f64 {
    DEFAULT_NIGHT_THRESHOLD
}

fn default_exposure_threshold() -> f64 {
    DEFAULT_EXPOSURE_THRESHOLD
}

fn default_flag_threshold() -> f64 {
    DEFAULT_FLAG_THRESHOLD
}

fn default_dust_threshold() -> f64 {
    DEFAULT_DUST_THRESHOLD
}

impl StageSpec {
    pub fn name(&self) -> &'static str {
        match self {
            StageSpec::Nights { .. } => "nights",
            StageSpec::Exposures { .. } => "exposures",
            StageSpec::FlagNights { .. } => "flag_nights",
            StageSpec::FlagScrub { .. } => "flag_scrub",
            StageSpec::Dust { .. } => "dust",
        }
    }

    pub fn threshold(&self) -> f64 {
        match *self {
            StageSpec::Nights { threshold }
            | StageSpec::Exposures { threshold }
            | StageSpec::FlagNights { threshold }
            | StageSpec::FlagScrub { threshold }
            | StageSpec::Dust { threshold } => threshold,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            StageSpec::Dust { threshold } => check_dust_threshold(*threshold),
            _ => check_ratio_threshold(self.name(), self.threshold()),
        }
    }
}

/// Externally computed inputs the stages draw on. Only the ones the configured stages
/// need have to be present.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineInputs<'a> {
    pub night_ratios: Option<&'a NightRatios>,
    pub exposure_ratios: Option<&'a ExposureRatios>,
    pub flag_lookup: Option<&'a FlagLookup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BandNullCount {
    pub band: Band,
    pub before: usize,
    pub after: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub stage: StageSpec,
    pub rows: usize,
    pub nulled: Vec<BandNullCount>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    #[serde(skip)]
    pub table: PhotometryTable,
    pub input_rows: usize,
    pub stages: Vec<StageSummary>,
}

impl PipelineRun {
    /// Pretty JSON report of every stage's null counts and diagnostics.
    pub fn report_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleansePipeline {
    policy: SentinelPolicy,
    stages: Vec<StageSpec>,
}

impl CleansePipeline {
    pub fn new(policy: SentinelPolicy, stages: Vec<StageSpec>) -> Result<Self> {
        policy.validate()?;
        for stage in &stages {
            stage.validate()?;
        }
        Ok(Self { policy, stages })
    }

    pub fn policy(&self) -> &SentinelPolicy {
        &self.policy
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Fails before any stage runs if a stage's input is absent.
    pub fn check_inputs(&self, inputs: &PipelineInputs<'_>) -> Result<()> {
        for stage in &self.stages {
            match stage {
                StageSpec::Nights { .. } | StageSpec::FlagNights { .. } => {
                    require(inputs.night_ratios, stage, NIGHT_RATIOS)?;
                }
                StageSpec::Exposures { .. } => {
                    require(inputs.exposure_ratios, stage, EXPOSURE_RATIOS)?;
                }
                StageSpec::FlagScrub { .. } => {
                    require(inputs.flag_lookup, stage, FLAG_LOOKUP)?;
                }
                StageSpec::Dust { .. } => {}
            }
        }
        Ok(())
    }

    /// Runs the stages in order, each on the previous stage's output.
    pub fn run(&self, table: &PhotometryTable, inputs: &PipelineInputs<'_>) -> Result<PipelineRun> {
        self.check_inputs(inputs)?;

        let mut current = table.clone();
        let mut summaries = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let before = self.null_counts(&current)?;
            let outcome = self.apply(stage, &current, inputs)?;
            outcome.table.ensure_rows_preserved(&current, stage.name())?;
            let after = self.null_counts(&outcome.table)?;

            let nulled = self
                .policy
                .bands
                .iter()
                .zip(before.into_iter().zip(after))
                .map(|(&band, (before, after))| BandNullCount {
                    band,
                    before,
                    after,
                })
                .collect();

            info!(
                stage = stage.name(),
                threshold = stage.threshold(),
                events = outcome.diagnostics.len(),
                "stage complete"
            );

            summaries.push(StageSummary {
                stage: *stage,
                rows: outcome.table.height(),
                nulled,
                diagnostics: outcome.diagnostics,
            });
            current = outcome.table;
        }

        Ok(PipelineRun {
            table: current,
            input_rows: table.height(),
            stages: summaries,
        })
    }

    fn apply(
        &self,
        stage: &StageSpec,
        table: &PhotometryTable,
        inputs: &PipelineInputs<'_>,
    ) -> Result<StageOutcome> {
        match *stage {
            StageSpec::Nights { threshold } => cleanse_nights(
                table,
                require(inputs.night_ratios, stage, NIGHT_RATIOS)?,
                threshold,
                &self.policy,
            ),
            StageSpec::FlagNights { threshold } => flag_nights(
                table,
                require(inputs.night_ratios, stage, NIGHT_RATIOS)?,
                threshold,
            ),
            StageSpec::Exposures { threshold } => cleanse_and_grade_exposures(
                table,
                require(inputs.exposure_ratios, stage, EXPOSURE_RATIOS)?,
                threshold,
                &self.policy,
            ),
            StageSpec::FlagScrub { threshold } => scrub_flagged_points(
                table,
                require(inputs.flag_lookup, stage, FLAG_LOOKUP)?,
                threshold,
                &self.policy,
            ),
            StageSpec::Dust { threshold } => dust_error_bars(table, threshold, &self.policy),
        }
    }

    fn null_counts(&self, table: &PhotometryTable) -> Result<Vec<usize>> {
        self.policy
            .bands
            .iter()
            .map(|&band| table.nulled_count(band, self.policy.null))
            .collect()
    }
}

const NIGHT_RATIOS: &str = "night quality ratios";
const EXPOSURE_RATIOS: &str = "exposure quality ratios";
const FLAG_LOOKUP: &str = "a flag lookup";

fn require<'a, T>(input: Option<&'a T>, stage: &StageSpec, what: &'static str) -> Result<&'a T> {
    input.ok_or(CleanseError::MissingInput {
        stage: stage.name(),
        input: what,
    })
}
