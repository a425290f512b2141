//! Builder catalogue of the checker's CI deployment.
//!
//! Responsibilities:
//! - Assemble one pipeline per platform (linux build, linux tests, windows)
//! - Bind pipelines to builders (name, agent, build directory)
//! - Append the benchmark steps declared in [`Settings`]
//!
//! Several builders may share one pipeline; builders refer to their
//! pipeline by [`PipelineId`] so the shared step list is generated once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::model::StepCommand;
use crate::config::Settings;
use crate::error::ConfigError;
use crate::pipeline::builder::{Pipeline, PipelineBuilder};
use crate::pipeline::common;

pub mod linux_build;
pub mod linux_small;
pub mod windows;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineId {
    LinuxBuild,
    LinuxSmall,
    Windows,
}

impl PipelineId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineId::LinuxBuild => "linux-build",
            PipelineId::LinuxSmall => "linux-small",
            PipelineId::Windows => "windows",
        }
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline bound to an agent.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Builder {
    pub name: String,
    /// Agent (slave) the builder runs on.
    pub agent: String,
    pub build_dir: String,
    pub pipeline: PipelineId,
}

impl Builder {
    fn new(name: &str, agent: &str, build_dir: &str, pipeline: PipelineId) -> Self {
        Self {
            name: name.to_string(),
            agent: agent.to_string(),
            build_dir: build_dir.to_string(),
            pipeline,
        }
    }
}

/// Generated builders together with the pipelines they run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Catalogue {
    pub builders: Vec<Builder>,
    pub pipelines: BTreeMap<PipelineId, Pipeline>,
}

impl Catalogue {
    pub fn pipeline(&self, id: PipelineId) -> Option<&Pipeline> {
        self.pipelines.get(&id)
    }

    pub fn builder(&self, name: &str) -> Option<&Builder> {
        self.builders.iter().find(|b| b.name == name)
    }

    /// Keeps only the named builders, in request order, and the pipelines
    /// they use.
    pub fn select<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Ok(self);
        }

        let mut builders = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let builder = self
                .builder(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownBuilder(name.to_string()))?;
            if !builders.iter().any(|b: &Builder| b.name == builder.name) {
                builders.push(builder);
            }
        }

        let used: BTreeSet<PipelineId> = builders.iter().map(|b| b.pipeline).collect();
        self.pipelines.retain(|id, _| used.contains(id));
        self.builders = builders;
        Ok(self)
    }
}

/// Generates every builder of the deployment.
pub fn generate(settings: &Settings) -> Result<Catalogue, ConfigError> {
    let mut pipelines = BTreeMap::new();
    let mut builders = Vec::new();

    let stages: [(PipelineId, Assemble); 3] = [
        (PipelineId::LinuxBuild, linux_build::assemble),
        (PipelineId::LinuxSmall, linux_small::assemble),
        (PipelineId::Windows, windows::assemble),
    ];

    for (id, assemble) in stages {
        let mut pb = PipelineBuilder::with_test_base_name(&settings.test_base_name);
        let bound = assemble(&mut pb, settings)?;
        add_benchmarks(&mut pb, settings, id);

        let pipeline = pb.finish();
        info!(pipeline = %id, steps = pipeline.len(), builders = bound.len(), "generated pipeline");
        pipelines.insert(id, pipeline);
        builders.extend(bound);
    }

    check_unique_names(&builders)?;
    Ok(Catalogue {
        builders,
        pipelines,
    })
}

type Assemble = fn(&mut PipelineBuilder, &Settings) -> Result<Vec<Builder>, ConfigError>;

fn add_benchmarks(pb: &mut PipelineBuilder, settings: &Settings, id: PipelineId) {
    for bench in settings.benchmarks_for(id) {
        pb.add_step(common::benchmark_step(
            bench.spec(),
            StepCommand::shell(bench.command.clone()),
        ));
    }
}

fn check_unique_names(builders: &[Builder]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for b in builders {
        if !seen.insert(b.name.as_str()) {
            return Err(ConfigError::DuplicateBuilder(b.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchmarkSettings;
    use crate::pipeline::step::Completion;

    #[test]
    fn stock_catalogue_has_five_builders_on_three_pipelines() {
        let catalogue = generate(&Settings::default()).unwrap();
        let names: Vec<&str> = catalogue.builders.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "buildbot-linux-build",
                "buildbot-linux-small",
                "buildbot-winxp",
                "buildbot-vista",
                "buildbot-win7",
            ]
        );
        assert_eq!(catalogue.pipelines.len(), 3);
        assert_eq!(catalogue.builder("buildbot-win7").unwrap().agent, "vm51-m3");
    }

    #[test]
    fn select_keeps_requested_builders_and_their_pipelines() {
        let catalogue = generate(&Settings::default())
            .unwrap()
            .select(&["buildbot-vista", "buildbot-winxp", "buildbot-vista"])
            .unwrap();
        assert_eq!(catalogue.builders.len(), 2);
        assert_eq!(catalogue.builders[0].name, "buildbot-vista");
        assert_eq!(catalogue.pipelines.keys().copied().collect::<Vec<_>>(), vec![PipelineId::Windows]);
    }

    #[test]
    fn select_rejects_unknown_builder() {
        let err = generate(&Settings::default())
            .unwrap()
            .select(&["buildbot-mac"])
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownBuilder("buildbot-mac".into()));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let b = Builder::new("x", "a", "d", PipelineId::Windows);
        assert_eq!(
            check_unique_names(&[b.clone(), b]),
            Err(ConfigError::DuplicateBuilder("x".into()))
        );
    }

    #[test]
    fn benchmarks_land_at_the_end_of_their_pipeline() {
        let settings = Settings {
            benchmarks: vec![BenchmarkSettings {
                pipeline: PipelineId::LinuxSmall,
                platform: "linux".into(),
                name: "bigtest".into(),
                command: "./bigtest.sh".into(),
                expectations: BTreeMap::new(),
            }],
            ..Settings::default()
        };
        let catalogue = generate(&settings).unwrap();

        let small = catalogue.pipeline(PipelineId::LinuxSmall).unwrap();
        let last = small.steps.last().unwrap();
        assert!(matches!(last.completion, Some(Completion::ProcessLog(_))));

        let build = catalogue.pipeline(PipelineId::LinuxBuild).unwrap();
        assert!(build.steps.iter().all(|s| !matches!(s.completion, Some(Completion::ProcessLog(_)))));
    }
}
