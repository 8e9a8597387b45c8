// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::{ConfigFile, JobConfig, RawConfigFile};
use crate::errors::{CronlockError, Result};
use crate::job::WorkItem;
use crate::schedule::Schedule;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::CronlockError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.job))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    for (name, job) in cfg.job.iter() {
        validate_job(name, job)?;
    }
    check_dependency_graph(cfg.job.iter().map(|(name, job)| {
        let deps = job
            .depends_on
            .as_ref()
            .map(|d| d.split_commas())
            .unwrap_or_default();
        (name.clone(), deps)
    }))?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(CronlockError::ConfigError(
            "config must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

/// Check the parts of a job config that make it runnable at all: a parsable
/// schedule and exactly one work item.
pub fn validate_job(name: &str, cfg: &JobConfig) -> Result<(Schedule, WorkItem)> {
    let Some(expression) = cfg.schedule.as_deref() else {
        return Err(CronlockError::ConfigError(format!(
            "'schedule' is required for '{name}' job"
        )));
    };

    let Some(work) = WorkItem::from_config(cfg) else {
        return Err(CronlockError::ConfigError(format!(
            "Either 'command' or 'function' or 'class' is required for '{name}' job"
        )));
    };

    let schedule = Schedule::parse(expression)?;
    Ok((schedule, work))
}

/// Reject self-dependencies and cycles among `jobs` (name, depends_on).
///
/// Dependencies on jobs that are not in the set are allowed: another
/// scheduler sharing the lock directory may run them. They are only
/// reported.
pub fn check_dependency_graph<I>(jobs: I) -> Result<()>
where
    I: IntoIterator<Item = (String, Vec<String>)>,
{
    let jobs: Vec<(String, Vec<String>)> = jobs.into_iter().collect();

    // Edge direction: dep -> job.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (name, _) in &jobs {
        graph.add_node(name.as_str());
    }

    for (name, deps) in &jobs {
        for dep in deps {
            if dep == name {
                return Err(CronlockError::ConfigError(format!(
                    "job '{name}' cannot depend on itself in `depends_on`"
                )));
            }
            if !graph.contains_node(dep.as_str()) {
                warn!(job = %name, dependency = %dep, "depends on a job this scheduler does not know");
                continue;
            }
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(CronlockError::ConfigError(format!(
            "dependency cycle involving job '{}'",
            cycle.node_id()
        ))),
    }
}
