//! The explicit rank mapper and its placement policies.
//!
//! [`ExplicitMapper`] parses its layout once and maps every application of a
//! job with the [`PlacementPolicy`] the layout selects:
//! - a manual layout binds each rank to the object its place names ([`ExplicitPlacement`])
//! - `rr` fills nodes by free slots and oversubscribes evenly when needed ([`RoundRobinPlacement`])
//! - `spread` spreads ranks evenly over the hardware threads of all nodes ([`SpreadPlacement`])

mod assign;
pub(crate) mod explicit;
mod registry;
pub(crate) mod round_robin;
pub(crate) mod spread;

pub use explicit::ExplicitPlacement;
pub use registry::MapperRegistry;
pub use round_robin::RoundRobinPlacement;
pub use spread::SpreadPlacement;

use crate::diagnostics::MapperDiagnostic;
use crate::env_var::Config;
use crate::error::{MapError, MapResult};
use crate::job::{Cluster, Job};
use crate::layout::{Layout, LayoutMode, LayoutPolicy};
use crate::node_select::{get_target_nodes, TargetNodes};

use enum_dispatch::enum_dispatch;
use tracing::*;

pub const MAPPER_NAME: &str = "explicit";

/// A component that places the processes of a job onto nodes.
pub trait RankMapper: Send + Sync {
    fn name(&self) -> &str;

    /// Mappers are offered a job in decreasing priority order.
    fn priority(&self) -> i32;

    /// Create and place the processes of every application of `job`.
    ///
    /// Returns [`MapError::TakeNextOption`] when the job should be handled by
    /// another mapper. Any other error aborts the call, mutations already
    /// applied to `cluster` and `job` are not rolled back.
    fn map_job(&self, cluster: &mut Cluster, job: &mut Job) -> MapResult<()>;

    /// Second phase: refine the locale of every process of a mapped job.
    fn assign_locations(&self, cluster: &Cluster, job: &mut Job) -> MapResult<()>;
}

/// One way of turning candidate nodes into processes.
#[enum_dispatch]
pub trait Placement {
    /// Place the processes of application `app_idx`, returning how many were created.
    fn place(
        &self,
        cluster: &mut Cluster,
        job: &mut Job,
        app_idx: usize,
        targets: &TargetNodes,
    ) -> MapResult<usize>;

    fn assign(&self, cluster: &Cluster, job: &mut Job) -> MapResult<()>;
}

#[enum_dispatch(Placement)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementPolicy {
    Explicit(ExplicitPlacement),
    RoundRobin(RoundRobinPlacement),
    Spread(SpreadPlacement),
}

impl PlacementPolicy {
    pub fn from_layout(layout: &Layout, cpus_per_rank: usize) -> PlacementPolicy {
        match &layout.mode {
            LayoutMode::Manual(manual) => ExplicitPlacement::new(manual.clone()).into(),
            LayoutMode::Auto(auto) => match auto.policy {
                LayoutPolicy::RoundRobin => {
                    RoundRobinPlacement::new(auto.clone(), cpus_per_rank).into()
                }
                LayoutPolicy::Spread => SpreadPlacement::new(auto.clone(), cpus_per_rank).into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExplicitMapper {
    layout: Layout,
    policy: PlacementPolicy,
    priority: i32,
}

impl ExplicitMapper {
    pub fn new(layout: &str) -> MapResult<ExplicitMapper> {
        ExplicitMapper::from_config(&Config {
            layout: Some(layout.to_owned()),
            ..Default::default()
        })
    }

    pub fn from_config(config: &Config) -> MapResult<ExplicitMapper> {
        let raw = match &config.layout {
            Some(raw) => raw,
            None => {
                MapperDiagnostic::LayoutMissing.print();
                return Err(MapError::MissingLayout);
            }
        };
        let layout = match Layout::parse(raw) {
            Ok(layout) => layout,
            Err(MapError::UnknownLevel(option)) => {
                MapperDiagnostic::UnrecognizedOption { option: &option }.print();
                return Err(MapError::UnknownLevel(option));
            }
            Err(e) => return Err(e),
        };
        debug!("explicit mapper layout {:?}", layout);
        Ok(ExplicitMapper {
            policy: PlacementPolicy::from_layout(&layout, config.cpus_per_rank),
            layout,
            priority: config.priority,
        })
    }

    pub fn with_priority(mut self, priority: i32) -> ExplicitMapper {
        self.priority = priority;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn policy(&self) -> &PlacementPolicy {
        &self.policy
    }
}

impl RankMapper for ExplicitMapper {
    fn name(&self) -> &str {
        MAPPER_NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    #[tracing::instrument(skip_all)]
    fn map_job(&self, cluster: &mut Cluster, job: &mut Job) -> MapResult<()> {
        if job.flags.restart {
            debug!("job {} is restarting, declining", job.jobid);
            return Err(MapError::TakeNextOption);
        }
        job.map.last_mapper = Some(MAPPER_NAME.to_owned());
        job.map.mapping.policy = Some(self.layout.level());
        debug!(
            "mapping job {} {}",
            job.jobid,
            self.layout.level().mapping_name()
        );

        for app_idx in 0..job.apps.len() {
            let targets = get_target_nodes(cluster, job, app_idx, app_idx == 0)?;
            let mapped = self.policy.place(cluster, job, app_idx, &targets)?;
            trace!(
                "app {} placed {} procs on {} nodes",
                job.apps[app_idx].app,
                mapped,
                targets.nodes.len()
            );
            job.num_procs += job.apps[app_idx].num_procs;
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    fn assign_locations(&self, cluster: &Cluster, job: &mut Job) -> MapResult<()> {
        if job.map.last_mapper.as_deref() != Some(MAPPER_NAME) {
            return Err(MapError::TakeNextOption);
        }
        self.policy.assign(cluster, job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hw_level::HwLevel;

    #[test]
    fn policy_follows_layout() {
        let mapper = ExplicitMapper::new("MPI[core][1,0]").unwrap();
        assert!(matches!(mapper.policy(), PlacementPolicy::Explicit(_)));
        let mapper = ExplicitMapper::new("MPI[numa][rr,2]").unwrap();
        assert!(matches!(mapper.policy(), PlacementPolicy::RoundRobin(_)));
        let mapper = ExplicitMapper::new("MPI[pu][spread]").unwrap();
        assert!(matches!(mapper.policy(), PlacementPolicy::Spread(_)));
        assert_eq!(mapper.layout().level(), HwLevel::HwThread);
        assert_eq!(mapper.priority(), 1);
        assert_eq!(mapper.name(), "explicit");
    }

    #[test]
    fn construction_errors() {
        let err = ExplicitMapper::from_config(&Config::default()).unwrap_err();
        assert_eq!(err, MapError::MissingLayout);
        let err = ExplicitMapper::new("MPI[board][0]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn restarted_job_is_declined() {
        let mapper = ExplicitMapper::new("MPI[core][0]").unwrap();
        let mut cluster = Cluster::new();
        let mut job = Job::new(1).with_app("a.out", 1);
        job.flags.restart = true;
        assert_eq!(
            mapper.map_job(&mut cluster, &mut job),
            Err(MapError::TakeNextOption)
        );
        assert!(job.map.last_mapper.is_none());
    }

    #[test]
    fn foreign_map_is_declined() {
        let mapper = ExplicitMapper::new("MPI[core][0]").unwrap();
        let cluster = Cluster::new();
        let mut job = Job::new(1);
        job.map.last_mapper = Some("round_robin".to_owned());
        assert_eq!(
            mapper.assign_locations(&cluster, &mut job),
            Err(MapError::TakeNextOption)
        );
    }
}
