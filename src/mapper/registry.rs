use super::RankMapper;
use crate::error::{MapError, MapResult};
use crate::job::{Cluster, Job};

use tracing::*;

/// The available mappers, highest priority first.
#[derive(Default)]
pub struct MapperRegistry {
    mappers: Vec<Box<dyn RankMapper>>,
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.mappers.iter().map(|m| (m.name(), m.priority())))
            .finish()
    }
}

impl MapperRegistry {
    pub fn new() -> MapperRegistry {
        MapperRegistry::default()
    }

    pub fn register(&mut self, mapper: Box<dyn RankMapper>) {
        let pos = self
            .mappers
            .iter()
            .position(|m| m.priority() < mapper.priority())
            .unwrap_or(self.mappers.len());
        self.mappers.insert(pos, mapper);
    }

    pub fn names(&self) -> Vec<&str> {
        self.mappers.iter().map(|m| m.name()).collect()
    }

    /// Offer `job` to each mapper in turn until one accepts it.
    ///
    /// Returns the name of the mapper that mapped the job.
    #[tracing::instrument(skip_all)]
    pub fn map_job(&self, cluster: &mut Cluster, job: &mut Job) -> MapResult<&str> {
        for mapper in &self.mappers {
            match mapper.map_job(cluster, job) {
                Ok(()) => return Ok(mapper.name()),
                Err(MapError::TakeNextOption) => {
                    debug!("mapper {} declined job {}", mapper.name(), job.jobid);
                }
                Err(e) => return Err(e),
            }
        }
        Err(MapError::TakeNextOption)
    }

    /// Run the second phase with the first mapper that recognizes the map.
    #[tracing::instrument(skip_all)]
    pub fn assign_locations(&self, cluster: &Cluster, job: &mut Job) -> MapResult<()> {
        for mapper in &self.mappers {
            match mapper.assign_locations(cluster, job) {
                Err(MapError::TakeNextOption) => continue,
                other => return other,
            }
        }
        Err(MapError::TakeNextOption)
    }
}
