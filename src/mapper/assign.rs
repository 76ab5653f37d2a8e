use crate::diagnostics::MapperDiagnostic;
use crate::error::{MapError, MapResult, SilentReason};
use crate::hw_level::HwLevel;
use crate::job::{Cluster, Job};

use tracing::*;

/// Rebind the processes of every mapped node to objects of `scope`.
///
/// Consecutive processes on a node share an object, `n_per_scope` at a time,
/// cycling over the objects of the node. Spawned jobs start after the object
/// their parent ended on. Every receiving object must hold at least
/// `cpus_per_rank` processing units.
pub(crate) fn assign_by_object(
    cluster: &Cluster,
    job: &mut Job,
    scope: HwLevel,
    n_per_scope: usize,
    cpus_per_rank: usize,
) -> MapResult<()> {
    let n_per_scope = n_per_scope.max(1);
    let map_nodes: Vec<usize> = job.map.nodes.iter().copied().collect();
    for node_idx in map_nodes {
        let node = cluster.node(node_idx);
        let topology = node.topology.as_ref().ok_or(MapError::NotFound)?;
        let nobjs = topology.count_objects(scope.obj_type(), scope.cache_level());
        if nobjs == 0 {
            warn!("node {} has no {} objects", node.name, scope);
            return Err(MapError::NotFound);
        }
        let start = if job.is_spawned() {
            (job.bkmark_obj + 1) % nobjs
        } else {
            0
        };
        let procs: Vec<usize> = (0..job.procs.len())
            .filter(|i| job.procs[*i].node == node_idx)
            .collect();
        for (j, proc_idx) in procs.into_iter().enumerate() {
            let index = (j / n_per_scope + start) % nobjs;
            let obj = topology
                .get_object(scope.obj_type(), scope.cache_level(), index)
                .ok_or_else(|| MapError::ObjectNotFound {
                    node: node.name.clone(),
                    level: scope,
                    index,
                })?;
            let npus = topology.npus(&obj);
            if npus < cpus_per_rank {
                MapperDiagnostic::MappingTooLow {
                    cpus_per_rank,
                    npus,
                }
                .print();
                return Err(MapError::Silent(SilentReason::MappingTooLow {
                    cpus_per_rank,
                    npus,
                }));
            }
            trace!("{} -> {} {}", job.procs[proc_idx].name, node.name, obj);
            job.procs[proc_idx].set_locale(obj);
            job.bkmark_obj = index;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Node, ProcName};
    use crate::topology::SyntheticTopology;
    use std::sync::Arc;

    fn setup(nprocs: usize) -> (Cluster, Job) {
        let mut cluster = Cluster::new();
        let idx = cluster.add_node(
            Node::new("n0", 8).with_topology(Arc::new(SyntheticTopology::new("package:2 core:2").unwrap())),
        );
        let mut job = Job::new(1).with_app("a.out", nprocs);
        job.add_node_to_map(idx, cluster.node_mut(idx));
        for _ in 0..nprocs {
            job.setup_proc(idx, cluster.node_mut(idx), 0);
        }
        (cluster, job)
    }

    fn indices(job: &Job) -> Vec<usize> {
        job.procs
            .iter()
            .map(|p| p.locale.as_ref().unwrap().logical_index)
            .collect()
    }

    #[test]
    fn packs_n_per_object() {
        let (cluster, mut job) = setup(5);
        assign_by_object(&cluster, &mut job, HwLevel::Socket, 2, 1).unwrap();
        assert_eq!(indices(&job), vec![0, 0, 1, 1, 0]);
        assert_eq!(job.bkmark_obj, 0);
    }

    #[test]
    fn spawned_jobs_start_after_bookmark() {
        let (cluster, mut job) = setup(3);
        job.originator = Some(ProcName { jobid: 0, vpid: 0 });
        job.bkmark_obj = 1;
        assign_by_object(&cluster, &mut job, HwLevel::Core, 1, 1).unwrap();
        assert_eq!(indices(&job), vec![2, 3, 0]);
    }

    #[test]
    fn missing_scope() {
        let (cluster, mut job) = setup(1);
        assert_eq!(
            assign_by_object(&cluster, &mut job, HwLevel::Numa, 1, 1),
            Err(MapError::NotFound)
        );
    }

    #[test]
    fn objects_narrower_than_a_rank() {
        let (cluster, mut job) = setup(2);
        // each package has two cores
        assign_by_object(&cluster, &mut job, HwLevel::Socket, 1, 2).unwrap();
        assert_eq!(indices(&job), vec![0, 1]);

        let (cluster, mut job) = setup(2);
        assert_eq!(
            assign_by_object(&cluster, &mut job, HwLevel::Core, 1, 2),
            Err(MapError::Silent(SilentReason::MappingTooLow {
                cpus_per_rank: 2,
                npus: 1
            }))
        );
        assert!(job.procs.iter().all(|p| p.locale.is_none()));
    }
}
