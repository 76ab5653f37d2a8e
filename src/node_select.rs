use crate::diagnostics::MapperDiagnostic;
use crate::error::{MapError, MapResult, SilentReason};
use crate::job::{Cluster, Job};

use tracing::*;

/// Candidate nodes for one application, in placement order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNodes {
    pub nodes: Vec<usize>,
    /// Free slots summed over `nodes`.
    pub num_slots: usize,
}

/// Select the nodes application `app_idx` of `job` may be placed on.
///
/// `initial_map` is true for the first application of a mapping call and
/// clears the `mapped` flag of every node.
#[tracing::instrument(skip_all)]
pub fn get_target_nodes(
    cluster: &mut Cluster,
    job: &Job,
    app_idx: usize,
    initial_map: bool,
) -> MapResult<TargetNodes> {
    let app = &job.apps[app_idx];

    if initial_map {
        for idx in 0..cluster.nodes().len() {
            cluster.node_mut(idx).flags.mapped = false;
        }
    }

    let mut candidates: Vec<usize> = match &app.hosts {
        Some(hosts) => {
            let mut selected = Vec::with_capacity(hosts.len());
            for host in hosts {
                let idx = cluster
                    .find(host)
                    .ok_or_else(|| MapError::UnknownHost(host.clone()))?;
                if cluster.node(idx).is_up() && !selected.contains(&idx) {
                    selected.push(idx);
                }
            }
            selected
        }
        None => (0..cluster.nodes().len())
            .filter(|idx| cluster.node(*idx).is_up())
            .collect(),
    };

    if let Some(idx) = candidates
        .iter()
        .find(|idx| cluster.node(**idx).topology.is_none())
    {
        let node = &cluster.node(*idx).name;
        MapperDiagnostic::TopoMissing { node }.print();
        return Err(MapError::Silent(SilentReason::TopologyMissing {
            node: node.clone(),
        }));
    }

    let with_room: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|idx| cluster.node(*idx).available_slots() > 0)
        .collect();
    if with_room.is_empty() && !candidates.is_empty() {
        if job.map.mapping.directives.no_oversubscribe {
            MapperDiagnostic::AllocError {
                num_procs: app.num_procs,
                app: &app.app,
            }
            .print();
            return Err(MapError::Silent(SilentReason::AllocationExceeded {
                num_procs: app.num_procs,
                app: app.app.clone(),
            }));
        }
        debug!("every candidate node is full, {} will oversubscribe", app.app);
    } else {
        candidates = with_room;
    }

    if let Some(bookmark) = job.bookmark {
        if let Some(pos) = candidates.iter().position(|idx| *idx == bookmark) {
            candidates.rotate_left(pos);
        }
    }

    if candidates.is_empty() {
        return Err(MapError::NoNodesAvailable {
            app: app.app.clone(),
        });
    }

    let num_slots = candidates
        .iter()
        .map(|idx| cluster.node(*idx).available_slots())
        .sum();
    trace!(
        "app {} candidates {:?} num_slots {}",
        app.app,
        candidates,
        num_slots
    );
    Ok(TargetNodes {
        nodes: candidates,
        num_slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::job::{MappingDirectives, Node, NodeState};
    use crate::topology::SyntheticTopology;
    use std::sync::Arc;

    fn cluster(slots: &[usize]) -> Cluster {
        let topo = Arc::new(SyntheticTopology::new("core:4").unwrap());
        let mut cluster = Cluster::new();
        for (i, s) in slots.iter().enumerate() {
            cluster.add_node(Node::new(format!("n{}", i), *s).with_topology(topo.clone()));
        }
        cluster
    }

    #[test]
    fn drops_full_and_down_nodes() {
        let mut cluster = cluster(&[4, 4, 4]);
        cluster.node_mut(0).slots_inuse = 4;
        cluster.node_mut(2).state = NodeState::Down;
        cluster.node_mut(1).flags.mapped = true;
        let job = Job::new(1).with_app("a.out", 2);
        let targets = get_target_nodes(&mut cluster, &job, 0, true).unwrap();
        assert_eq!(targets.nodes, vec![1]);
        assert_eq!(targets.num_slots, 4);
        assert!(!cluster.node(1).flags.mapped);
    }

    #[test]
    fn all_full() {
        let mut cluster = cluster(&[1, 1]);
        cluster.node_mut(0).slots_inuse = 1;
        cluster.node_mut(1).slots_inuse = 1;
        let job = Job::new(1).with_app("a.out", 2);
        let targets = get_target_nodes(&mut cluster, &job, 0, true).unwrap();
        assert_eq!(targets.nodes, vec![0, 1]);
        assert_eq!(targets.num_slots, 0);

        let job = job.with_directives(MappingDirectives {
            no_oversubscribe: true,
            ..Default::default()
        });
        let err = get_target_nodes(&mut cluster, &job, 0, true).unwrap_err();
        assert!(err.is_silent());
        assert_eq!(err.kind(), ErrorKind::Oversubscription);
    }

    #[test]
    fn missing_topology() {
        let mut cluster = cluster(&[2]);
        cluster.add_node(Node::new("bare", 2));
        let job = Job::new(1).with_app("a.out", 0);
        let err = get_target_nodes(&mut cluster, &job, 0, true).unwrap_err();
        assert_eq!(
            err,
            MapError::Silent(SilentReason::TopologyMissing {
                node: "bare".to_owned()
            })
        );
    }

    #[test]
    fn hosts_and_bookmark() {
        let mut cluster = cluster(&[2, 2, 2]);
        let mut job = Job::new(1).with_app("a.out", 0);
        job.apps[0] = job.apps[0].clone().with_hosts(["n2", "n0", "n1"]);
        job.bookmark = Some(0);
        let targets = get_target_nodes(&mut cluster, &job, 0, true).unwrap();
        assert_eq!(targets.nodes, vec![0, 1, 2]);

        job.apps[0] = job.apps[0].clone().with_hosts(["n9"]);
        assert_eq!(
            get_target_nodes(&mut cluster, &job, 0, true),
            Err(MapError::UnknownHost("n9".to_owned()))
        );
    }

    #[test]
    fn no_nodes() {
        let mut cluster = Cluster::new();
        let job = Job::new(1).with_app("a.out", 1);
        assert_eq!(
            get_target_nodes(&mut cluster, &job, 0, true).unwrap_err().kind(),
            ErrorKind::ResourceExhausted
        );
    }
}
