use super::{assign, Placement};
use crate::diagnostics::MapperDiagnostic;
use crate::error::{MapError, MapResult, SilentReason};
use crate::job::{Cluster, Job};
use crate::layout::AutoLayout;
use crate::node_select::TargetNodes;
use crate::topology::Locale;

use tracing::*;

/// Fills every node up to its free slots, then spreads the remainder evenly.
///
/// Processes are bound to the node's root object while mapping. The second
/// phase narrows them down to objects of the layout scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRobinPlacement {
    layout: AutoLayout,
    cpus_per_rank: usize,
}

impl RoundRobinPlacement {
    pub fn new(layout: AutoLayout, cpus_per_rank: usize) -> RoundRobinPlacement {
        RoundRobinPlacement {
            layout,
            cpus_per_rank,
        }
    }
}

impl Placement for RoundRobinPlacement {
    fn place(
        &self,
        cluster: &mut Cluster,
        job: &mut Job,
        app_idx: usize,
        targets: &TargetNodes,
    ) -> MapResult<usize> {
        let app = &job.apps[app_idx];
        let num_procs = if app.num_procs > 0 {
            app.num_procs
        } else if self.layout.n_pes > 0 {
            self.layout.n_pes
        } else {
            targets.num_slots
        };
        if num_procs == 0 {
            return Err(MapError::NoNodesAvailable {
                app: app.app.clone(),
            });
        }
        job.apps[app_idx].num_procs = num_procs;

        // nodes whose topology could not give us a root object are skipped
        let nodes: Vec<(usize, Locale)> = targets
            .nodes
            .iter()
            .filter_map(|idx| {
                let root = cluster
                    .node(*idx)
                    .topology
                    .as_ref()
                    .and_then(|topo| topo.root());
                if root.is_none() {
                    debug!("node {} has no root object", cluster.node(*idx).name);
                }
                root.map(|root| (*idx, root))
            })
            .collect();
        if nodes.is_empty() {
            return Err(MapError::NoNodesAvailable {
                app: job.apps[app_idx].app.clone(),
            });
        }

        let mut mapped = 0;
        for (node_idx, root) in &nodes {
            if mapped == num_procs {
                break;
            }
            let node = cluster.node_mut(*node_idx);
            let free = node.available_slots();
            if free == 0 {
                continue;
            }
            job.add_node_to_map(*node_idx, node);
            let n = free.min(num_procs - mapped);
            for _ in 0..n {
                let proc_idx = job.setup_proc(*node_idx, node, app_idx);
                job.procs[proc_idx].set_locale(root.clone());
            }
            node.slots_inuse += n;
            mapped += n;
        }
        if mapped == num_procs {
            return Ok(mapped);
        }

        let remaining = num_procs - mapped;
        let extra = remaining / nodes.len();
        let nxtra_nodes = remaining % nodes.len();
        trace!(
            "oversubscribing {} procs, {} per node plus one on {} nodes",
            remaining,
            extra,
            nxtra_nodes
        );
        let directives = job.map.mapping.directives;
        for (k, (node_idx, root)) in nodes.iter().enumerate() {
            if mapped == num_procs {
                break;
            }
            let node = cluster.node_mut(*node_idx);
            let add_one = if k < nxtra_nodes { 1 } else { 0 };
            let n = (node.available_slots() + extra + add_one).min(num_procs - mapped);
            if n == 0 {
                continue;
            }
            job.add_node_to_map(*node_idx, node);
            for _ in 0..n {
                let proc_idx = job.setup_proc(*node_idx, node, app_idx);
                job.procs[proc_idx].set_locale(root.clone());
            }
            node.slots_inuse = node.num_procs.min(node.slots);
            mapped += n;

            if node.num_procs > node.slots {
                node.flags.oversubscribed = true;
                job.flags.oversubscribed = true;
                if directives.no_oversubscribe
                    || (node.slots_given && !directives.subscribe_given)
                {
                    let app = &job.apps[app_idx];
                    MapperDiagnostic::AllocError {
                        num_procs,
                        app: &app.app,
                    }
                    .print();
                    return Err(MapError::Silent(SilentReason::AllocationExceeded {
                        num_procs,
                        app: app.app.clone(),
                    }));
                }
            }
        }
        Ok(mapped)
    }

    fn assign(&self, cluster: &Cluster, job: &mut Job) -> MapResult<()> {
        assign::assign_by_object(
            cluster,
            job,
            self.layout.scope,
            self.layout.n_per_scope,
            self.cpus_per_rank,
        )
    }
}
