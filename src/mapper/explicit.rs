use super::Placement;
use crate::diagnostics::MapperDiagnostic;
use crate::error::{MapError, MapResult, SilentReason};
use crate::job::{Cluster, Job};
use crate::layout::ManualLayout;
use crate::node_select::TargetNodes;
use crate::topology::log_levels;

use tracing::*;

/// Binds rank `i` of every node to object `locations[i]` of the layout target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitPlacement {
    layout: ManualLayout,
}

impl ExplicitPlacement {
    pub fn new(layout: ManualLayout) -> ExplicitPlacement {
        ExplicitPlacement { layout }
    }
}

impl Placement for ExplicitPlacement {
    fn place(
        &self,
        cluster: &mut Cluster,
        job: &mut Job,
        app_idx: usize,
        targets: &TargetNodes,
    ) -> MapResult<usize> {
        let requested = job.apps[app_idx].num_procs;
        let total_procs = if requested == 0 { usize::MAX } else { requested };
        let level = self.layout.target;
        let debugger = job.map.mapping.directives.debugger;

        let mut mapped = 0;
        for &node_idx in &targets.nodes {
            if mapped == total_procs {
                break;
            }
            let node = cluster.node_mut(node_idx);
            let topology = match &node.topology {
                Some(topology) => topology.clone(),
                None => {
                    MapperDiagnostic::TopoMissing { node: &node.name }.print();
                    return Err(MapError::Silent(SilentReason::TopologyMissing {
                        node: node.name.clone(),
                    }));
                }
            };
            if job.add_node_to_map(node_idx, node) {
                log_levels(&node.name, &*topology);
            }

            let free = node.available_slots();
            let mut on_node = 0;
            for &location in self.layout.locations.iter() {
                if mapped == total_procs || on_node == free {
                    break;
                }
                let obj = topology
                    .get_object(level.obj_type(), level.cache_level(), location)
                    .ok_or_else(|| MapError::ObjectNotFound {
                        node: node.name.clone(),
                        level,
                        index: location,
                    })?;
                let proc_idx = job.setup_proc(node_idx, node, app_idx);
                trace!("{} -> {} {}", job.procs[proc_idx].name, node.name, obj);
                job.procs[proc_idx].set_locale(obj);
                mapped += 1;
                on_node += 1;
            }

            if !debugger {
                node.slots_inuse = node.num_procs.min(node.slots);
            }
        }

        let app = &mut job.apps[app_idx];
        if requested == 0 {
            app.num_procs = mapped;
        } else if mapped < requested {
            MapperDiagnostic::ExplicitTooManyProcs {
                num_procs: requested,
                app: &app.app,
            }
            .print();
            return Err(MapError::Silent(SilentReason::ExplicitTooManyProcs {
                num_procs: requested,
                app: app.app.clone(),
            }));
        }
        Ok(mapped)
    }

    fn assign(&self, _cluster: &Cluster, _job: &mut Job) -> MapResult<()> {
        // locales were resolved while mapping
        Ok(())
    }
}
