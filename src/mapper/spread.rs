use super::Placement;
use crate::diagnostics::MapperDiagnostic;
use crate::error::{MapError, MapResult, SilentReason};
use crate::hw_level::ObjType;
use crate::job::{Cluster, Job};
use crate::layout::AutoLayout;
use crate::node_select::TargetNodes;
use crate::topology::Locale;

use tracing::*;

/// Spreads processes evenly over the hardware threads of every candidate node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadPlacement {
    layout: AutoLayout,
    cpus_per_rank: usize,
}

struct Share {
    node: usize,
    obj: Locale,
    nprocs: usize,
}

impl SpreadPlacement {
    pub fn new(layout: AutoLayout, cpus_per_rank: usize) -> SpreadPlacement {
        SpreadPlacement {
            layout,
            cpus_per_rank,
        }
    }

    pub fn cpus_per_rank(&self) -> usize {
        self.cpus_per_rank
    }

    /// Decide how many processes every object receives, without touching the job.
    fn plan(&self, cluster: &Cluster, nodes: &[usize], num_procs: usize) -> MapResult<Vec<Share>> {
        let nobjs: usize = nodes
            .iter()
            .filter_map(|idx| cluster.node(*idx).topology.as_ref())
            .map(|topo| topo.count_objects(ObjType::Pu, 0))
            .sum();
        if nobjs == 0 {
            return Err(MapError::NotFound);
        }
        let navg = (num_procs / nobjs).max(1);
        let mut extra_objs = num_procs.saturating_sub(navg * nobjs);
        trace!(
            "spreading {} procs over {} PUs: navg {} extra {}",
            num_procs,
            nobjs,
            navg,
            extra_objs
        );

        let mut shares = Vec::new();
        let mut remaining = num_procs;
        'nodes: for &node_idx in nodes {
            let topo = match &cluster.node(node_idx).topology {
                Some(topo) => topo,
                None => continue,
            };
            for index in 0..topo.count_objects(ObjType::Pu, 0) {
                if remaining == 0 {
                    break 'nodes;
                }
                let obj = topo
                    .get_object(ObjType::Pu, 0, index)
                    .ok_or(MapError::NotFound)?;
                let mut nprocs = navg;
                if extra_objs > 0 {
                    nprocs += 1;
                    extra_objs -= 1;
                }
                let nprocs = nprocs.min(remaining);
                let npus = topo.npus(&obj);
                if self.cpus_per_rank > npus {
                    MapperDiagnostic::MappingTooLow {
                        cpus_per_rank: self.cpus_per_rank,
                        npus,
                    }
                    .print();
                    return Err(MapError::Silent(SilentReason::MappingTooLow {
                        cpus_per_rank: self.cpus_per_rank,
                        npus,
                    }));
                }
                remaining -= nprocs;
                shares.push(Share {
                    node: node_idx,
                    obj,
                    nprocs,
                });
            }
        }
        Ok(shares)
    }
}

impl Placement for SpreadPlacement {
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
        if targets.num_slots < num_procs && job.map.mapping.directives.no_oversubscribe {
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

        let shares = self.plan(cluster, &targets.nodes, num_procs)?;
        job.apps[app_idx].num_procs = num_procs;

        let mut mapped = 0;
        for share in shares {
            let node = cluster.node_mut(share.node);
            job.add_node_to_map(share.node, node);
            for _ in 0..share.nprocs {
                let proc_idx = job.setup_proc(share.node, node, app_idx);
                job.procs[proc_idx].set_locale(share.obj.clone());
            }
            mapped += share.nprocs;
            job.bookmark = Some(share.node);
        }

        for &node_idx in &targets.nodes {
            let node = cluster.node_mut(node_idx);
            node.slots_inuse = node.num_procs.min(node.slots);
            if node.num_procs > node.slots {
                node.flags.oversubscribed = true;
                job.flags.oversubscribed = true;
            }
        }
        Ok(mapped)
    }

    fn assign(&self, _cluster: &Cluster, _job: &mut Job) -> MapResult<()> {
        Ok(())
    }
}
