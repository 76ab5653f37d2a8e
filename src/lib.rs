//! rmaps-explicit places the processes of an MPI job on the hardware of a cluster according to a user supplied layout.
//!
//! A layout has the form `MPI[<target>][<places>]`. The target names a hardware level
//! (`node`, `numa`, `package`, `l3cache`, `l2cache`, `l1cache`, `core` or `pu`) and the places list
//! binds ranks to objects of that level on every node. Instead of a places list the layout can name a
//! policy, `rr` or `spread`, to fill nodes by slots or to spread processes evenly over hardware threads.
//!
//! Mapping runs in two phases. [`RankMapper::map_job`] selects candidate nodes for each application,
//! creates the processes and records the hardware object ("locale") every process is bound to.
//! [`RankMapper::assign_locations`] then refines the locales where the policy calls for it.
//! The recorded locale can be applied to a thread with [`bind_current_thread`].
//!
//! Node topologies are accessed through the [`Topology`] trait, [`SyntheticTopology`] describes
//! symmetric nodes such as `package:2 core:8 pu:2`.
//!
//! Configuration is read from `RMAPS_EXPLICIT_*` environment variables, see [`Config`].
//!
//! EXAMPLES
//! --------
//!
//! # Mapping a job with an explicit layout
//! ```
//! use rmaps_explicit::*;
//! use std::sync::Arc;
//!
//! let topo = Arc::new(SyntheticTopology::new("package:2 core:4").unwrap());
//! let mut cluster = Cluster::new();
//! cluster.add_node(Node::new("node0", 8).with_topology(topo.clone()));
//! cluster.add_node(Node::new("node1", 8).with_topology(topo));
//!
//! let mapper = ExplicitMapper::new("MPI[core][0,4,1,5]").unwrap();
//! let mut job = Job::new(1).with_app("./a.out", 0);
//! mapper.map_job(&mut cluster, &mut job).unwrap();
//! mapper.assign_locations(&cluster, &mut job).unwrap();
//! for proc in &job.procs {
//!     println!("{} on {} bound to {:?}", proc.name, cluster.node(proc.node).name, proc.locale);
//! }
//! ```
//!
//! # Offering a job to several mappers
//! ```
//! use rmaps_explicit::*;
//!
//! let mut registry = MapperRegistry::new();
//! registry.register(Box::new(ExplicitMapper::new("MPI[numa][rr,2]").unwrap().with_priority(10)));
//! ```

#[macro_use]
extern crate lazy_static;

pub extern crate tracing;

pub mod binding;
pub mod diagnostics;
pub mod env_var;
pub mod error;
pub mod hw_level;
pub mod job;
pub mod layout;
pub mod mapper;
pub mod node_select;
pub mod topology;

pub use crate::binding::bind_current_thread;
pub use crate::diagnostics::MapperDiagnostic;
pub use crate::env_var::{config, Config};
pub use crate::error::{ErrorKind, MapError, MapResult, SilentReason};
pub use crate::hw_level::{HwLevel, ObjType};
pub use crate::job::{
    AppContext, Cluster, Job, JobFlags, JobMap, Mapping, MappingDirectives, Node, NodeFlags,
    NodeState, Proc, ProcName,
};
pub use crate::layout::{AutoLayout, Layout, LayoutMode, LayoutPolicy, ManualLayout, MAX_LOCATIONS};
pub use crate::mapper::{
    ExplicitMapper, ExplicitPlacement, MapperRegistry, Placement, PlacementPolicy, RankMapper,
    RoundRobinPlacement, SpreadPlacement, MAPPER_NAME,
};
pub use crate::node_select::{get_target_nodes, TargetNodes};
pub use crate::topology::{Locale, SyntheticTopology, Topology};
