//! The job, application, node and process records the mapper reads and mutates.

use crate::hw_level::HwLevel;
use crate::topology::{Locale, Topology};

use indexmap::IndexSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFlags {
    pub mapped: bool,
    pub oversubscribed: bool,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub slots: usize,
    pub slots_inuse: usize,
    /// The slot count was given by the user and is authoritative.
    pub slots_given: bool,
    pub num_procs: usize,
    pub procs: Vec<ProcName>,
    pub state: NodeState,
    pub flags: NodeFlags,
    pub topology: Option<Arc<dyn Topology>>,
}

impl Node {
    pub fn new(name: impl Into<String>, slots: usize) -> Node {
        Node {
            name: name.into(),
            slots,
            slots_inuse: 0,
            slots_given: false,
            num_procs: 0,
            procs: Vec::new(),
            state: NodeState::Up,
            flags: NodeFlags::default(),
            topology: None,
        }
    }

    pub fn with_topology(mut self, topology: Arc<dyn Topology>) -> Node {
        self.topology = Some(topology);
        self
    }

    pub fn with_slots_given(mut self) -> Node {
        self.slots_given = true;
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Node {
        self.state = state;
        self
    }

    pub fn available_slots(&self) -> usize {
        self.slots.saturating_sub(self.slots_inuse)
    }

    pub fn is_up(&self) -> bool {
        self.state == NodeState::Up
    }
}

/// The pool of nodes allocated to the launcher.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    nodes: Vec<Node>,
}

impl Cluster {
    pub fn new() -> Cluster {
        Cluster::default()
    }

    pub fn add_node(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn node_mut(&mut self, idx: usize) -> &mut Node {
        &mut self.nodes[idx]
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    pub idx: usize,
    pub app: String,
    /// Zero means "as many as the layout provides".
    pub num_procs: usize,
    /// Restrict the app to these node names.
    pub hosts: Option<Vec<String>>,
}

impl AppContext {
    pub fn new(idx: usize, app: impl Into<String>, num_procs: usize) -> AppContext {
        AppContext {
            idx,
            app: app.into(),
            num_procs,
            hosts: None,
        }
    }

    pub fn with_hosts<S: Into<String>>(mut self, hosts: impl IntoIterator<Item = S>) -> AppContext {
        self.hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcName {
    pub jobid: u32,
    pub vpid: usize,
}

impl std::fmt::Display for ProcName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.jobid, self.vpid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proc {
    pub name: ProcName,
    pub app_idx: usize,
    pub node: usize,
    pub locale: Option<Locale>,
}

impl Proc {
    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = Some(locale);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingDirectives {
    pub no_oversubscribe: bool,
    /// The user explicitly allowed or forbade oversubscription.
    pub subscribe_given: bool,
    /// Processes are debugger daemons and do not consume slots.
    pub debugger: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    pub policy: Option<HwLevel>,
    pub directives: MappingDirectives,
}

#[derive(Debug, Clone, Default)]
pub struct JobMap {
    pub mapping: Mapping,
    /// Node indices in the order they were first used. A node appears once.
    pub nodes: IndexSet<usize>,
    pub last_mapper: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobFlags {
    pub restart: bool,
    pub oversubscribed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Job {
    pub jobid: u32,
    pub apps: Vec<AppContext>,
    pub map: JobMap,
    pub procs: Vec<Proc>,
    pub num_procs: usize,
    pub flags: JobFlags,
    /// Node the previous mapping of this job ended on.
    pub bookmark: Option<usize>,
    /// Set for jobs spawned by another job.
    pub originator: Option<ProcName>,
    /// Logical index of the last object used by the previous mapping.
    pub bkmark_obj: usize,
}

impl Job {
    pub fn new(jobid: u32) -> Job {
        Job {
            jobid,
            ..Default::default()
        }
    }

    pub fn with_app(mut self, app: impl Into<String>, num_procs: usize) -> Job {
        let idx = self.apps.len();
        self.apps.push(AppContext::new(idx, app, num_procs));
        self
    }

    pub fn with_directives(mut self, directives: MappingDirectives) -> Job {
        self.map.mapping.directives = directives;
        self
    }

    pub fn is_spawned(&self) -> bool {
        self.originator.is_some()
    }

    /// Add `node_idx` to the job map unless it is already there.
    pub fn add_node_to_map(&mut self, node_idx: usize, node: &mut Node) -> bool {
        node.flags.mapped = true;
        self.map.nodes.insert(node_idx)
    }

    /// Create the next process of the job on `node`, returning its index in `procs`.
    pub fn setup_proc(&mut self, node_idx: usize, node: &mut Node, app_idx: usize) -> usize {
        let name = ProcName {
            jobid: self.jobid,
            vpid: self.procs.len(),
        };
        self.procs.push(Proc {
            name,
            app_idx,
            node: node_idx,
            locale: None,
        });
        node.procs.push(name);
        node.num_procs += 1;
        self.procs.len() - 1
    }

    pub fn procs_on(&self, node_idx: usize) -> impl Iterator<Item = &Proc> {
        self.procs.iter().filter(move |p| p.node == node_idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_added_once() {
        let mut node = Node::new("n0", 2);
        let mut job = Job::new(1);
        assert!(job.add_node_to_map(0, &mut node));
        assert!(!job.add_node_to_map(0, &mut node));
        assert!(node.flags.mapped);
        assert_eq!(job.map.nodes.len(), 1);
    }

    #[test]
    fn procs_get_sequential_vpids() {
        let mut cluster = Cluster::new();
        let a = cluster.add_node(Node::new("a", 2));
        let b = cluster.add_node(Node::new("b", 2));
        let mut job = Job::new(7).with_app("a.out", 3);
        job.setup_proc(a, cluster.node_mut(a), 0);
        job.setup_proc(b, cluster.node_mut(b), 0);
        let idx = job.setup_proc(a, cluster.node_mut(a), 0);
        assert_eq!(job.procs[idx].name, ProcName { jobid: 7, vpid: 2 });
        assert_eq!(job.procs[idx].name.to_string(), "[7,2]");
        assert_eq!(cluster.node(a).num_procs, 2);
        assert_eq!(job.procs_on(b).count(), 1);
    }

    #[test]
    fn free_slots() {
        let mut node = Node::new("n0", 4);
        node.slots_inuse = 6;
        assert_eq!(node.available_slots(), 0);
        node.slots_inuse = 1;
        assert_eq!(node.available_slots(), 3);
    }
}
