//! Access to the hardware topology of a node.
//!
//! The placement code only talks to the [`Topology`] trait. Two implementations
//! are provided: [`SyntheticTopology`], built from a description such as
//! `"package:2 core:4 pu:2"`, and the host topology returned by
//! [`SyntheticTopology::from_host`].

use crate::error::{MapError, MapResult};
use crate::hw_level::{HwLevel, ObjType};

use itertools::Itertools;
use tracing::*;

/// The hardware object a process is bound to.
///
/// `cpuset` holds the OS indices of the processing units the object covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    pub obj_type: ObjType,
    pub cache_level: u8,
    pub logical_index: usize,
    pub cpuset: Vec<usize>,
}

impl Locale {
    pub fn level(&self) -> Option<HwLevel> {
        HwLevel::from_obj(self.obj_type, self.cache_level)
    }

    /// Render the cpuset as a compact list of ranges, e.g. `0-3,8,10-11`.
    pub fn cpuset_string(&self) -> String {
        self.cpuset
            .iter()
            .map(|&pu| (pu, pu))
            .coalesce(|a, b| {
                if a.1 + 1 == b.0 {
                    Ok((a.0, b.1))
                } else {
                    Err((a, b))
                }
            })
            .map(|(lo, hi)| {
                if lo == hi {
                    format!("{}", lo)
                } else {
                    format!("{}-{}", lo, hi)
                }
            })
            .join(",")
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level() {
            Some(level) => write!(f, "{}:{}", level, self.logical_index),
            None => write!(f, "{}:{}", self.obj_type, self.logical_index),
        }
    }
}

/// Read-only view of the hardware of a single node.
pub trait Topology: Send + Sync + std::fmt::Debug {
    /// The object covering the whole machine, if the topology could be loaded.
    fn root(&self) -> Option<Locale>;

    /// Look up the object of the given type with the given logical index.
    fn get_object(&self, obj_type: ObjType, cache_level: u8, index: usize) -> Option<Locale>;

    /// Number of objects of the given type.
    fn count_objects(&self, obj_type: ObjType, cache_level: u8) -> usize;

    /// Number of processing units below `obj`.
    fn npus(&self, obj: &Locale) -> usize {
        obj.cpuset.len()
    }
}

/// Log how many objects the topology holds at every hardware level.
pub fn log_levels(node: &str, topology: &dyn Topology) -> Vec<(HwLevel, usize)> {
    let levels: Vec<(HwLevel, usize)> = HwLevel::ALL
        .iter()
        .map(|level| {
            (
                *level,
                topology.count_objects(level.obj_type(), level.cache_level()),
            )
        })
        .filter(|(_, count)| *count > 0)
        .collect();
    for (level, count) in &levels {
        trace!("node {}: {} x {}", node, count, level);
    }
    levels
}

/// A symmetric topology described level by level.
///
/// Each entry of the description is `<level>:<arity>`, the arity being the
/// number of children per object of the level above. Levels must appear from
/// coarsest to finest and a trailing `pu:1` is implied when no PU level is
/// given.
#[derive(Debug, Clone)]
pub struct SyntheticTopology {
    description: String,
    levels: Vec<HwLevel>,
    counts: Vec<usize>,
    pu_ids: Vec<usize>,
}

impl SyntheticTopology {
    pub fn new(description: &str) -> MapResult<SyntheticTopology> {
        let bad = |reason: String| MapError::BadTopology {
            description: description.to_owned(),
            reason,
        };
        let mut levels = Vec::new();
        let mut counts = Vec::new();
        let mut total = 1usize;
        for entry in description.split_whitespace() {
            let (name, arity) = entry
                .split_once(':')
                .ok_or_else(|| bad(format!("expected <level>:<arity>, found {:?}", entry)))?;
            let level = HwLevel::from_name(name).map_err(|e| bad(e.to_string()))?;
            if level == HwLevel::Node {
                return Err(bad("the machine level is implicit".to_owned()));
            }
            if let Some(prev) = levels.last() {
                if *prev >= level {
                    return Err(bad(format!("{} cannot appear below {}", level, prev)));
                }
            }
            let arity: usize = arity
                .parse()
                .map_err(|_| bad(format!("invalid arity {:?}", arity)))?;
            if arity == 0 {
                return Err(bad(format!("{} has zero arity", level)));
            }
            total = total
                .checked_mul(arity)
                .ok_or_else(|| bad("too many objects".to_owned()))?;
            levels.push(level);
            counts.push(total);
        }
        if levels.last() != Some(&HwLevel::HwThread) {
            levels.push(HwLevel::HwThread);
            counts.push(total);
        }
        Ok(SyntheticTopology {
            description: description.to_owned(),
            levels,
            counts,
            pu_ids: (0..total).collect(),
        })
    }

    /// One core per CPU the OS lets this process run on.
    pub fn from_host() -> MapResult<SyntheticTopology> {
        let core_ids = core_affinity::get_core_ids().unwrap_or_default();
        if core_ids.is_empty() {
            return Err(MapError::NotFound);
        }
        let mut topology = SyntheticTopology::new(&format!("core:{}", core_ids.len()))?;
        topology.pu_ids = core_ids.iter().map(|core| core.id).collect();
        debug!("host topology: {}", topology.description);
        Ok(topology)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn num_pus(&self) -> usize {
        self.pu_ids.len()
    }

    fn locale(&self, obj_type: ObjType, cache_level: u8, index: usize, count: usize) -> Locale {
        let per_obj = self.pu_ids.len() / count;
        Locale {
            obj_type,
            cache_level,
            logical_index: index,
            cpuset: self.pu_ids[index * per_obj..(index + 1) * per_obj].to_vec(),
        }
    }
}

impl Topology for SyntheticTopology {
    fn root(&self) -> Option<Locale> {
        Some(self.locale(ObjType::Machine, 0, 0, 1))
    }

    fn get_object(&self, obj_type: ObjType, cache_level: u8, index: usize) -> Option<Locale> {
        let count = self.count_objects(obj_type, cache_level);
        if index >= count {
            return None;
        }
        Some(self.locale(obj_type, cache_level, index, count))
    }

    fn count_objects(&self, obj_type: ObjType, cache_level: u8) -> usize {
        if obj_type == ObjType::Machine {
            return 1;
        }
        HwLevel::from_obj(obj_type, cache_level)
            .and_then(|level| self.levels.iter().position(|l| *l == level))
            .map_or(0, |k| self.counts[k])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_counts() {
        let topo = SyntheticTopology::new("package:2 l3cache:1 core:4 pu:2").unwrap();
        assert_eq!(topo.count_objects(ObjType::Machine, 0), 1);
        assert_eq!(topo.count_objects(ObjType::Package, 0), 2);
        assert_eq!(topo.count_objects(ObjType::Cache, 3), 2);
        assert_eq!(topo.count_objects(ObjType::Cache, 2), 0);
        assert_eq!(topo.count_objects(ObjType::Core, 0), 8);
        assert_eq!(topo.count_objects(ObjType::Pu, 0), 16);
        assert_eq!(topo.num_pus(), 16);
    }

    #[test]
    fn implied_pu_level() {
        let topo = SyntheticTopology::new("core:4").unwrap();
        assert_eq!(topo.count_objects(ObjType::Pu, 0), 4);
        let core = topo.get_object(ObjType::Core, 0, 3).unwrap();
        assert_eq!(core.cpuset, vec![3]);
        assert_eq!(topo.npus(&core), 1);
    }

    #[test]
    fn object_cpusets() {
        let topo = SyntheticTopology::new("package:2 core:2 pu:2").unwrap();
        let pkg = topo.get_object(ObjType::Package, 0, 1).unwrap();
        assert_eq!(pkg.cpuset, vec![4, 5, 6, 7]);
        assert_eq!(pkg.level(), Some(HwLevel::Socket));
        let root = topo.root().unwrap();
        assert_eq!(topo.npus(&root), 8);
        assert!(topo.get_object(ObjType::Core, 0, 4).is_none());
        assert!(topo.get_object(ObjType::NumaNode, 0, 0).is_none());
    }

    #[test]
    fn bad_descriptions() {
        for desc in ["core:4 package:2", "core", "core:0", "board:2", "node:1 core:2", "core:x"] {
            let err = SyntheticTopology::new(desc).unwrap_err();
            assert!(
                matches!(err, MapError::BadTopology { .. }),
                "{}: {:?}",
                desc,
                err
            );
        }
    }

    #[test]
    fn cpuset_ranges() {
        let locale = Locale {
            obj_type: ObjType::Package,
            cache_level: 0,
            logical_index: 0,
            cpuset: vec![0, 1, 2, 3, 8, 10, 11],
        };
        assert_eq!(locale.cpuset_string(), "0-3,8,10-11");
        assert_eq!(locale.to_string(), "Package:0");
    }

    #[test]
    fn levels_walk() {
        let topo = SyntheticTopology::new("numa:2 core:2").unwrap();
        assert_eq!(
            log_levels("n0", &topo),
            vec![
                (HwLevel::Node, 1),
                (HwLevel::Numa, 2),
                (HwLevel::Core, 4),
                (HwLevel::HwThread, 4)
            ]
        );
    }
}
