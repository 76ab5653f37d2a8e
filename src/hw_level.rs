use crate::error::{MapError, MapResult};

/// The type of a hardware object as the topology reports it.
///
/// Caches of every level share [`ObjType::Cache`], they are told apart by the
/// cache level passed next to the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjType {
    Machine,
    NumaNode,
    Package,
    Cache,
    Core,
    Pu,
}

impl std::fmt::Display for ObjType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjType::Machine => "Machine",
            ObjType::NumaNode => "NUMANode",
            ObjType::Package => "Package",
            ObjType::Cache => "Cache",
            ObjType::Core => "Core",
            ObjType::Pu => "PU",
        };
        write!(f, "{}", name)
    }
}

/// Hardware levels a rank can be mapped to, from coarsest to finest.
///
/// The derived ordering follows the declaration order, so
/// `HwLevel::Node < HwLevel::HwThread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HwLevel {
    Node,
    Numa,
    Socket,
    L3Cache,
    L2Cache,
    L1Cache,
    Core,
    HwThread,
}

impl HwLevel {
    pub const ALL: [HwLevel; 8] = [
        HwLevel::Node,
        HwLevel::Numa,
        HwLevel::Socket,
        HwLevel::L3Cache,
        HwLevel::L2Cache,
        HwLevel::L1Cache,
        HwLevel::Core,
        HwLevel::HwThread,
    ];

    /// Parse a level name, case-insensitively.
    ///
    /// Accepts `node`, `pu`/`thread`/`hwthread`, `core`, `package`/`pkg`/`socket`,
    /// `l1cache`, `l2cache`, `l3cache` and `numa`.
    pub fn from_name(name: &str) -> MapResult<HwLevel> {
        let level = match name.trim().to_ascii_lowercase().as_str() {
            "node" => HwLevel::Node,
            "numa" => HwLevel::Numa,
            "package" | "pkg" | "socket" => HwLevel::Socket,
            "l3cache" => HwLevel::L3Cache,
            "l2cache" => HwLevel::L2Cache,
            "l1cache" => HwLevel::L1Cache,
            "core" => HwLevel::Core,
            "pu" | "thread" | "hwthread" => HwLevel::HwThread,
            _ => return Err(MapError::UnknownLevel(name.to_owned())),
        };
        Ok(level)
    }

    pub fn obj_type(&self) -> ObjType {
        match self {
            HwLevel::Node => ObjType::Machine,
            HwLevel::Numa => ObjType::NumaNode,
            HwLevel::Socket => ObjType::Package,
            HwLevel::L3Cache | HwLevel::L2Cache | HwLevel::L1Cache => ObjType::Cache,
            HwLevel::Core => ObjType::Core,
            HwLevel::HwThread => ObjType::Pu,
        }
    }

    /// Cache depth used to disambiguate cache objects, 0 for anything else.
    pub fn cache_level(&self) -> u8 {
        match self {
            HwLevel::L3Cache => 3,
            HwLevel::L2Cache => 2,
            HwLevel::L1Cache => 1,
            _ => 0,
        }
    }

    /// Inverse of (`obj_type`, `cache_level`).
    pub fn from_obj(obj_type: ObjType, cache_level: u8) -> Option<HwLevel> {
        match (obj_type, cache_level) {
            (ObjType::Machine, _) => Some(HwLevel::Node),
            (ObjType::NumaNode, _) => Some(HwLevel::Numa),
            (ObjType::Package, _) => Some(HwLevel::Socket),
            (ObjType::Cache, 3) => Some(HwLevel::L3Cache),
            (ObjType::Cache, 2) => Some(HwLevel::L2Cache),
            (ObjType::Cache, 1) => Some(HwLevel::L1Cache),
            (ObjType::Core, _) => Some(HwLevel::Core),
            (ObjType::Pu, _) => Some(HwLevel::HwThread),
            _ => None,
        }
    }

    /// The name of the mapping policy a job gets when mapped at this level.
    pub fn mapping_name(&self) -> &'static str {
        match self {
            HwLevel::Node => "BYNODE",
            HwLevel::Numa => "BYNUMA",
            HwLevel::Socket => "BYSOCKET",
            HwLevel::L3Cache => "BYL3CACHE",
            HwLevel::L2Cache => "BYL2CACHE",
            HwLevel::L1Cache => "BYL1CACHE",
            HwLevel::Core => "BYCORE",
            HwLevel::HwThread => "BYHWTHREAD",
        }
    }
}

impl std::fmt::Display for HwLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HwLevel::Node => "Machine",
            HwLevel::Numa => "NUMANode",
            HwLevel::Socket => "Package",
            HwLevel::L3Cache => "L3Cache",
            HwLevel::L2Cache => "L2Cache",
            HwLevel::L1Cache => "L1Cache",
            HwLevel::Core => "Core",
            HwLevel::HwThread => "PU",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for HwLevel {
    type Err = MapError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HwLevel::from_name(s)
    }
}
