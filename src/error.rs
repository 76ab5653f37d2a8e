use crate::hw_level::HwLevel;

/// Broad classification of a mapping failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The layout or another configuration input is unusable, nothing was mapped
    Configuration,
    /// A candidate node has no queryable topology
    TopologyUnavailable,
    /// A hardware object or a process record could not be obtained
    ResourceExhausted,
    /// The processes do not fit and oversubscription is not permitted
    Oversubscription,
    /// This mapper declines the job, the next one should be tried
    TakeNextOption,
    /// The topology does not contain any object of the requested type
    NotFound,
}

/// The reason behind a [`MapError::Silent`] error.
///
/// A silent error is returned after a user-facing diagnostic has already been
/// printed, callers should not log it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SilentReason {
    /// A candidate node lacks a topology
    TopologyMissing { node: String },
    /// More processes were requested than the allocation can hold
    AllocationExceeded { num_procs: usize, app: String },
    /// The explicit layout could not place every requested process
    ExplicitTooManyProcs { num_procs: usize, app: String },
    /// The bound hardware object has fewer PUs than `cpus_per_rank`
    MappingTooLow { cpus_per_rank: usize, npus: usize },
}

/// Errors produced while parsing a layout or mapping a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// The layout string does not follow `MPI[<target>][<places>]`
    BadLayout { layout: String, reason: String },
    /// The target of a layout does not name a hardware level
    UnknownLevel(String),
    /// A synthetic topology description could not be parsed
    BadTopology {
        description: String,
        reason: String,
    },
    /// A rank in the places list does not fit in the location table
    RankOutOfRange { rank: usize, capacity: usize },
    /// The ranks of the places list are not exactly `0..n_places`
    SparseRanks { missing: usize, n_places: usize },
    /// The same rank appears twice in the places list
    DuplicateRank { rank: usize, position: usize },
    /// No layout was configured
    MissingLayout,
    /// A `hosts` restriction names a node that is not in the allocation
    UnknownHost(String),
    /// No candidate node is left for the application
    NoNodesAvailable { app: String },
    /// A node does not hold the requested hardware object
    ObjectNotFound {
        node: String,
        level: HwLevel,
        index: usize,
    },
    /// The topology has no object at the mapping granularity
    NotFound,
    /// The job cannot be handled by this mapper
    TakeNextOption,
    /// A diagnostic was already shown, see [`SilentReason`]
    Silent(SilentReason),
}

pub type MapResult<T> = Result<T, MapError>;

impl MapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapError::BadLayout { .. }
            | MapError::UnknownLevel(_)
            | MapError::BadTopology { .. }
            | MapError::RankOutOfRange { .. }
            | MapError::SparseRanks { .. }
            | MapError::DuplicateRank { .. }
            | MapError::MissingLayout
            | MapError::UnknownHost(_) => ErrorKind::Configuration,
            MapError::NoNodesAvailable { .. } | MapError::ObjectNotFound { .. } => {
                ErrorKind::ResourceExhausted
            }
            MapError::NotFound => ErrorKind::NotFound,
            MapError::TakeNextOption => ErrorKind::TakeNextOption,
            MapError::Silent(reason) => match reason {
                SilentReason::TopologyMissing { .. } => ErrorKind::TopologyUnavailable,
                SilentReason::AllocationExceeded { .. }
                | SilentReason::ExplicitTooManyProcs { .. } => ErrorKind::Oversubscription,
                SilentReason::MappingTooLow { .. } => ErrorKind::Configuration,
            },
        }
    }

    /// True if a diagnostic describing this error was already printed.
    pub fn is_silent(&self) -> bool {
        matches!(self, MapError::Silent(_))
    }

    pub(crate) fn bad_layout(layout: &str, reason: impl Into<String>) -> MapError {
        MapError::BadLayout {
            layout: layout.to_owned(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MapError::BadLayout { layout, reason } => {
                write!(f, "malformed layout {:?}: {}", layout, reason)
            }
            MapError::UnknownLevel(name) => write!(f, "unrecognized hardware level {:?}", name),
            MapError::BadTopology {
                description,
                reason,
            } => write!(f, "malformed topology {:?}: {}", description, reason),
            MapError::RankOutOfRange { rank, capacity } => write!(
                f,
                "rank {} exceeds the location table capacity ({})",
                rank, capacity
            ),
            MapError::SparseRanks { missing, n_places } => write!(
                f,
                "rank {} has no place ({} places were given)",
                missing, n_places
            ),
            MapError::DuplicateRank { rank, position } => {
                write!(f, "rank {} is placed twice (again at position {})", rank, position)
            }
            MapError::MissingLayout => write!(f, "no layout given (set RMAPS_EXPLICIT_LAYOUT)"),
            MapError::UnknownHost(host) => write!(f, "host {:?} is not in the allocation", host),
            MapError::NoNodesAvailable { app } => {
                write!(f, "no nodes available to map app {:?}", app)
            }
            MapError::ObjectNotFound { node, level, index } => {
                write!(f, "node {} has no {} #{}", node, level, index)
            }
            MapError::NotFound => write!(f, "no hardware objects found"),
            MapError::TakeNextOption => write!(f, "mapper declined the job"),
            MapError::Silent(reason) => write!(f, "silent error: {:?}", reason),
        }
    }
}

impl std::error::Error for MapError {}
