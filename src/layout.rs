//! Parsing of the `MPI[<target>][<places>]` layout string.
//!
//! In a manual layout every token of `places` is either `-` or a rank `R`.
//! The token at position `P` binds rank `R` to object `P` of the target level,
//! i.e. `locations[R] = P`. So `MPI[core][0,-,2,1]` puts rank 0 on core 0,
//! rank 1 on core 3 and rank 2 on core 2.
//!
//! When the first token is `rr` or `spread` the layout is policy driven
//! instead: `MPI[<scope>][rr|spread(,<n_per_scope>(,<n_pes>))]`.

use crate::error::{MapError, MapResult};
use crate::hw_level::HwLevel;

/// Capacity of the rank to object table of a manual layout.
pub const MAX_LOCATIONS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutPolicy {
    RoundRobin,
    Spread,
}

impl LayoutPolicy {
    fn from_token(token: &str) -> Option<LayoutPolicy> {
        match token.to_ascii_lowercase().as_str() {
            "rr" => Some(LayoutPolicy::RoundRobin),
            "spread" => Some(LayoutPolicy::Spread),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualLayout {
    pub target: HwLevel,
    pub target_name: String,
    pub places: String,
    pub n_places: usize,
    /// `locations[rank]` is the logical index of the object `rank` is bound to.
    pub locations: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoLayout {
    pub scope: HwLevel,
    pub policy: LayoutPolicy,
    pub n_per_scope: usize,
    pub n_pes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutMode {
    Manual(ManualLayout),
    Auto(AutoLayout),
}

/// A parsed layout string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub raw: String,
    pub mode: LayoutMode,
}

impl Layout {
    pub fn parse(raw: &str) -> MapResult<Layout> {
        let trimmed = raw.trim();
        let rest = match trimmed.get(..3) {
            Some(keyword) if keyword.eq_ignore_ascii_case("mpi") => &trimmed[3..],
            _ => return Err(MapError::bad_layout(raw, "missing MPI keyword")),
        };
        let (target, rest) = bracketed(raw, rest, "target")?;
        let (places, rest) = bracketed(raw, rest, "places")?;
        if !rest.trim().is_empty() {
            return Err(MapError::bad_layout(
                raw,
                format!("unexpected trailing text {:?}", rest.trim()),
            ));
        }

        let level = HwLevel::from_name(target)?;
        let tokens: Vec<&str> = places.split(',').map(str::trim).collect();

        let mode = match LayoutPolicy::from_token(tokens[0]) {
            Some(policy) => LayoutMode::Auto(parse_auto(raw, level, policy, &tokens[1..])?),
            None => {
                let mut locations = vec![None; MAX_LOCATIONS];
                let n_places = parse_places(places, &mut locations)?;
                let locations = locations
                    .get(..n_places)
                    .ok_or(MapError::RankOutOfRange {
                        rank: n_places,
                        capacity: MAX_LOCATIONS,
                    })?
                    .iter()
                    .enumerate()
                    .map(|(rank, loc)| {
                        loc.ok_or(MapError::SparseRanks {
                            missing: rank,
                            n_places,
                        })
                    })
                    .collect::<MapResult<Vec<usize>>>()?;
                LayoutMode::Manual(ManualLayout {
                    target: level,
                    target_name: target.to_owned(),
                    places: places.to_owned(),
                    n_places,
                    locations,
                })
            }
        };
        Ok(Layout {
            raw: raw.to_owned(),
            mode,
        })
    }

    /// The target level of a manual layout, or the scope of an automatic one.
    pub fn level(&self) -> HwLevel {
        match &self.mode {
            LayoutMode::Manual(manual) => manual.target,
            LayoutMode::Auto(auto) => auto.scope,
        }
    }
}

impl std::str::FromStr for Layout {
    type Err = MapError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layout::parse(s)
    }
}

fn bracketed<'a>(raw: &str, s: &'a str, what: &str) -> MapResult<(&'a str, &'a str)> {
    let s = s.trim_start();
    let inner = s
        .strip_prefix('[')
        .ok_or_else(|| MapError::bad_layout(raw, format!("missing [{}] block", what)))?;
    let end = inner
        .find(']')
        .ok_or_else(|| MapError::bad_layout(raw, format!("unterminated [{}] block", what)))?;
    let body = inner[..end].trim();
    if body.is_empty() {
        return Err(MapError::bad_layout(raw, format!("empty [{}] block", what)));
    }
    Ok((body, &inner[end + 1..]))
}

fn parse_auto(
    raw: &str,
    scope: HwLevel,
    policy: LayoutPolicy,
    args: &[&str],
) -> MapResult<AutoLayout> {
    if args.len() > 2 {
        return Err(MapError::bad_layout(raw, "too many policy arguments"));
    }
    let arg = |i: usize, default: usize| -> MapResult<usize> {
        match args.get(i) {
            Some(tok) => tok
                .parse()
                .map_err(|_| MapError::bad_layout(raw, format!("invalid count {:?}", tok))),
            None => Ok(default),
        }
    };
    let n_per_scope = arg(0, 1)?;
    if n_per_scope == 0 {
        return Err(MapError::bad_layout(raw, "n_per_scope must be at least 1"));
    }
    Ok(AutoLayout {
        scope,
        policy,
        n_per_scope,
        n_pes: arg(1, 0)?,
    })
}

/// Fill `locations` from a comma separated places list.
///
/// Entries for `-` tokens are left untouched, so callers pre-fill the slice
/// with `None`. A rank whose entry is already set is rejected, so the returned
/// number of assigned ranks never exceeds `locations.len()`.
pub fn parse_places(places: &str, locations: &mut [Option<usize>]) -> MapResult<usize> {
    let mut n_assigned = 0;
    for (position, token) in places.split(',').map(str::trim).enumerate() {
        if token == "-" {
            continue;
        }
        let rank: usize = token
            .parse()
            .map_err(|_| MapError::bad_layout(places, format!("invalid rank {:?}", token)))?;
        if rank >= locations.len() {
            return Err(MapError::RankOutOfRange {
                rank,
                capacity: locations.len(),
            });
        }
        if locations[rank].is_some() {
            return Err(MapError::DuplicateRank { rank, position });
        }
        locations[rank] = Some(position);
        n_assigned += 1;
    }
    Ok(n_assigned)
}
