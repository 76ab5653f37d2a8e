use crate::error::{MapError, MapResult};
use crate::topology::Locale;

use tracing::*;

/// Pin the calling thread to the first PU of `locale`.
///
/// Returns the OS index of the PU the thread was pinned to. The PU must be one
/// the process is allowed to run on.
pub fn bind_current_thread(locale: &Locale) -> MapResult<usize> {
    let pu = *locale.cpuset.first().ok_or(MapError::NotFound)?;
    let available = core_affinity::get_core_ids().unwrap_or_default();
    let core = available
        .into_iter()
        .find(|core| core.id == pu)
        .ok_or(MapError::NotFound)?;
    core_affinity::set_for_current(core);
    debug!("bound thread to PU {} ({})", pu, locale);
    Ok(pu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_level::ObjType;

    #[test]
    fn empty_cpuset() {
        let locale = Locale {
            obj_type: ObjType::Core,
            cache_level: 0,
            logical_index: 0,
            cpuset: vec![],
        };
        assert_eq!(bind_current_thread(&locale), Err(MapError::NotFound));
    }

    #[test]
    fn unknown_pu() {
        let locale = Locale {
            obj_type: ObjType::Pu,
            cache_level: 0,
            logical_index: 0,
            cpuset: vec![usize::MAX],
        };
        assert_eq!(bind_current_thread(&locale), Err(MapError::NotFound));
    }
}
