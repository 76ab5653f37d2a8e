use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(true);

lazy_static! {
    static ref NODENAME: String = match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(_) => "unknown".to_owned(),
    };
}

/// User facing messages shown before a mapping error is returned.
///
/// Errors that follow one of these are returned as [`crate::MapError::Silent`]
/// so they are not reported twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapperDiagnostic<'a> {
    AllocError { num_procs: usize, app: &'a str },
    MappingTooLow { cpus_per_rank: usize, npus: usize },
    TopoMissing { node: &'a str },
    ExplicitTooManyProcs { num_procs: usize, app: &'a str },
    UnrecognizedOption { option: &'a str },
    LayoutMissing,
}

impl<'a> MapperDiagnostic<'a> {
    pub fn enable() {
        ENABLED.store(true, Ordering::Relaxed);
    }
    pub fn disable() {
        ENABLED.store(false, Ordering::Relaxed);
    }
    pub fn enabled() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    pub fn message(&self) -> String {
        match self {
            MapperDiagnostic::AllocError { num_procs, app } => format!(
                "There are not enough slots available in the system to satisfy the {num_procs}
                slots that were requested by the application:
                  {app}
                Either request fewer slots for your application, or make more slots available
                for use, or allow oversubscription of the nodes."
            ),
            MapperDiagnostic::MappingTooLow { cpus_per_rank, npus } => format!(
                "A request was made to bind to that would result in binding more
                processes than cpus on a resource:
                   #cpus-per-proc:  {cpus_per_rank}
                   number of cpus:  {npus}
                Please map the processes to a coarser object or reduce the cpus per rank."
            ),
            MapperDiagnostic::TopoMissing { node } => format!(
                "A topology for node {node} was not found, so processes cannot be
                mapped to its hardware objects by the explicit mapper."
            ),
            MapperDiagnostic::ExplicitTooManyProcs { num_procs, app } => format!(
                "The explicit layout could not place all {num_procs} processes requested by
                the application:
                  {app}
                Either request fewer processes or give a layout with more places."
            ),
            MapperDiagnostic::UnrecognizedOption { option } => format!(
                "The explicit mapper was given an unrecognized target:
                  {option}
                Valid targets are node, numa, package, l3cache, l2cache, l1cache, core and pu."
            ),
            MapperDiagnostic::LayoutMissing => "The explicit mapper was selected but no layout was given.
                Set RMAPS_EXPLICIT_LAYOUT, e.g. RMAPS_EXPLICIT_LAYOUT='MPI[core][0,1,2,3]'."
                .to_owned(),
        }
    }

    fn print_diagnostic(&self) -> bool {
        Self::enabled() && crate::env_var::config().show_help
    }

    pub fn print(self) {
        if self.print_diagnostic() {
            eprintln!("[RMAPS EXPLICIT][{}] {}", *NODENAME, self.message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn messages_carry_details() {
        let msg = MapperDiagnostic::AllocError {
            num_procs: 12,
            app: "a.out",
        }
        .message();
        assert!(msg.contains("12"));
        assert!(msg.contains("a.out"));
        let msg = MapperDiagnostic::MappingTooLow {
            cpus_per_rank: 4,
            npus: 1,
        }
        .message();
        assert!(msg.contains("#cpus-per-proc:  4"));
        assert!(MapperDiagnostic::TopoMissing { node: "n3" }
            .message()
            .contains("n3"));
    }

    #[test]
    #[serial]
    fn gated_by_show_help_and_switch() {
        let diag = MapperDiagnostic::LayoutMissing;
        assert_eq!(diag.print_diagnostic(), crate::env_var::config().show_help);
        MapperDiagnostic::disable();
        assert!(!diag.print_diagnostic());
        MapperDiagnostic::enable();
        assert_eq!(diag.print_diagnostic(), crate::env_var::config().show_help);
    }
}
