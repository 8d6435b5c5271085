use crate::time::TimeInternal;

/// The current data set: the slave's view of its relationship to the
/// grandmaster, recomputed on every servo update (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CurrentDS {
    pub steps_removed: u16,
    pub offset_from_master: TimeInternal,
    pub mean_path_delay: TimeInternal,
}

impl CurrentDS {
    /// Reset by M1 (local clock becomes master/grandmaster).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
