use crate::properties::PhysicalProp;

/// How an operator's output can be replayed, ordered from weakest to strongest.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum RewindabilityKind {
    /// Output can only be consumed once.
    None,
    /// Output can be rescanned from the start by re-executing the subtree.
    Rescannable,
    /// Output can be rewound cheaply, e.g. it is materialized.
    Rewindable,
    /// Supports mark/restore positioning.
    MarkRestore,
}

#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq)]
pub enum MotionHazard {
    NoMotion,
    /// Subtree contains a motion, rewinding it could deadlock or replay side effects.
    Motion,
}

/// Which operator the requirement originates from.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq)]
pub enum RewindOrigin {
    Default,
    /// Required by the inner side of a nested loop join.
    NLJoin,
}

#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq)]
pub struct RewindabilitySpec {
    kind: RewindabilityKind,
    motion_hazard: MotionHazard,
    origin: RewindOrigin,
}

impl Default for RewindabilitySpec {
    fn default() -> Self {
        Self::new(RewindabilityKind::None, MotionHazard::NoMotion)
    }
}

impl RewindabilitySpec {
    pub fn new(kind: RewindabilityKind, motion_hazard: MotionHazard) -> Self {
        Self {
            kind,
            motion_hazard,
            origin: RewindOrigin::Default,
        }
    }

    pub fn with_origin(mut self, origin: RewindOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn kind(&self) -> RewindabilityKind {
        self.kind
    }

    pub fn motion_hazard(&self) -> MotionHazard {
        self.motion_hazard
    }

    pub fn has_motion_hazard(&self) -> bool {
        self.motion_hazard == MotionHazard::Motion
    }

    pub fn is_origin_nl_join(&self) -> bool {
        self.origin == RewindOrigin::NLJoin
    }
}

impl PhysicalProp for RewindabilitySpec {
    fn satisfies(&self, required: &Self) -> bool {
        self.kind >= required.kind && !(self.has_motion_hazard() && required.has_motion_hazard())
    }
}

#[cfg(test)]
mod tests {
    use crate::properties::{
        MotionHazard, PhysicalProp, RewindOrigin, RewindabilityKind, RewindabilitySpec,
    };

    #[test]
    fn test_kind_ordering() {
        let rewindable =
            RewindabilitySpec::new(RewindabilityKind::Rewindable, MotionHazard::NoMotion);
        let rescannable =
            RewindabilitySpec::new(RewindabilityKind::Rescannable, MotionHazard::NoMotion);

        assert!(rewindable.satisfies(&rescannable));
        assert!(!rescannable.satisfies(&rewindable));
        assert!(rescannable.satisfies(&RewindabilitySpec::default()));
    }

    #[test]
    fn test_motion_hazard_on_both_sides() {
        let hazard = RewindabilitySpec::new(RewindabilityKind::None, MotionHazard::Motion);

        assert!(hazard.satisfies(&RewindabilitySpec::default()));
        assert!(!hazard.satisfies(&hazard));
    }

    #[test]
    fn test_origin() {
        let spec = RewindabilitySpec::new(RewindabilityKind::Rescannable, MotionHazard::NoMotion);
        assert!(!spec.is_origin_nl_join());
        assert!(spec.with_origin(RewindOrigin::NLJoin).is_origin_nl_join());
    }
}
