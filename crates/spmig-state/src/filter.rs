//! Query predicates over migration units.

use crate::types::{BucketId, FamilyId, MigrateGvgUnit, SpId};

/// The scans planners run against the unit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitFilter {
    /// Primary, family-level, non-conflicted units owned by `src_sp_id` that
    /// no other node has accepted yet. Input to source-side plan building.
    Plannable { family_id: FamilyId, src_sp_id: SpId },
    /// Units with two source claims, awaiting external resolution.
    ConflictedInFamily { family_id: FamilyId },
    /// Units this node accepted as a migration destination.
    Remoted,
    /// Units scoped to one bucket, regardless of flags.
    Bucket { bucket_id: BucketId },
}

impl UnitFilter {
    pub fn matches(&self, unit: &MigrateGvgUnit) -> bool {
        match *self {
            UnitFilter::Plannable {
                family_id,
                src_sp_id,
            } => {
                !unit.is_conflicted
                    && !unit.is_secondary
                    && !unit.is_remoted
                    && unit.redundancy_index == 0
                    && unit.bucket_id == 0
                    && unit.virtual_group_family_id == family_id
                    && unit.src_sp_id == src_sp_id
            }
            UnitFilter::ConflictedInFamily { family_id } => {
                unit.is_conflicted && unit.virtual_group_family_id == family_id
            }
            UnitFilter::Remoted => unit.is_remoted,
            UnitFilter::Bucket { bucket_id } => unit.bucket_id == bucket_id,
        }
    }

    /// The family this filter is restricted to, when the by-family index
    /// can serve it.
    pub fn family(&self) -> Option<FamilyId> {
        match *self {
            UnitFilter::Plannable { family_id, .. }
            | UnitFilter::ConflictedInFamily { family_id } => Some(family_id),
            UnitFilter::Remoted | UnitFilter::Bucket { .. } => None,
        }
    }
}
