//! Guarded transitions of the per-draw submission.
//!
//! The rules live here as pure in-memory operations; the service layer in
//! [`crate::services::crucible`] wraps them with persistence and the
//! compensation steps that keep the collection store consistent.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::dao::models::{Crucible, CrucibleStatus, DrawScope, Ingot};

/// Rejected crucible mutations. These are expected user-facing conditions,
/// not faults: a guard rejection leaves the crucible untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrucibleError {
    /// The crucible has already been submitted or locked.
    #[error("crucible is {status:?} and can no longer be edited")]
    NotEditable {
        /// Status the crucible was in.
        status: CrucibleStatus,
    },
    /// The draw's cutoff instant has passed.
    #[error("cutoff {cutoff} has passed for this draw")]
    CutoffPassed {
        /// The cutoff that was missed.
        cutoff: DateTime<Utc>,
    },
    /// The crucible already holds the required number of combinations.
    #[error("crucible already holds the required {required} combinations")]
    Full {
        /// Required combination count for the game.
        required: u32,
    },
    /// Locking requires the crucible to be full.
    #[error("crucible holds {have} of {required} required combinations")]
    Incomplete {
        /// Combinations currently held.
        have: usize,
        /// Required combination count for the game.
        required: u32,
    },
    /// The targeted combination is not in the crucible (stale selection).
    #[error("combination {ingot_id} is not in the crucible")]
    IngotNotFound {
        /// Id of the missing combination.
        ingot_id: i64,
    },
    /// Locking requires an explicit confirmation step.
    #[error("lock requires explicit confirmation")]
    NotConfirmed,
}

impl Crucible {
    /// Fresh editable crucible for a scope, not yet persisted.
    pub fn new_draft(scope: &DrawScope, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id: scope.user_id.clone(),
            game: scope.game.clone(),
            draw_date: scope.draw_date,
            ingots: Vec::new(),
            status: CrucibleStatus::Draft,
            updated_at: now,
        }
    }

    /// Scope key this crucible belongs to.
    pub fn scope(&self) -> DrawScope {
        DrawScope::new(self.user_id.clone(), self.game.clone(), self.draw_date)
    }

    /// Draw date of this crucible.
    pub fn target_draw(&self) -> NaiveDate {
        self.draw_date
    }

    fn ensure_editable(&self, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> Result<(), CrucibleError> {
        if !self.status.is_editable() {
            return Err(CrucibleError::NotEditable {
                status: self.status,
            });
        }
        if now >= cutoff {
            return Err(CrucibleError::CutoffPassed { cutoff });
        }
        Ok(())
    }

    /// Append a combination, bounded by the game's required count.
    pub fn add_ingot(
        &mut self,
        ingot: Ingot,
        required: u32,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<(), CrucibleError> {
        self.ensure_editable(now, cutoff)?;
        if self.ingots.len() >= required as usize {
            return Err(CrucibleError::Full { required });
        }
        self.ingots.push(ingot);
        self.updated_at = now;
        Ok(())
    }

    /// Swap `incoming` into the list position held by `outgoing_id`,
    /// returning the displaced combination.
    pub fn swap_ingot(
        &mut self,
        incoming: Ingot,
        outgoing_id: i64,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<Ingot, CrucibleError> {
        self.ensure_editable(now, cutoff)?;
        let position = self
            .ingots
            .iter()
            .position(|i| i.id == outgoing_id)
            .ok_or(CrucibleError::IngotNotFound {
                ingot_id: outgoing_id,
            })?;
        let outgoing = std::mem::replace(&mut self.ingots[position], incoming);
        self.updated_at = now;
        Ok(outgoing)
    }

    /// Move to `Submitted` ahead of the remote lock call. The caller must
    /// have collected an explicit confirmation from the user.
    pub fn begin_lock(
        &mut self,
        required: u32,
        confirmed: bool,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<(), CrucibleError> {
        self.ensure_editable(now, cutoff)?;
        if !confirmed {
            return Err(CrucibleError::NotConfirmed);
        }
        if self.ingots.len() != required as usize {
            return Err(CrucibleError::Incomplete {
                have: self.ingots.len(),
                required,
            });
        }
        self.status = CrucibleStatus::Submitted;
        self.updated_at = now;
        Ok(())
    }

    /// Revert a failed lock back to an editable draft, list untouched.
    pub fn revert_lock(&mut self, now: DateTime<Utc>) {
        self.status = CrucibleStatus::Draft;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scope() -> DrawScope {
        DrawScope::new(
            "u1",
            "golden-7",
            NaiveDate::from_ymd_opt(2024, 6, 8).unwrap(),
        )
    }

    fn ingot(id: i64) -> Ingot {
        Ingot {
            id,
            user_id: "u1".into(),
            game: "golden-7".into(),
            draw_date: NaiveDate::from_ymd_opt(2024, 6, 8).unwrap(),
            numbers: vec![1, 2, 3, 4, 5, 6],
            collected_at: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 7, 12, 0, 0).unwrap()
    }

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 9, 1, 30, 0).unwrap()
    }

    #[test]
    fn fills_to_required_count_then_rejects() {
        let mut crucible = Crucible::new_draft(&scope(), now());
        for id in 1..=6 {
            crucible.add_ingot(ingot(id), 6, now(), cutoff()).unwrap();
        }
        assert_eq!(crucible.ingots.len(), 6);

        let err = crucible.add_ingot(ingot(7), 6, now(), cutoff()).unwrap_err();
        assert_eq!(err, CrucibleError::Full { required: 6 });
        assert_eq!(crucible.ingots.len(), 6);
    }

    #[test]
    fn rejects_mutation_past_cutoff() {
        let mut crucible = Crucible::new_draft(&scope(), now());
        let late = cutoff() + chrono::Duration::seconds(1);
        let err = crucible.add_ingot(ingot(1), 6, late, cutoff()).unwrap_err();
        assert_eq!(err, CrucibleError::CutoffPassed { cutoff: cutoff() });
        assert!(crucible.ingots.is_empty());
    }

    #[test]
    fn mutation_exactly_at_cutoff_is_rejected() {
        let mut crucible = Crucible::new_draft(&scope(), now());
        let err = crucible
            .add_ingot(ingot(1), 6, cutoff(), cutoff())
            .unwrap_err();
        assert_eq!(err, CrucibleError::CutoffPassed { cutoff: cutoff() });
    }

    #[test]
    fn swap_replaces_in_place_and_returns_displaced() {
        let mut crucible = Crucible::new_draft(&scope(), now());
        for id in 1..=3 {
            crucible.add_ingot(ingot(id), 6, now(), cutoff()).unwrap();
        }

        let displaced = crucible.swap_ingot(ingot(9), 2, now(), cutoff()).unwrap();
        assert_eq!(displaced.id, 2);
        assert_eq!(
            crucible.ingots.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![1, 9, 3],
            "incoming takes the displaced position"
        );
    }

    #[test]
    fn swap_of_missing_ingot_leaves_list_untouched() {
        let mut crucible = Crucible::new_draft(&scope(), now());
        crucible.add_ingot(ingot(1), 6, now(), cutoff()).unwrap();

        let err = crucible
            .swap_ingot(ingot(9), 42, now(), cutoff())
            .unwrap_err();
        assert_eq!(err, CrucibleError::IngotNotFound { ingot_id: 42 });
        assert_eq!(crucible.ingots.len(), 1);
        assert_eq!(crucible.ingots[0].id, 1);
    }

    #[test]
    fn lock_requires_confirmation_and_full_list() {
        let mut crucible = Crucible::new_draft(&scope(), now());
        for id in 1..=6 {
            crucible.add_ingot(ingot(id), 6, now(), cutoff()).unwrap();
        }

        let err = crucible.begin_lock(6, false, now(), cutoff()).unwrap_err();
        assert_eq!(err, CrucibleError::NotConfirmed);
        assert_eq!(crucible.status, CrucibleStatus::Draft);

        crucible.begin_lock(6, true, now(), cutoff()).unwrap();
        assert_eq!(crucible.status, CrucibleStatus::Submitted);
    }

    #[test]
    fn lock_of_incomplete_crucible_is_rejected() {
        let mut crucible = Crucible::new_draft(&scope(), now());
        crucible.add_ingot(ingot(1), 6, now(), cutoff()).unwrap();

        let err = crucible.begin_lock(6, true, now(), cutoff()).unwrap_err();
        assert_eq!(
            err,
            CrucibleError::Incomplete {
                have: 1,
                required: 6
            }
        );
        assert_eq!(crucible.status, CrucibleStatus::Draft);
    }

    #[test]
    fn submitted_crucible_rejects_every_mutation() {
        let mut crucible = Crucible::new_draft(&scope(), now());
        for id in 1..=6 {
            crucible.add_ingot(ingot(id), 6, now(), cutoff()).unwrap();
        }
        crucible.begin_lock(6, true, now(), cutoff()).unwrap();

        let not_editable = CrucibleError::NotEditable {
            status: CrucibleStatus::Submitted,
        };
        assert_eq!(
            crucible.add_ingot(ingot(9), 6, now(), cutoff()).unwrap_err(),
            not_editable
        );
        assert_eq!(
            crucible
                .swap_ingot(ingot(9), 1, now(), cutoff())
                .unwrap_err(),
            not_editable
        );
        assert_eq!(
            crucible.begin_lock(6, true, now(), cutoff()).unwrap_err(),
            not_editable
        );
    }

    #[test]
    fn revert_restores_editability_with_list_intact() {
        let mut crucible = Crucible::new_draft(&scope(), now());
        for id in 1..=6 {
            crucible.add_ingot(ingot(id), 6, now(), cutoff()).unwrap();
        }
        crucible.begin_lock(6, true, now(), cutoff()).unwrap();
        crucible.revert_lock(now());

        assert_eq!(crucible.status, CrucibleStatus::Draft);
        assert_eq!(crucible.ingots.len(), 6);
    }
}
