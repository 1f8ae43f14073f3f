//! Grade Registry

use super::context::LedgerContext;
use super::error::{LedgerError, LedgerResult};
use super::storage::Sequence;
use shared::models::{Grade, GradeKey};

/// Look up the grade for a (shape, color, clarity) triple, creating it on first use
pub fn resolve_grade(ctx: &LedgerContext<'_>, key: &GradeKey) -> LedgerResult<Grade> {
    if let Some(grade) = ctx.storage.find_grade_txn(ctx.txn, key)? {
        return Ok(grade);
    }

    let grade = Grade {
        id: ctx.next_id(Sequence::Grade)?,
        shape_id: key.shape_id,
        color_id: key.color_id,
        clarity_id: key.clarity_id,
        created_at: ctx.now,
    };
    ctx.storage.insert_grade(ctx.txn, &grade)?;
    tracing::debug!(grade_id = grade.id, ?key, "Grade created");
    Ok(grade)
}

pub fn load_grade(ctx: &LedgerContext<'_>, grade_id: i64) -> LedgerResult<Grade> {
    ctx.storage
        .get_grade_txn(ctx.txn, grade_id)?
        .ok_or(LedgerError::GradeNotFound(grade_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::storage::LedgerStorage;
    use shared::Tolerance;

    #[test]
    fn test_resolve_is_idempotent_per_triple() {
        let storage = LedgerStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let ctx = LedgerContext::new(&storage, &txn, Tolerance::default(), 100);

        let a = resolve_grade(&ctx, &GradeKey::new(1, 2, 3)).unwrap();
        let b = resolve_grade(&ctx, &GradeKey::new(1, 2, 3)).unwrap();
        let c = resolve_grade(&ctx, &GradeKey::new(1, 2, 4)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a.id, c.id);
        assert_eq!(a.created_at, 100);
        assert_eq!(load_grade(&ctx, c.id).unwrap().key(), GradeKey::new(1, 2, 4));
        assert!(matches!(
            load_grade(&ctx, 999),
            Err(LedgerError::GradeNotFound(999))
        ));
    }
}
