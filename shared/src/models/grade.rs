//! Grade Model

use serde::{Deserialize, Serialize};

/// (shape, color, clarity) triple identifying a grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GradeKey {
    pub shape_id: i64,
    pub color_id: i64,
    pub clarity_id: i64,
}

impl GradeKey {
    pub fn new(shape_id: i64, color_id: i64, clarity_id: i64) -> Self {
        Self {
            shape_id,
            color_id,
            clarity_id,
        }
    }
}

/// Grade entity (immutable once created)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub id: i64,
    pub shape_id: i64,
    pub color_id: i64,
    pub clarity_id: i64,
    pub created_at: i64,
}

impl Grade {
    pub fn key(&self) -> GradeKey {
        GradeKey::new(self.shape_id, self.color_id, self.clarity_id)
    }
}
