use serde::Serialize;
use uuid::Uuid;

/// Delete outcome. Deleting an absent record is not an error; `deleted`
/// reports whether anything existed.
#[derive(Debug, Serialize)]
pub(crate) struct Deleted {
    pub(crate) user_id: Uuid,
    pub(crate) deleted: bool,
}
