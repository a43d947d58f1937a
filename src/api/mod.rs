pub mod announcement;
pub mod assessment;
pub mod attendance;
pub mod batch;
pub mod fee;
pub mod timetable;
pub mod viewer;

use std::collections::HashSet;

use crate::error::AppResult;
use crate::store::ClassroomStore;

/// Ids of the students currently enrolled in `batch_id`.
pub(crate) async fn enrolled_ids(
    store: &dyn ClassroomStore,
    batch_id: u64,
) -> AppResult<HashSet<u64>> {
    Ok(store
        .batch_students(batch_id)
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect())
}
