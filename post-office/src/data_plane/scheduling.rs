//! Scheduled redelivery of already-routed references.

use tracing::debug;

use crate::collaborators::StorageManager;
use crate::error::PostOfficeError;
use crate::message::{MessageReference, TransactionId};
use crate::observability::events;

const COMPONENT: &str = "scheduling";

/// Sets `scheduled_time` (epoch millis) on every reference and persists it
/// for references whose message and queue are both durable.
///
/// With a transaction the update joins it; without one each reference is
/// persisted on its own. The first persistence failure is returned and the
/// remaining references are left untouched.
pub(crate) async fn schedule_references(
    storage: &dyn StorageManager,
    transaction_id: Option<TransactionId>,
    scheduled_time: u64,
    references: &[MessageReference],
) -> Result<(), PostOfficeError> {
    for reference in references {
        reference.set_scheduled_delivery_time(scheduled_time);

        if !(reference.message().is_durable() && reference.queue().is_durable()) {
            continue;
        }

        match transaction_id {
            Some(transaction_id) => {
                storage
                    .update_scheduled_delivery_time_transactional(transaction_id, reference)
                    .await?
            }
            None => storage.update_scheduled_delivery_time(reference).await?,
        }
    }

    debug!(
        event = events::SCHEDULE_OK,
        component = COMPONENT,
        references = references.len(),
        scheduled_time,
        transactional = transaction_id.is_some(),
        "references scheduled"
    );
    Ok(())
}
