//! Hands routed references to their queues.

use tracing::trace;

use crate::message::MessageReference;
use crate::observability::events;

const COMPONENT: &str = "delivery";

/// Appends each reference to the tail of its queue, in input order.
///
/// Routing decisions are final here: nothing is re-filtered.
pub(crate) fn deliver(references: Vec<MessageReference>) {
    for reference in references {
        trace!(
            event = events::DELIVER,
            component = COMPONENT,
            queue = reference.queue().name(),
            msg_id = reference.message().message_id(),
            "appending reference"
        );
        let queue = reference.queue().clone();
        queue.add_last(reference);
    }
}

#[cfg(test)]
mod tests {
    use super::deliver;
    use crate::message::{MessageReference, ServerMessage};
    use crate::test_support::TestQueue;
    use std::sync::Arc;

    #[test]
    fn preserves_caller_order_per_queue() {
        let queue = Arc::new(TestQueue::new("q1"));
        let references = (1..=3)
            .map(|id| {
                MessageReference::new(Arc::new(ServerMessage::new(id, "orders")), queue.clone())
            })
            .collect();

        deliver(references);

        let appended: Vec<u64> = queue
            .appended
            .lock()
            .unwrap()
            .iter()
            .map(|reference| reference.message().message_id())
            .collect();
        assert_eq!(appended, vec![1, 2, 3]);
    }
}
