//! Property-based tests for the operation queue
//!
//! Whatever the interleaving of records, draining the queue pass by pass
//! hands each record's operations over in enqueue order, one at a time.

use fitsync::handlers::SyncOperation;
use fitsync::offline::OperationQueue;
use fitsync::shared::EntityKind;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

proptest! {
    #[test]
    fn test_drain_preserves_per_record_order(records in prop::collection::vec(0u8..4, 1..24)) {
        tokio_test::block_on(async {
            let queue = OperationQueue::new();
            let mut expected: HashMap<String, Vec<u64>> = HashMap::new();
            for record in &records {
                let id = format!("r{}", record);
                let op = queue.push(EntityKind::NutritionGoal, SyncOperation::update(id.clone())).await;
                expected.entry(id).or_default().push(op.sequence);
            }

            let mut seen: HashMap<String, Vec<u64>> = HashMap::new();
            let mut passes = 0;
            while !queue.is_empty().await {
                passes += 1;
                let due = queue.take_due(chrono::Utc::now()).await;
                let keys: HashSet<_> = due.iter().map(|op| op.operation.record_id().to_string()).collect();
                assert_eq!(keys.len(), due.len(), "two operations for one record in a pass");
                for op in due {
                    seen.entry(op.operation.record_id().to_string()).or_default().push(op.sequence);
                    queue.complete(op.id).await;
                }
            }

            let longest = expected.values().map(Vec::len).max().unwrap_or(0);
            assert_eq!(passes, longest);
            assert_eq!(seen, expected);
        });
    }
}
