mod common;

use callq::db::queue;

// Concrete scenario 4 (spec.md §8): two dequeuers with rows; each purge is
// scoped to its own dequeuer and leaves the other's rows untouched.
#[tokio::test]
async fn purge_removes_only_the_named_dequeuers_rows() {
    let (pool, _db) = common::test_pool().await;
    common::insert_queue(&pool, "sip:q1@h", "active", "D1", 3).await;
    common::insert_queue(&pool, "sip:q2@h", "active", "D2", 1).await;

    queue::purge(&pool, "D1").await.unwrap();

    assert!(common::rows_for(&pool, "D1").await.is_empty());
    assert_eq!(common::rows_for(&pool, "D2").await.len(), 1);

    queue::purge(&pool, "D2").await.unwrap();
    assert!(common::rows_for(&pool, "D2").await.is_empty());
}

// Purge-on-close invariant: after purging, no row for that dequeuer remains,
// regardless of how many rows it owned across multiple queues.
#[tokio::test]
async fn purge_is_complete_even_with_many_rows() {
    let (pool, _db) = common::test_pool().await;
    for n in 0..5 {
        common::insert_queue(&pool, &format!("sip:q{n}@h"), "active", "D", n).await;
    }
    assert_eq!(common::rows_for(&pool, "D").await.len(), 5);

    queue::purge(&pool, "D").await.unwrap();
    assert!(common::rows_for(&pool, "D").await.is_empty());
}

// Purging an endpoint with no rows is a harmless no-op.
#[tokio::test]
async fn purge_of_unknown_dequeuer_is_a_no_op() {
    let (pool, _db) = common::test_pool().await;
    queue::purge(&pool, "sip:nobody@h").await.unwrap();
}
