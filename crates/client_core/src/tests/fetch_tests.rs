use std::time::Duration;

use super::*;
use anyhow::anyhow;

async fn after<T>(ms: u64, value: T) -> Result<T, anyhow::Error> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(value)
}

#[tokio::test]
async fn failed_slot_does_not_block_successful_ones() {
    let mut result = FetchBatch::new()
        .with("items", || async { Ok::<_, anyhow::Error>(vec![1, 2, 3]) })
        .with("reviews", || async { Err::<Vec<i32>, _>(anyhow!("connection refused")) })
        .run()
        .await;

    assert!(result.is_success("items"));
    assert!(!result.is_success("reviews"));

    let failures: Vec<_> = result.failures().cloned().collect();
    assert_eq!(
        failures,
        vec![FetchFailure {
            name: "reviews".to_string(),
            reason: "connection refused".to_string(),
        }]
    );

    assert_eq!(result.take_or_default("items"), vec![1, 2, 3]);
    assert_eq!(result.take_or_default("reviews"), Vec::<i32>::new());
}

#[tokio::test(start_paused = true)]
async fn total_wait_is_the_slowest_operation_not_the_sum() {
    let started = Instant::now();
    let result = FetchBatch::new()
        .with("fast", || after(100, 1))
        .with("medium", || after(200, 2))
        .with("slow", || after(300, 3))
        .run()
        .await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(350), "elapsed {elapsed:?}");
    assert_eq!(result.len(), 3);
    assert_eq!(result.failures().count(), 0);
}

#[tokio::test]
async fn slots_keep_registration_order_and_duplicates_replace() {
    let result = FetchBatch::new()
        .with("b", || after(0, "first b"))
        .with("a", || after(0, "a"))
        .with("b", || after(0, "second b"))
        .run()
        .await;

    assert_eq!(result.names().collect::<Vec<_>>(), vec!["b", "a"]);
    assert!(matches!(result.get("b"), Some(Ok(value)) if *value == "second b"));
}

#[tokio::test]
async fn panicking_operation_is_reported_as_failure() {
    let mut result = FetchBatch::new()
        .with("ok", || after(0, 5))
        .with("boom", || async {
            if true {
                panic!("decoder exploded");
            }
            Ok::<i32, anyhow::Error>(0)
        })
        .run()
        .await;

    let failure = result.take("boom").expect("slot").expect_err("failed");
    assert!(failure.reason.contains("decoder exploded"));
    assert_eq!(result.take_or("ok", 0), 5);
}

#[tokio::test]
async fn unknown_slot_uses_default() {
    let mut result = FetchBatch::<i32>::new().run().await;
    assert!(result.is_empty());
    assert!(result.get("missing").is_none());
    assert_eq!(result.take_or("missing", 42), 42);
    assert_eq!(result.take_with("missing", Some), None);
}
