//! ID generation for executions, containers, and artifacts.

use rand::Rng;
use uuid::Uuid;

/// Fresh UUIDv4, used for executions, containers, and artifacts alike.
pub fn new_execution_id() -> Uuid {
    Uuid::new_v4()
}

pub fn new_container_id() -> Uuid {
    Uuid::new_v4()
}

pub fn new_artifact_id() -> Uuid {
    Uuid::new_v4()
}

const HEX: &[u8] = b"0123456789abcdef";

/// `autoqa-test-{8 hex chars}`, per spec.md §4.6. Pod names are
/// human-scannable in `kubectl get pods` output, so we don't just reuse the
/// container UUID.
pub fn new_pod_name() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect();
    format!("autoqa-test-{suffix}")
}

/// Sortable-timestamp artifact blob key per spec.md §3 invariant 8:
/// `artifacts/{testId}/{executionId}/{kind}/{sortable-timestamp}.{ext}`.
pub fn artifact_key(
    test_id: &str,
    execution_id: Uuid,
    kind: &str,
    timestamp_millis: i64,
    ext: &str,
) -> String {
    format!("artifacts/{test_id}/{execution_id}/{kind}/{timestamp_millis:020}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_names_have_expected_shape() {
        let name = new_pod_name();
        assert!(name.starts_with("autoqa-test-"));
        assert_eq!(name.len(), "autoqa-test-".len() + 8);
    }

    #[test]
    fn artifact_keys_sort_by_timestamp() {
        let id = Uuid::new_v4();
        let a = artifact_key("t1", id, "Screenshot", 1000, "png");
        let b = artifact_key("t1", id, "Screenshot", 2000, "png");
        assert!(a < b);
    }
}
