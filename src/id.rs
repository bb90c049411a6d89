use uuid::Uuid;

/// Store-assigned identifiers are UUIDv7 so that lexical order tracks
/// creation order at millisecond granularity.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_version_7() {
        let a = new_uuid_v7();
        let b = new_uuid_v7();
        assert_ne!(a, b);
        let parsed = Uuid::parse_str(&a).expect("valid uuid");
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn ids_order_by_creation_time() {
        let a = new_uuid_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_uuid_v7();
        assert!(a < b);
    }
}
