//! Unit tests for the identifiers module

use core_kernel::{AccountId, TransactionId};
use uuid::Uuid;

mod account_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = AccountId::new();
        let id2 = AccountId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = AccountId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = AccountId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = AccountId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(AccountId::prefix(), "ACC");
    }

    #[test]
    fn test_from_str_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed: AccountId = uuid.to_string().parse().unwrap();
        assert_eq!(*parsed.as_uuid(), uuid);
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!("ACC-not-a-uuid".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_serializes_transparently() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&AccountId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }
}

mod transaction_id_tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TransactionId::new(42).to_string(), "TXN#42");
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&TransactionId::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}
