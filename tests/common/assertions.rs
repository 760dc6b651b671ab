//! Custom assertion macros
//!
//! Assertions on local record state that print the whole record on failure.

/// Assert a record's sync status, printing the record when it differs
#[macro_export]
macro_rules! assert_status {
    ($record:expr, $status:expr) => {
        let record = &$record;
        assert_eq!(
            record.sync_status, $status,
            "unexpected status for {}: {:?}",
            record.id, record
        );
    };
}

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}
