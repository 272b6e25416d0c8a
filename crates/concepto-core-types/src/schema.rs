//! Canonical field keys and event names for structured logging
//!
//! The logging macros write these names and the test capture layer reads
//! them back, so both sides agree on one spelling.

// Fields every operation event carries
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_RUN_ID: &str = "run_id";

// Entity identifiers
pub const FIELD_NODE_ID: &str = "node_id";
pub const FIELD_COMMAND_ID: &str = "command_id";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_distinct() {
        assert_ne!(EVENT_START, EVENT_END);
        assert_ne!(EVENT_START, EVENT_END_ERROR);
        assert_ne!(EVENT_END, EVENT_END_ERROR);
    }

    #[test]
    fn test_entity_fields_are_distinct() {
        assert_ne!(FIELD_NODE_ID, FIELD_COMMAND_ID);
        assert_ne!(FIELD_OP, FIELD_EVENT);
    }
}
