//! Shared proptest strategies for workbench tests.

use std::sync::Arc;

use proptest::prelude::*;
use ticketbench_core::action::ActionBase;
use ticketbench_core::record::Record;

/// Records drawn from a small id space so duplicates are common.
pub fn arb_record() -> impl Strategy<Value = Arc<Record>> {
    (0_u8..8, "[a-z]{1,6}").prop_map(|(id, summary)| {
        Arc::new(Record::new(id.to_string(), format!("FOO-{id}"), summary))
    })
}

pub fn arb_records(max: usize) -> impl Strategy<Value = Vec<Arc<Record>>> {
    prop::collection::vec(arb_record(), 0..max)
}

/// Action bases with few distinct parameter values.
pub fn arb_action() -> impl Strategy<Value = ActionBase> {
    prop_oneof![
        "(ops|infra|dev)".prop_map(|label| ActionBase::AddLabel { label }),
        "(lgtm|done)".prop_map(|comment| ActionBase::AddComment { comment }),
        "(dana|lee)".prop_map(|user| ActionBase::AssignUser { user }),
        Just(ActionBase::Navigate),
    ]
}
