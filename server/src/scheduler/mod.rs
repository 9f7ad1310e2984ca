mod priority;
mod update_timing;

pub(crate) use priority::{is_relevant, priority, sort_by_priority, PrioritizedObject};
pub(crate) use update_timing::UpdateTiming;
