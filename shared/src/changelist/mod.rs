mod changelist_manager;
mod rep_state;

pub use changelist_manager::ChangelistManager;
pub use rep_state::RepState;

/// Sorted union of two ascending field index lists
pub(crate) fn merge_changelists(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut output = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            output.push(a[i]);
            i += 1;
        } else if b[j] < a[i] {
            output.push(b[j]);
            j += 1;
        } else {
            output.push(a[i]);
            i += 1;
            j += 1;
        }
    }
    output.extend_from_slice(&a[i..]);
    output.extend_from_slice(&b[j..]);
    output
}
