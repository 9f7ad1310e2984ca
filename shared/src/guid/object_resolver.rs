use std::rc::Rc;

use crate::object::net_object::NetObject;

/// The object-lifetime layer, as seen by the GUID cache when it has to turn
/// an exported path back into a local object
pub trait ObjectResolver {
    /// Finds an already loaded object by path, inside `outer` when given
    fn find_object(&mut self, path: &str, outer: Option<&Rc<NetObject>>) -> Option<Rc<NetObject>>;

    /// Starts loading `package` in the background. Returns false if the
    /// package can't be loaded at all.
    fn request_async_load(&mut self, package: &str) -> bool;

    /// Packages whose loads finished since the last call
    fn poll_completed_loads(&mut self) -> Vec<String>;
}
