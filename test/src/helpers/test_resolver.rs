use std::{collections::HashMap, rc::Rc};

use replicore_shared::{package_name, NetObject, ObjectResolver};

/// Object lookup for the receiving side. Objects are either loaded up front
/// or sit in a package which loads when the test says so.
#[derive(Default)]
pub struct TestResolver {
    loaded: HashMap<String, Rc<NetObject>>,
    unloaded: HashMap<String, Vec<Rc<NetObject>>>,
    requested: Vec<String>,
    completed: Vec<String>,
}

impl TestResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_loaded(&mut self, object: &Rc<NetObject>) {
        if let Some(path) = object.path() {
            self.loaded.insert(path.to_string(), object.clone());
        }
    }

    /// Adds an object which is only found after its package was requested
    /// and `finish_loads` ran
    pub fn add_unloaded(&mut self, object: &Rc<NetObject>) {
        if let Some(path) = object.path() {
            self.unloaded
                .entry(package_name(path).to_string())
                .or_default()
                .push(object.clone());
        }
    }

    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    /// Completes every requested load
    pub fn finish_loads(&mut self) {
        for package in std::mem::take(&mut self.requested) {
            for object in self.unloaded.remove(&package).unwrap_or_default() {
                self.add_loaded(&object);
            }
            self.completed.push(package);
        }
    }
}

impl ObjectResolver for TestResolver {
    fn find_object(&mut self, path: &str, _outer: Option<&Rc<NetObject>>) -> Option<Rc<NetObject>> {
        self.loaded.get(path).cloned()
    }

    fn request_async_load(&mut self, package: &str) -> bool {
        if !self.unloaded.contains_key(package) {
            return false;
        }
        if !self.requested.iter().any(|requested| requested == package) {
            self.requested.push(package.to_string());
        }
        true
    }

    fn poll_completed_loads(&mut self) -> Vec<String> {
        std::mem::take(&mut self.completed)
    }
}
