use std::{
    collections::HashMap,
    rc::{Rc, Weak},
};

use log::{debug, info, warn};

use crate::{
    guid::{error::GuidCacheError, object_resolver::ObjectResolver},
    object::{class_kinds::ClassKinds, net_object::NetObject, object_id::ObjectId},
    HostType, NetworkGuid,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GuidFlags {
    /// Wait for the object to appear instead of loading it
    pub no_load: bool,
    /// Don't report the GUID as broken when its object can't be found
    pub ignore_when_missing: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuidStatus {
    Unresolved,
    /// Waiting for an async package load
    Pending,
    Resolved,
    /// Can never resolve, references read as null
    Broken,
}

#[derive(Clone, Debug)]
pub enum Resolution {
    Resolved(Rc<NetObject>),
    Pending,
    Broken,
    /// Not resolvable yet, may resolve later
    Unknown,
    /// No object, or an object which is gone for good
    Null,
}

/// What an exporter writes the first time a static GUID crosses the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuidExport {
    pub path: String,
    pub outer: NetworkGuid,
    pub checksum: u32,
    pub flags: GuidFlags,
}

struct GuidCacheEntry {
    object: Option<Weak<NetObject>>,
    path: Option<String>,
    outer: NetworkGuid,
    checksum: u32,
    flags: GuidFlags,
    status: GuidStatus,
    warned: bool,
    references: u32,
}

impl GuidCacheEntry {
    fn unresolved(path: Option<String>, outer: NetworkGuid, checksum: u32, flags: GuidFlags) -> Self {
        Self {
            object: None,
            path,
            outer,
            checksum,
            flags,
            status: GuidStatus::Unresolved,
            warned: false,
            references: 0,
        }
    }

    fn live_object(&self) -> Option<Rc<NetObject>> {
        self.object.as_ref().and_then(Weak::upgrade)
    }
}

const DYNAMIC: usize = 0;
const STATIC: usize = 1;

/// Package a path loads from: everything before the first `.`
pub fn package_name(path: &str) -> &str {
    path.split_once('.').map(|(package, _)| package).unwrap_or(path)
}

/// Maps network GUIDs to local objects and back.
///
/// One cache exists per side of a connection set. Entries only ever hold
/// weak handles plus the path, outer and checksum needed to resolve from
/// scratch. Counters only grow, so a GUID is never handed out twice.
pub struct GuidCache {
    host_type: HostType,
    classes: ClassKinds,
    entries: HashMap<NetworkGuid, GuidCacheEntry>,
    object_to_guid: HashMap<ObjectId, NetworkGuid>,
    unique_counters: [u64; 2],
    pending_packages: HashMap<String, Vec<NetworkGuid>>,
}

impl GuidCache {
    pub fn new(host_type: HostType, classes: ClassKinds) -> Self {
        Self {
            host_type,
            classes,
            entries: HashMap::new(),
            object_to_guid: HashMap::new(),
            // counter 0 would produce the reserved values
            unique_counters: [1, 1],
            pending_packages: HashMap::new(),
        }
    }

    pub fn is_authority(&self) -> bool {
        self.host_type.is_authority()
    }

    pub fn classes(&self) -> &ClassKinds {
        &self.classes
    }

    /// Allocates a GUID for `object`. Static objects get a static GUID, with
    /// their outer assigned first.
    pub fn assign_new(&mut self, object: &Rc<NetObject>) -> Result<NetworkGuid, GuidCacheError> {
        if !self.is_authority() {
            return Err(GuidCacheError::NotAuthority {
                operation: "assign_new",
            });
        }
        if let Some(guid) = self.guid_for_object(object) {
            return Err(GuidCacheError::AlreadyAssigned {
                object: format!("{:?}", object),
                guid,
            });
        }

        let outer = match (object.is_static(), object.outer()) {
            (true, Some(outer)) => self.get_or_assign(&outer)?,
            _ => NetworkGuid::INVALID,
        };

        let is_static = object.is_static();
        let slot = if is_static { STATIC } else { DYNAMIC };
        let guid = NetworkGuid::from_counter(self.unique_counters[slot], is_static);
        self.unique_counters[slot] += 1;

        let mut entry = GuidCacheEntry::unresolved(
            object.path().map(str::to_string),
            outer,
            self.classes.checksum(&object.class()),
            GuidFlags::default(),
        );
        entry.object = Some(Rc::downgrade(object));
        entry.status = GuidStatus::Resolved;
        self.entries.insert(guid, entry);
        self.object_to_guid.insert(object.id(), guid);

        debug!("assigned GUID {} to {:?}", guid, object);
        Ok(guid)
    }

    pub fn get_or_assign(&mut self, object: &Rc<NetObject>) -> Result<NetworkGuid, GuidCacheError> {
        if let Some(guid) = self.guid_for_object(object) {
            return Ok(guid);
        }
        if !self.is_authority() {
            return Err(GuidCacheError::NoIdentity {
                object: format!("{:?}", object),
            });
        }
        self.assign_new(object)
    }

    pub fn guid_for_object(&self, object: &NetObject) -> Option<NetworkGuid> {
        self.guid_for_id(object.id())
    }

    pub(crate) fn guid_for_id(&self, object_id: ObjectId) -> Option<NetworkGuid> {
        self.object_to_guid.get(&object_id).copied()
    }

    /// Looks `guid` up, trying to find or load static objects which aren't
    /// bound yet. Broken GUIDs are never retried.
    pub fn resolve(
        &mut self,
        guid: NetworkGuid,
        mut resolver: Option<&mut (dyn ObjectResolver + '_)>,
        allow_async: bool,
    ) -> Resolution {
        if !guid.is_valid() {
            return Resolution::Null;
        }
        let Some(entry) = self.entries.get(&guid) else {
            return Resolution::Unknown;
        };
        if entry.status == GuidStatus::Broken {
            return Resolution::Broken;
        }
        if let Some(object) = entry.live_object() {
            return Resolution::Resolved(object);
        }
        if entry.object.is_some() && guid.is_dynamic() {
            return Resolution::Null;
        }
        if entry.status == GuidStatus::Pending {
            return Resolution::Pending;
        }
        let Some(path) = entry.path.clone() else {
            return Resolution::Unknown;
        };
        let outer_guid = entry.outer;
        let flags = entry.flags;

        let outer = if outer_guid.is_valid() {
            match self.resolve(outer_guid, resolver.as_deref_mut(), allow_async) {
                Resolution::Resolved(outer) => Some(outer),
                Resolution::Broken => {
                    self.mark_broken(guid, "its outer is broken");
                    return Resolution::Broken;
                }
                Resolution::Pending => return Resolution::Pending,
                Resolution::Unknown | Resolution::Null => return Resolution::Unknown,
            }
        } else {
            None
        };

        let Some(resolver) = resolver else {
            return Resolution::Unknown;
        };

        if let Some(object) = resolver.find_object(&path, outer.as_ref()) {
            return self.bind_found(guid, &object);
        }

        if flags.no_load || !allow_async {
            return Resolution::Unknown;
        }

        let package = package_name(&path).to_string();
        if resolver.request_async_load(&package) {
            info!("loading package `{}` for GUID {}", package, guid);
            if let Some(entry) = self.entries.get_mut(&guid) {
                entry.status = GuidStatus::Pending;
            }
            self.pending_packages.entry(package).or_default().push(guid);
            Resolution::Pending
        } else if flags.ignore_when_missing {
            Resolution::Unknown
        } else {
            self.mark_broken(guid, "its package can't be loaded");
            Resolution::Broken
        }
    }

    fn bind_found(&mut self, guid: NetworkGuid, object: &Rc<NetObject>) -> Resolution {
        let local_checksum = self.classes.checksum(&object.class());
        let Some(entry) = self.entries.get_mut(&guid) else {
            return Resolution::Unknown;
        };
        if entry.checksum != 0 && entry.checksum != local_checksum {
            entry.status = GuidStatus::Broken;
            if !entry.warned {
                entry.warned = true;
                warn!(
                    "GUID {} ({}) has checksum {:#010x} on the peer but {:#010x} locally, treating as broken",
                    guid,
                    entry.path.as_deref().unwrap_or("?"),
                    entry.checksum,
                    local_checksum
                );
            }
            return Resolution::Broken;
        }
        entry.object = Some(Rc::downgrade(object));
        entry.status = GuidStatus::Resolved;
        self.object_to_guid.insert(object.id(), guid);
        Resolution::Resolved(object.clone())
    }

    fn mark_broken(&mut self, guid: NetworkGuid, reason: &str) {
        if let Some(entry) = self.entries.get_mut(&guid) {
            entry.status = GuidStatus::Broken;
            if !entry.warned {
                entry.warned = true;
                warn!(
                    "GUID {} ({}) is broken: {}",
                    guid,
                    entry.path.as_deref().unwrap_or("?"),
                    reason
                );
            }
        }
    }

    /// Records a GUID->path mapping exported by the authority. Re-registering
    /// the same mapping is a no-op.
    pub fn register_from_path(
        &mut self,
        guid: NetworkGuid,
        export: GuidExport,
    ) -> Result<(), GuidCacheError> {
        if self.is_authority() {
            return Err(GuidCacheError::NotAuthority {
                operation: "register_from_path",
            });
        }
        if !guid.is_valid() || guid.is_default() {
            return Err(GuidCacheError::InvalidGuid { guid });
        }

        match self.entries.get_mut(&guid) {
            Some(entry) => match &entry.path {
                Some(existing) if *existing != export.path => Err(GuidCacheError::PathConflict {
                    guid,
                    existing: existing.clone(),
                    requested: export.path,
                }),
                Some(_) => Ok(()),
                None => {
                    entry.path = Some(export.path);
                    entry.outer = export.outer;
                    entry.checksum = export.checksum;
                    entry.flags = export.flags;
                    Ok(())
                }
            },
            None => {
                debug!("registered GUID {} as `{}`", guid, export.path);
                self.entries.insert(
                    guid,
                    GuidCacheEntry::unresolved(
                        Some(export.path),
                        export.outer,
                        export.checksum,
                        export.flags,
                    ),
                );
                Ok(())
            }
        }
    }

    /// Binds a GUID received from the authority to a local object, used when
    /// a channel open spawns or finds its object
    pub fn register_object(
        &mut self,
        guid: NetworkGuid,
        object: &Rc<NetObject>,
    ) -> Result<(), GuidCacheError> {
        if !guid.is_valid() || guid.is_default() {
            return Err(GuidCacheError::InvalidGuid { guid });
        }
        let entry = self.entries.entry(guid).or_insert_with(|| {
            GuidCacheEntry::unresolved(
                object.path().map(str::to_string),
                NetworkGuid::INVALID,
                0,
                GuidFlags::default(),
            )
        });
        entry.object = Some(Rc::downgrade(object));
        entry.status = GuidStatus::Resolved;
        self.object_to_guid.insert(object.id(), guid);
        Ok(())
    }

    /// Finalizes every GUID waiting on `package`. Returns the ones which resolved.
    pub fn async_load_completed(
        &mut self,
        package: &str,
        resolver: &mut dyn ObjectResolver,
    ) -> Vec<NetworkGuid> {
        let Some(guids) = self.pending_packages.remove(package) else {
            return Vec::new();
        };
        info!("package `{}` loaded, finalizing {} GUIDs", package, guids.len());

        let mut resolved = Vec::new();
        for guid in guids {
            let ignore_when_missing = match self.entries.get_mut(&guid) {
                Some(entry) => {
                    if entry.status == GuidStatus::Pending {
                        entry.status = GuidStatus::Unresolved;
                    }
                    entry.flags.ignore_when_missing
                }
                None => continue,
            };
            match self.resolve(guid, Some(&mut *resolver), false) {
                Resolution::Resolved(_) => resolved.push(guid),
                Resolution::Broken | Resolution::Null => {}
                Resolution::Pending | Resolution::Unknown => {
                    if !ignore_when_missing {
                        self.mark_broken(guid, "not found after its package loaded");
                    }
                }
            }
        }
        resolved
    }

    /// Polls `resolver` for finished loads and finalizes them
    pub fn poll_async_loads(&mut self, resolver: &mut dyn ObjectResolver) -> Vec<NetworkGuid> {
        let mut resolved = Vec::new();
        for package in resolver.poll_completed_loads() {
            resolved.extend(self.async_load_completed(&package, resolver));
        }
        resolved
    }

    pub fn has_pending_loads(&self) -> bool {
        !self.pending_packages.is_empty()
    }

    /// Unbinds a destroyed object. Static entries can be resolved again by
    /// path, dynamic entries stay dead until garbage collected.
    pub fn object_destroyed(&mut self, object_id: ObjectId) -> Option<NetworkGuid> {
        let guid = self.object_to_guid.remove(&object_id)?;
        if let Some(entry) = self.entries.get_mut(&guid) {
            if guid.is_static() {
                entry.object = None;
                entry.status = GuidStatus::Unresolved;
            } else {
                entry.object = Some(Weak::new());
            }
        }
        Some(guid)
    }

    pub fn add_reference(&mut self, guid: NetworkGuid) {
        if let Some(entry) = self.entries.get_mut(&guid) {
            entry.references += 1;
        }
    }

    pub fn release_reference(&mut self, guid: NetworkGuid) {
        if let Some(entry) = self.entries.get_mut(&guid) {
            entry.references = entry.references.saturating_sub(1);
        }
    }

    pub fn references(&self, guid: NetworkGuid) -> u32 {
        self.entries
            .get(&guid)
            .map(|entry| entry.references)
            .unwrap_or(0)
    }

    /// Drops dynamic entries whose object is gone and which nothing references.
    /// Returns how many were dropped.
    pub fn collect_garbage(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|guid, entry| {
            !(guid.is_dynamic() && entry.references == 0 && entry.live_object().is_none())
        });
        let entries = &self.entries;
        self.object_to_guid
            .retain(|_, guid| entries.contains_key(guid));
        let collected = before - self.entries.len();
        if collected > 0 {
            debug!("collected {} stale GUIDs", collected);
        }
        collected
    }

    pub fn export_info(&self, guid: NetworkGuid) -> Option<GuidExport> {
        let entry = self.entries.get(&guid)?;
        Some(GuidExport {
            path: entry.path.clone()?,
            outer: entry.outer,
            checksum: entry.checksum,
            flags: entry.flags,
        })
    }

    pub fn status(&self, guid: NetworkGuid) -> Option<GuidStatus> {
        self.entries.get(&guid).map(|entry| entry.status)
    }

    pub fn is_broken(&self, guid: NetworkGuid) -> bool {
        self.status(guid) == Some(GuidStatus::Broken)
    }

    pub fn contains(&self, guid: NetworkGuid) -> bool {
        self.entries.contains_key(&guid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
