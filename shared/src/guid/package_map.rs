use std::collections::HashSet;

use log::warn;

use replicore_serde::{BitReader, BitWrite, Serde, SerdeErr};

use crate::{
    guid::{
        export_tracker::ExportTracker,
        guid_cache::{GuidCache, GuidExport, GuidFlags, Resolution},
        object_resolver::ObjectResolver,
    },
    layout::{ObjectSerializer, ObjectValue},
    NetworkGuid,
};

/// Reads and writes object references for one bunch on one connection.
///
/// A reference is `[guid][export bit]`. The authority sets the export bit
/// for static GUIDs the peer hasn't acknowledged yet and follows it with
/// `[path][outer reference][checksum][no-load bit]`.
pub struct PackageMap<'a> {
    cache: &'a mut GuidCache,
    exports: Option<&'a mut ExportTracker>,
    resolver: Option<&'a mut dyn ObjectResolver>,
    allow_async: bool,
    exported_this_bunch: HashSet<NetworkGuid>,
}

impl<'a> PackageMap<'a> {
    /// A package map which neither exports nor loads
    pub fn new(cache: &'a mut GuidCache) -> Self {
        Self {
            cache,
            exports: None,
            resolver: None,
            allow_async: false,
            exported_this_bunch: HashSet::new(),
        }
    }

    /// For writing on the authority, exporting unacknowledged static GUIDs
    pub fn exporting(cache: &'a mut GuidCache, exports: &'a mut ExportTracker) -> Self {
        let mut package_map = Self::new(cache);
        package_map.exports = Some(exports);
        package_map
    }

    /// For reading on the receiving side, resolving through `resolver`
    pub fn resolving(
        cache: &'a mut GuidCache,
        resolver: &'a mut dyn ObjectResolver,
        allow_async: bool,
    ) -> Self {
        let mut package_map = Self::new(cache);
        package_map.resolver = Some(resolver);
        package_map.allow_async = allow_async;
        package_map
    }

    pub fn cache(&mut self) -> &mut GuidCache {
        &mut *self.cache
    }

    pub fn resolve_guid(&mut self, guid: NetworkGuid) -> Resolution {
        self.cache
            .resolve(guid, self.resolver.as_deref_mut(), self.allow_async)
    }

    /// Forgets exports written into a bunch which won't be sent
    pub fn discard_exports(&mut self) {
        self.exported_this_bunch.clear();
        if let Some(exports) = self.exports.as_deref_mut() {
            exports.discard_pending();
        }
    }

    pub fn write_guid_ref(&mut self, guid: NetworkGuid, writer: &mut dyn BitWrite) {
        guid.ser(writer);
        if !guid.is_valid() {
            return;
        }

        let needs_export = guid.is_static()
            && !self.exported_this_bunch.contains(&guid)
            && self
                .exports
                .as_deref()
                .map(|exports| exports.needs_export(&guid))
                .unwrap_or(false);
        let export = if needs_export {
            self.cache.export_info(guid)
        } else {
            None
        };

        let Some(export) = export else {
            writer.write_bit(false);
            return;
        };

        writer.write_bit(true);
        export.path.ser(writer);
        self.write_guid_ref(export.outer, writer);
        export.checksum.ser(writer);
        writer.write_bit(export.flags.no_load);

        if !writer.is_counter() {
            self.exported_this_bunch.insert(guid);
            if let Some(exports) = self.exports.as_deref_mut() {
                exports.note_exported(guid);
            }
        }
    }

    /// Reads a reference, registering any export it carries
    pub fn read_guid_ref(&mut self, reader: &mut BitReader) -> Result<NetworkGuid, SerdeErr> {
        let guid = NetworkGuid::de(reader)?;
        if !guid.is_valid() {
            return Ok(guid);
        }
        if reader.read_bit()? {
            let path = String::de(reader)?;
            let outer = self.read_guid_ref(reader)?;
            let checksum = u32::de(reader)?;
            let no_load = reader.read_bit()?;
            let export = GuidExport {
                path,
                outer,
                checksum,
                flags: GuidFlags {
                    no_load,
                    ignore_when_missing: false,
                },
            };
            self.cache
                .register_from_path(guid, export)
                .map_err(|error| SerdeErr::InvalidValue {
                    type_name: "NetworkGuid",
                    reason: error.to_string(),
                })?;
        }
        Ok(guid)
    }
}

impl ObjectSerializer for PackageMap<'_> {
    fn write_object(&mut self, value: &ObjectValue, writer: &mut dyn BitWrite) {
        let guid = match value.get() {
            Some(object) => match self.cache.get_or_assign(&object) {
                Ok(guid) => guid,
                Err(error) => {
                    warn!("writing null reference: {}", error);
                    NetworkGuid::INVALID
                }
            },
            None if value.is_unresolved() => value.guid(),
            None => NetworkGuid::INVALID,
        };
        self.write_guid_ref(guid, writer);
    }

    fn read_object(&mut self, reader: &mut BitReader) -> Result<ObjectValue, SerdeErr> {
        let guid = self.read_guid_ref(reader)?;
        Ok(match self.resolve_guid(guid) {
            Resolution::Resolved(object) => ObjectValue::resolved(guid, &object),
            Resolution::Pending | Resolution::Unknown => ObjectValue::unresolved(guid),
            Resolution::Broken | Resolution::Null => ObjectValue::null(),
        })
    }
}
