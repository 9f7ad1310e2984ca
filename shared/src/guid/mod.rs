mod error;
mod export_tracker;
mod guid_cache;
mod network_guid;
mod object_resolver;
mod package_map;

pub use error::GuidCacheError;
pub use export_tracker::ExportTracker;
pub use guid_cache::{package_name, GuidCache, GuidExport, GuidFlags, GuidStatus, Resolution};
pub use network_guid::NetworkGuid;
pub use object_resolver::ObjectResolver;
pub use package_map::PackageMap;
