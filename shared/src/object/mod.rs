pub mod class_kinds;
pub mod error;
pub mod net_object;
pub mod object_id;
pub mod replicate;
pub mod viewer;
