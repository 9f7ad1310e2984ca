pub(crate) mod connection;
pub(crate) mod object_channel;
