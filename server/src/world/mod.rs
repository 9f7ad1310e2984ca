pub(crate) mod object_record;
