use crate::{
    layout::property_type::PropertyType,
    object::replicate::{ClassDescription, FunctionDescriptor, RpcKind},
};

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

fn fnv1a(seed: u32, bytes: &[u8]) -> u32 {
    let mut hash = seed;
    for byte in bytes {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub fn field_checksum(name: &str, property_type: &PropertyType) -> u32 {
    let hash = fnv1a(FNV_OFFSET, name.as_bytes());
    fnv1a(hash, property_type.type_tag().as_bytes())
}

pub fn function_checksum(function: &FunctionDescriptor) -> u32 {
    let mut hash = fnv1a(FNV_OFFSET, function.name.as_bytes());
    let kind: &[u8] = match function.kind {
        RpcKind::Client => b"client",
        RpcKind::Server => b"server",
        RpcKind::Multicast => b"multicast",
    };
    hash = fnv1a(hash, kind);
    for param in &function.params {
        hash = fnv1a(hash, param.type_tag().as_bytes());
    }
    hash
}

/// Network compatibility checksum of a whole class
pub fn class_checksum(description: &ClassDescription) -> u32 {
    let mut hash = fnv1a(FNV_OFFSET, description.name.as_bytes());
    for field in &description.fields {
        hash = fnv1a(hash, &field_checksum(field.name, &field.property_type).to_le_bytes());
    }
    for function in &description.functions {
        hash = fnv1a(hash, &function_checksum(function).to_le_bytes());
    }
    hash
}
