use replicore_serde::{BitReader, BitWrite, BitWriter, Serde, UnsignedVariableInteger};

use crate::{
    layout::{
        checksum::{field_checksum, function_checksum},
        error::LayoutError,
        property_type::PropertyType,
        rep_condition::{RepCondition, RepFlags},
        rep_value::RepValue,
        value_serde::{check_value, read_value, write_value, ObjectSerializer},
    },
    object::replicate::{ClassDescription, Replicate, RpcKind},
    NetworkGuid,
};

pub(crate) type FieldHandle = UnsignedVariableInteger<4>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldStrategy {
    /// Compared against the shared shadow state and sent by handle
    Plain,
    /// Serializes its own delta against a per-connection base state
    CustomDelta,
}

#[derive(Clone, Debug)]
pub struct RepField {
    pub index: usize,
    pub name: &'static str,
    pub property_type: PropertyType,
    pub condition: RepCondition,
    pub rep_notify: bool,
    pub strategy: FieldStrategy,
    pub checksum: u32,
}

#[derive(Clone, Debug)]
pub struct RepFunction {
    pub index: usize,
    /// Position in the shared field/function index space
    pub net_index: usize,
    pub name: &'static str,
    pub kind: RpcKind,
    pub reliable: bool,
    pub params: Vec<PropertyType>,
    pub checksum: u32,
}

/// A plain field decoded from the wire and applied to an object
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedField {
    pub index: usize,
    /// References inside the value which couldn't be mapped yet
    pub unresolved: Vec<NetworkGuid>,
}

/// Immutable description of how one class replicates. Built once per class
/// and shared by every instance and connection.
#[derive(Debug)]
pub struct RepLayout {
    class_name: &'static str,
    fields: Vec<RepField>,
    functions: Vec<RepFunction>,
}

impl RepLayout {
    pub fn build(description: &ClassDescription) -> Self {
        let fields: Vec<RepField> = description
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| RepField {
                index,
                name: field.name,
                property_type: field.property_type.clone(),
                condition: field.condition,
                rep_notify: field.rep_notify,
                strategy: if field.property_type.is_custom_delta() {
                    FieldStrategy::CustomDelta
                } else {
                    FieldStrategy::Plain
                },
                checksum: field_checksum(field.name, &field.property_type),
            })
            .collect();

        let field_count = fields.len();
        let functions = description
            .functions
            .iter()
            .enumerate()
            .map(|(index, function)| RepFunction {
                index,
                net_index: field_count + index,
                name: function.name,
                kind: function.kind,
                reliable: function.reliable,
                params: function.params.clone(),
                checksum: function_checksum(function),
            })
            .collect();

        Self {
            class_name: description.name,
            fields,
            functions,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn fields(&self) -> &[RepField] {
        &self.fields
    }

    pub fn functions(&self) -> &[RepFunction] {
        &self.functions
    }

    pub fn field(&self, index: usize) -> Option<&RepField> {
        self.fields.get(index)
    }

    pub fn function(&self, index: usize) -> Option<&RepFunction> {
        self.functions.get(index)
    }

    pub fn function_index(&self, name: &str) -> Result<usize, LayoutError> {
        self.functions
            .iter()
            .position(|function| function.name == name)
            .ok_or_else(|| LayoutError::UnknownFunction {
                class_name: self.class_name,
                name: name.to_string(),
            })
    }

    /// Size of the shared field/function index space
    pub fn net_index_count(&self) -> usize {
        self.fields.len() + self.functions.len()
    }

    /// Per-index checksums, fields first, then functions
    pub fn checksums(&self) -> Vec<u32> {
        self.fields
            .iter()
            .map(|field| field.checksum)
            .chain(self.functions.iter().map(|function| function.checksum))
            .collect()
    }

    pub fn custom_delta_fields(&self) -> impl Iterator<Item = &RepField> {
        self.fields
            .iter()
            .filter(|field| field.strategy == FieldStrategy::CustomDelta)
    }

    /// The default-object baseline every changelist is relative to
    pub fn init_shadow(&self) -> Vec<RepValue> {
        self.fields
            .iter()
            .map(|field| field.property_type.default_value())
            .collect()
    }

    /// Compares every plain field of `object` against `shadow`, copying
    /// changed values into `shadow`. Returns the changed field indices in
    /// ascending order. Only reads from `object`.
    pub fn compare(&self, shadow: &mut [RepValue], object: &dyn Replicate) -> Vec<usize> {
        let mut changed = Vec::new();
        for field in &self.fields {
            if field.strategy != FieldStrategy::Plain {
                continue;
            }
            let live = object.read_field(field.index);
            if shadow[field.index] != live {
                shadow[field.index] = live;
                changed.push(field.index);
            }
        }
        changed
    }

    /// Writes `(handle, value)` pairs for every changed field whose condition
    /// holds for `flags`, then the end marker. Returns the indices written.
    pub fn serialize_changed(
        &self,
        changed: &[usize],
        source: &[RepValue],
        flags: &RepFlags,
        writer: &mut BitWriter,
        objects: &mut dyn ObjectSerializer,
    ) -> Result<Vec<usize>, LayoutError> {
        let mut written = Vec::new();
        for index in changed {
            let field = self.field(*index).ok_or(LayoutError::UnknownField {
                class_name: self.class_name,
                index: *index,
                count: self.fields.len(),
            })?;
            if field.strategy != FieldStrategy::Plain || !field.condition.is_active(flags) {
                continue;
            }
            let mut field_writer = BitWriter::new();
            FieldHandle::from_u64(*index as u64 + 1).ser(&mut field_writer);
            write_value(&field.property_type, &source[*index], &mut field_writer, objects)?;
            writer.append_writer(field_writer);
            written.push(*index);
        }
        FieldHandle::new(0).ser(writer);
        Ok(written)
    }

    /// Reads a plain field block and applies it to `object`
    pub fn deserialize(
        &self,
        reader: &mut BitReader,
        object: &mut dyn Replicate,
        objects: &mut dyn ObjectSerializer,
    ) -> Result<Vec<ReceivedField>, LayoutError> {
        let mut received = Vec::new();
        let mut previous = 0;
        loop {
            let handle = FieldHandle::de(reader)?.get_u64() as usize;
            if handle == 0 {
                break;
            }
            if handle <= previous {
                return Err(LayoutError::HandleOutOfOrder {
                    class_name: self.class_name,
                    previous,
                    handle,
                });
            }
            previous = handle;

            let index = handle - 1;
            let field = self.field(index).ok_or(LayoutError::UnknownField {
                class_name: self.class_name,
                index,
                count: self.fields.len(),
            })?;
            if field.strategy != FieldStrategy::Plain {
                return Err(LayoutError::StrategyMismatch {
                    class_name: self.class_name,
                    field: field.name,
                });
            }

            let value = read_value(&field.property_type, reader, objects)?;
            let mut unresolved = Vec::new();
            value.collect_unresolved(&mut unresolved);
            object.write_field(index, value)?;
            received.push(ReceivedField { index, unresolved });
        }
        Ok(received)
    }

    /// Calls `on_rep` for every notifying field in `applied`
    pub fn notify_fields(&self, applied: &[usize], object: &mut dyn Replicate) {
        for index in applied {
            if self.fields.get(*index).map(|field| field.rep_notify) == Some(true) {
                object.on_rep(*index);
            }
        }
    }

    /// Validates a call without writing it
    pub fn check_rpc_args(&self, function: usize, args: &[RepValue]) -> Result<(), LayoutError> {
        let rep_function = self.rpc(function)?;
        if rep_function.params.len() != args.len() {
            return Err(LayoutError::ArgumentCount {
                function: rep_function.name,
                expected: rep_function.params.len(),
                found: args.len(),
            });
        }
        for (param, arg) in rep_function.params.iter().zip(args) {
            check_value(param, arg)?;
        }
        Ok(())
    }

    pub fn write_rpc_args(
        &self,
        function: usize,
        args: &[RepValue],
        writer: &mut dyn BitWrite,
        objects: &mut dyn ObjectSerializer,
    ) -> Result<(), LayoutError> {
        self.check_rpc_args(function, args)?;
        let rep_function = self.rpc(function)?;
        for (param, arg) in rep_function.params.iter().zip(args) {
            write_value(param, arg, writer, objects)?;
        }
        Ok(())
    }

    pub fn read_rpc_args(
        &self,
        function: usize,
        reader: &mut BitReader,
        objects: &mut dyn ObjectSerializer,
    ) -> Result<Vec<RepValue>, LayoutError> {
        let rep_function = self.rpc(function)?;
        let mut args = Vec::with_capacity(rep_function.params.len());
        for param in &rep_function.params {
            args.push(read_value(param, reader, objects)?);
        }
        Ok(args)
    }

    fn rpc(&self, function: usize) -> Result<&RepFunction, LayoutError> {
        self.function(function).ok_or(LayoutError::UnknownField {
            class_name: self.class_name,
            index: self.fields.len() + function,
            count: self.net_index_count(),
        })
    }
}
