use std::any::Any;

use crate::{
    delta::NetDeltaSerialize,
    layout::{LayoutError, PropertyType, RepCondition, RepValue},
    object::{net_object::ReplicationSettings, viewer::Viewer},
    NetVector,
};

/// Which side executes a remote function
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RpcKind {
    /// Sent by the server, executed on the owning client
    Client,
    /// Sent by the owning client, executed on the server
    Server,
    /// Sent by the server, executed on every client the object is relevant to
    Multicast,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub property_type: PropertyType,
    pub condition: RepCondition,
    pub rep_notify: bool,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, property_type: PropertyType) -> Self {
        Self {
            name,
            property_type,
            condition: RepCondition::None,
            rep_notify: false,
        }
    }

    pub fn condition(mut self, condition: RepCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Calls `Replicate::on_rep` on the receiver after the field changes
    pub fn notify(mut self) -> Self {
        self.rep_notify = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub kind: RpcKind,
    pub reliable: bool,
    pub params: Vec<PropertyType>,
}

impl FunctionDescriptor {
    pub fn new(name: &'static str, kind: RpcKind) -> Self {
        Self {
            name,
            kind,
            reliable: false,
            params: Vec::new(),
        }
    }

    pub fn reliable(mut self) -> Self {
        self.reliable = true;
        self
    }

    pub fn param(mut self, property_type: PropertyType) -> Self {
        self.params.push(property_type);
        self
    }
}

/// Reflection data for a replicated class: its networked fields in
/// declaration order followed by its remote functions
#[derive(Clone, Debug, PartialEq)]
pub struct ClassDescription {
    pub name: &'static str,
    pub fields: Vec<FieldDescriptor>,
    pub functions: Vec<FunctionDescriptor>,
}

impl ClassDescription {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn function(mut self, function: FunctionDescriptor) -> Self {
        self.functions.push(function);
        self
    }
}

/// What the scheduler knows about an object/viewer pair when asking for
/// relevancy or priority
pub struct NetContext<'a> {
    pub settings: &'a ReplicationSettings,
    /// The viewer's connection owns the object
    pub owned_by_viewer: bool,
    /// Seconds the object has been waiting for an update on this connection
    pub waiting_time: f32,
}

const CLOSE_PROXIMITY_SQUARED: f32 = 500.0 * 500.0;
const NEAR_SIGHT_THRESHOLD_SQUARED: f32 = 2000.0 * 2000.0;
const MED_SIGHT_THRESHOLD_SQUARED: f32 = 3162.0 * 3162.0;
const FAR_SIGHT_THRESHOLD_SQUARED: f32 = 8000.0 * 8000.0;

/// Relevancy used when a class doesn't override `is_net_relevant_for`
pub fn default_net_relevancy(
    location: Option<NetVector>,
    viewer: &Viewer,
    context: &NetContext,
) -> bool {
    if context.settings.always_relevant || context.owned_by_viewer {
        return true;
    }
    if context.settings.only_relevant_to_owner {
        return false;
    }
    match location {
        Some(location) => {
            (location - viewer.location).size_squared() < context.settings.net_cull_distance_squared
        }
        None => false,
    }
}

/// Priority used when a class doesn't override `net_priority`. Grows with
/// waiting time, favours objects in front of and close to the viewer.
pub fn default_net_priority(location: Option<NetVector>, viewer: &Viewer, context: &NetContext) -> f32 {
    let mut time = context.waiting_time;

    if context.owned_by_viewer {
        return 4.0 * time * context.settings.net_priority;
    }

    if let Some(location) = location {
        let offset = location - viewer.location;
        let distance_squared = offset.size_squared();
        let facing = viewer.direction.dot(&offset);

        if facing < 0.0 {
            if distance_squared > NEAR_SIGHT_THRESHOLD_SQUARED {
                time *= 0.2;
            } else if distance_squared > CLOSE_PROXIMITY_SQUARED {
                time *= 0.4;
            }
        } else if distance_squared < FAR_SIGHT_THRESHOLD_SQUARED
            && facing * facing > 0.5 * distance_squared
        {
            time *= 2.0;
        } else if distance_squared > MED_SIGHT_THRESHOLD_SQUARED {
            time *= 0.4;
        }
    }

    context.settings.net_priority * time
}

/// A class whose instances are replicated.
///
/// Fields are addressed by their position in `describe().fields`, remote
/// functions by their position in `describe().functions`.
pub trait Replicate: Any {
    fn describe() -> ClassDescription
    where
        Self: Sized;

    /// Current value of a plain field. Custom delta fields may return `RepValue::Delta`.
    fn read_field(&self, index: usize) -> RepValue;

    fn write_field(&mut self, index: usize, value: RepValue) -> Result<(), LayoutError>;

    fn delta_field(&self, _index: usize) -> Option<&dyn NetDeltaSerialize> {
        None
    }

    fn delta_field_mut(&mut self, _index: usize) -> Option<&mut dyn NetDeltaSerialize> {
        None
    }

    /// Called on the receiving side after a notifying field was applied
    fn on_rep(&mut self, _index: usize) {}

    /// Executes a remote function received from the peer
    fn receive_rpc(&mut self, _function: usize, _args: Vec<RepValue>) {}

    fn net_location(&self) -> Option<NetVector> {
        None
    }

    fn is_net_relevant_for(&self, viewer: &Viewer, context: &NetContext) -> bool {
        default_net_relevancy(self.net_location(), viewer, context)
    }

    fn net_priority(&self, viewer: &Viewer, context: &NetContext) -> f32 {
        default_net_priority(self.net_location(), viewer, context)
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
