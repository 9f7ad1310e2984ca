/// Restricts which connections a field is sent to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepCondition {
    None,
    InitialOnly,
    OwnerOnly,
    SkipOwner,
    SimulatedOnly,
    AutonomousOnly,
    InitialOrOwner,
    Never,
}

/// The role a connection plays for one object, evaluated each replication
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RepFlags {
    /// First replication of the object on this channel
    pub net_initial: bool,
    /// The connection owns the object
    pub net_owner: bool,
    /// The connection sees the object as a simulated proxy
    pub net_simulated: bool,
}

impl RepFlags {
    pub fn for_connection(net_initial: bool, net_owner: bool) -> Self {
        Self {
            net_initial,
            net_owner,
            net_simulated: !net_owner,
        }
    }

    /// Same flags ignoring `net_initial`, used to detect role changes
    pub fn role(&self) -> (bool, bool) {
        (self.net_owner, self.net_simulated)
    }
}

impl RepCondition {
    pub fn is_active(&self, flags: &RepFlags) -> bool {
        match self {
            RepCondition::None => true,
            RepCondition::InitialOnly => flags.net_initial,
            RepCondition::OwnerOnly => flags.net_owner,
            RepCondition::SkipOwner => !flags.net_owner,
            RepCondition::SimulatedOnly => flags.net_simulated,
            RepCondition::AutonomousOnly => !flags.net_simulated,
            RepCondition::InitialOrOwner => flags.net_initial || flags.net_owner,
            RepCondition::Never => false,
        }
    }
}
