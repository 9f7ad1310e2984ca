/// What one server tick did, summed over every connection
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerTickStats {
    /// Objects due for an update this tick
    pub considered: usize,
    /// Object/connection pairs found relevant
    pub relevant: usize,
    /// Bunches written
    pub replicated: usize,
    pub bytes_sent: usize,
    /// Connections which ran out of budget before every object was processed
    pub saturated_connections: usize,
    /// Object/connection pairs skipped because they are dormant
    pub dormant: usize,
    pub channels_opened: usize,
    pub channels_closed: usize,
}
