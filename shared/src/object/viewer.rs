use std::ops::Sub;

use crate::ConnectionId;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NetVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl NetVector {
    pub const ZERO: NetVector = NetVector {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &NetVector) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn size_squared(&self) -> f32 {
        self.dot(self)
    }
}

impl Sub for NetVector {
    type Output = NetVector;

    fn sub(self, rhs: NetVector) -> NetVector {
        NetVector::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// One point of view through which a connection observes the world. A
/// connection may carry several (split-screen children, spectators).
#[derive(Clone, Debug, PartialEq)]
pub struct Viewer {
    pub connection: ConnectionId,
    pub location: NetVector,
    /// Normalised view direction
    pub direction: NetVector,
}

impl Viewer {
    pub fn new(connection: ConnectionId, location: NetVector, direction: NetVector) -> Self {
        Self {
            connection,
            location,
            direction,
        }
    }

    pub fn at_origin(connection: ConnectionId) -> Self {
        Self::new(connection, NetVector::ZERO, NetVector::new(1.0, 0.0, 0.0))
    }
}
