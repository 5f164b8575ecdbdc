//! Fixed-point math utilities for deterministic turn logic.
//!
//! Charge ramps and turn anchors use fixed-point arithmetic so that a
//! scripted match produces identical results on every platform.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all core math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Ticks per second used to convert authored durations.
pub const TICK_RATE: u32 = 20;

/// Triangle wave bouncing between 0 and `length`.
///
/// `ping_pong(t, 1)` rises from 0 to 1 over `t in [0, 1]`, falls back to
/// 0 over `[1, 2]`, and repeats.
#[must_use]
pub fn ping_pong(t: Fixed, length: Fixed) -> Fixed {
    if length <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    let period = length * Fixed::from_num(2);
    let mut phase = t % period;
    if phase < Fixed::ZERO {
        phase += period;
    }
    if phase <= length {
        phase
    } else {
        period - phase
    }
}

/// Linear interpolation between `a` and `b`.
#[must_use]
pub fn lerp(a: Fixed, b: Fixed, t: Fixed) -> Fixed {
    a + (b - a) * t
}

/// Fixed-point 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec3Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate (up).
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
    /// Z coordinate.
    #[serde(with = "fixed_serde")]
    pub z: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for authored fixed-point values.
///
/// Data files write plain decimals (`1.5`); they are converted once at
/// load time and never touch floats afterwards.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize a decimal into a fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("value out of range: {value}")))
    }
}

impl Vec3Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        Self { x, y, z }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
        z: Fixed::ZERO,
    };

    /// Squared distance on the ground plane (ignores height).
    #[must_use]
    pub fn planar_distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }
}

impl std::ops::Add for Vec3Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl std::ops::Sub for Vec3Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}
