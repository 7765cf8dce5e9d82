//! Weight reading data structures.

use std::fmt;

/// Measurement state reported by the scale.
///
/// The scale broadcasts continuously: while someone is standing on it the
/// value is still settling (`Active`), then it locks (`Stable`), and after
/// they step off it keeps re-advertising the last locked value (`Idle`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureState {
    /// Measurement in progress, value still changing
    Active,
    /// Reading has stabilized
    Stable,
    /// Last recorded value, nobody on the scale
    Idle,
}

impl MeasureState {
    /// Numeric state code used in the output line (1 = active, 2 = stable, 3 = idle).
    pub fn code(self) -> u8 {
        match self {
            MeasureState::Active => 1,
            MeasureState::Stable => 2,
            MeasureState::Idle => 3,
        }
    }
}

impl fmt::Display for MeasureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasureState::Active => "active",
            MeasureState::Stable => "stable",
            MeasureState::Idle => "idle",
        };
        write!(f, "{name}")
    }
}

/// Unit of a weight value.
///
/// The scale firmware can be switched between all three, but the kilogram
/// status codes are the only ones this decoder recognizes, so readings
/// produced here always carry `Kilograms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightUnit {
    Kilograms,
    Pounds,
    /// Chinese catty (0.5 kg), selectable on the device
    Jin,
}

/// A single decoded weight reading.
///
/// The weight is fixed-point with one decimal digit, stored as total tenths
/// of a kilogram (e.g. 68.0 kg is stored as 680).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightReading {
    /// Measurement state the scale reported alongside the value
    pub state: MeasureState,
    /// Unit of the value
    pub unit: WeightUnit,
    /// Weight in tenths of a kilogram
    pub tenths_of_kg: u16,
}

impl WeightReading {
    /// Whole-kilogram part of the weight.
    pub fn kilograms(&self) -> u16 {
        self.tenths_of_kg / 10
    }

    /// Fractional part of the weight, in tenths of a kilogram.
    pub fn tenths(&self) -> u16 {
        self.tenths_of_kg % 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        assert_eq!(MeasureState::Active.code(), 1);
        assert_eq!(MeasureState::Stable.code(), 2);
        assert_eq!(MeasureState::Idle.code(), 3);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", MeasureState::Active), "active");
        assert_eq!(format!("{}", MeasureState::Stable), "stable");
        assert_eq!(format!("{}", MeasureState::Idle), "idle");
    }

    #[test]
    fn test_weight_split() {
        let reading = WeightReading {
            state: MeasureState::Stable,
            unit: WeightUnit::Kilograms,
            tenths_of_kg: 680,
        };
        assert_eq!(reading.kilograms(), 68);
        assert_eq!(reading.tenths(), 0);

        let reading = WeightReading {
            tenths_of_kg: 725,
            ..reading
        };
        assert_eq!(reading.kilograms(), 72);
        assert_eq!(reading.tenths(), 5);
    }
}
