//! The explicit characteristic table for the presentation layer.
//!
//! Smart-home frameworks address device properties by name.  Instead of a
//! string-keyed dynamic lookup, every exposed property is an entry in a
//! fixed table pairing a [`CharacteristicId`] with a strongly-typed read
//! view over the status store and a writability marker.  [`validate`] runs
//! at startup and rejects a table that does not cover every id exactly
//! once, so a missing wiring is a boot failure instead of a runtime
//! surprise.

use thiserror::Error;

use atw_core::{StatusStore, TargetState};

/// Table validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CharacteristicError {
    /// A characteristic id has no table entry.
    #[error("characteristic {0:?} has no table entry")]
    Missing(CharacteristicId),

    /// A characteristic id appears more than once.
    #[error("characteristic {0:?} has duplicate table entries")]
    Duplicate(CharacteristicId),
}

/// Every property exposed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicId {
    Power,
    TargetHeatingCoolingState,
    TargetTemperature,
    CurrentTemperature,
    WaterHeaterTargetTemperature,
    WaterHeaterCurrentTemperature,
}

impl CharacteristicId {
    pub const ALL: [CharacteristicId; 6] = [
        CharacteristicId::Power,
        CharacteristicId::TargetHeatingCoolingState,
        CharacteristicId::TargetTemperature,
        CharacteristicId::CurrentTemperature,
        CharacteristicId::WaterHeaterTargetTemperature,
        CharacteristicId::WaterHeaterCurrentTemperature,
    ];
}

/// A typed characteristic reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicValue {
    Switch(bool),
    State(TargetState),
    Degrees(i64),
}

/// One table entry: the id, its read view, and whether the presentation
/// layer may write it (writes go through the command dispatcher).
pub struct Characteristic {
    pub id: CharacteristicId,
    pub read: fn(&StatusStore) -> CharacteristicValue,
    pub writable: bool,
}

/// The complete characteristic table.
pub const TABLE: &[Characteristic] = &[
    Characteristic {
        id: CharacteristicId::Power,
        read: read_power,
        writable: true,
    },
    Characteristic {
        id: CharacteristicId::TargetHeatingCoolingState,
        read: read_target_state,
        writable: true,
    },
    Characteristic {
        id: CharacteristicId::TargetTemperature,
        read: read_target_temperature,
        writable: true,
    },
    Characteristic {
        id: CharacteristicId::CurrentTemperature,
        read: read_current_temperature,
        writable: false,
    },
    Characteristic {
        id: CharacteristicId::WaterHeaterTargetTemperature,
        read: read_water_heater_target,
        writable: false,
    },
    Characteristic {
        id: CharacteristicId::WaterHeaterCurrentTemperature,
        read: read_water_heater_current,
        writable: false,
    },
];

fn read_power(store: &StatusStore) -> CharacteristicValue {
    CharacteristicValue::Switch(store.power())
}

fn read_target_state(store: &StatusStore) -> CharacteristicValue {
    CharacteristicValue::State(store.target_heating_cooling_state())
}

fn read_target_temperature(store: &StatusStore) -> CharacteristicValue {
    CharacteristicValue::Degrees(store.target_temperature())
}

fn read_current_temperature(store: &StatusStore) -> CharacteristicValue {
    CharacteristicValue::Degrees(store.current_temperature())
}

fn read_water_heater_target(store: &StatusStore) -> CharacteristicValue {
    CharacteristicValue::Degrees(store.water_heater_target_temperature())
}

fn read_water_heater_current(store: &StatusStore) -> CharacteristicValue {
    CharacteristicValue::Degrees(store.water_heater_current_temperature())
}

/// Reads one characteristic from a device's store.
///
/// Panics only if the table is incomplete, which [`validate`] rules out at
/// startup.
pub fn read(id: CharacteristicId, store: &StatusStore) -> CharacteristicValue {
    let entry = TABLE
        .iter()
        .find(|entry| entry.id == id)
        .expect("characteristic table validated at startup");
    (entry.read)(store)
}

/// Checks that the table covers every [`CharacteristicId`] exactly once.
///
/// # Errors
///
/// Returns [`CharacteristicError::Missing`] or
/// [`CharacteristicError::Duplicate`] naming the offending id.
pub fn validate() -> Result<(), CharacteristicError> {
    for id in CharacteristicId::ALL {
        match TABLE.iter().filter(|entry| entry.id == id).count() {
            0 => return Err(CharacteristicError::Missing(id)),
            1 => {}
            _ => return Err(CharacteristicError::Duplicate(id)),
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
