//! The command catalog: semantic property names mapped to opaque wire codes.
//!
//! Every telemetry or command field the appliance understands is a short
//! opaque string (`"Pow"`, `"WatBoxTemSet"`, …).  The catalog is the single
//! source of truth for those codes.  Two value conventions exist:
//!
//! - **Scalar fields** — one code, one integer, optionally named through an
//!   enumerated value table (power, mode, set-points).
//! - **Split telemetry** — two codes per logical temperature, a `…Hig` and a
//!   `…Low` companion, decoding as `high − 100 + low / 100`.  Split fields
//!   are read-only; settable temperatures are whole-degree scalars.
//!
//! The catalog is immutable and defined once; [`validate`] is called at
//! process start to reject duplicate wire codes before any traffic flows.

use thiserror::Error;

/// Catalog validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Two properties share one wire code.
    #[error("duplicate wire code {code:?} shared by {first:?} and {second:?}")]
    DuplicateCode {
        code: &'static str,
        first: Property,
        second: Property,
    },
}

// ── Properties ────────────────────────────────────────────────────────────────

/// Every semantic property in the catalog.
///
/// Telemetry entries mirror what the appliance reports in a full status
/// reply; command entries are the fields the dispatcher may set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    // Split temperature telemetry (read-only, paired High/Low codes)
    AllInWaterTempHigh,
    AllInWaterTempLow,
    AllOutWaterTempHigh,
    AllOutWaterTempLow,
    OutletWaterTempHigh,
    OutletWaterTempLow,
    WaterBoxTempHigh,
    WaterBoxTempLow,
    RoomTempHigh,
    RoomTempLow,
    // Run-status flags
    WaterBoxElectricHeaterRunStatus,
    SystemAntiFrostRunStatus,
    ElectricHeater1RunStatus,
    ElectricHeater2RunStatus,
    AntiFrostRunStatus,
    // Switches and modes
    Power,
    Mode,
    TemperatureUnit,
    TemperatureRecovery,
    AllError,
    // Set-points (whole-degree scalars)
    CoolingWaterOutTempSet,
    HeatingWaterOutTempSet,
    WaterBoxTempSet,
    CoolingHomeTempSet,
    HeatingHomeTempSet,
    // Misc fields reported by the appliance
    Host,
    Name,
    ColdHotWater,
    HotHotWater,
    LeftHome,
    TemperatureRecoveryB,
    RoomHomeTempExt,
}

impl Property {
    /// Every property, in the order used for a full status poll.
    pub const ALL: [Property; 32] = [
        Property::AllInWaterTempHigh,
        Property::AllInWaterTempLow,
        Property::AllOutWaterTempHigh,
        Property::AllOutWaterTempLow,
        Property::OutletWaterTempHigh,
        Property::OutletWaterTempLow,
        Property::WaterBoxTempHigh,
        Property::WaterBoxTempLow,
        Property::RoomTempHigh,
        Property::RoomTempLow,
        Property::WaterBoxElectricHeaterRunStatus,
        Property::SystemAntiFrostRunStatus,
        Property::ElectricHeater1RunStatus,
        Property::ElectricHeater2RunStatus,
        Property::AntiFrostRunStatus,
        Property::Power,
        Property::Mode,
        Property::TemperatureUnit,
        Property::TemperatureRecovery,
        Property::AllError,
        Property::CoolingWaterOutTempSet,
        Property::HeatingWaterOutTempSet,
        Property::WaterBoxTempSet,
        Property::CoolingHomeTempSet,
        Property::HeatingHomeTempSet,
        Property::Host,
        Property::Name,
        Property::ColdHotWater,
        Property::HotHotWater,
        Property::LeftHome,
        Property::TemperatureRecoveryB,
        Property::RoomHomeTempExt,
    ];

    /// The opaque wire code for this property.
    pub fn code(self) -> &'static str {
        match self {
            Property::AllInWaterTempHigh => "AllInWatTemHig",
            Property::AllInWaterTempLow => "AllInWatTemLow",
            Property::AllOutWaterTempHigh => "AllOutWatTemHig",
            Property::AllOutWaterTempLow => "AllOutWatTemLow",
            Property::OutletWaterTempHigh => "HepOutWatTemHig",
            Property::OutletWaterTempLow => "HepOutWatTemLow",
            Property::WaterBoxTempHigh => "WatBoxTemHig",
            Property::WaterBoxTempLow => "WatBoxTemLow",
            Property::RoomTempHigh => "RmoHomTemHi",
            Property::RoomTempLow => "RmoHomTemLo",
            Property::WaterBoxElectricHeaterRunStatus => "WatBoxElcHeRunSta",
            Property::SystemAntiFrostRunStatus => "SyAnFroRunSta",
            Property::ElectricHeater1RunStatus => "ElcHe1RunSta",
            Property::ElectricHeater2RunStatus => "ElcHe2RunSta",
            Property::AntiFrostRunStatus => "AnFrzzRunSta",
            Property::Power => "Pow",
            Property::Mode => "Mod",
            Property::TemperatureUnit => "TemUn",
            Property::TemperatureRecovery => "TemRec",
            Property::AllError => "AllErr",
            Property::CoolingWaterOutTempSet => "CoWatOutTemSet",
            Property::HeatingWaterOutTempSet => "HeWatOutTemSet",
            Property::WaterBoxTempSet => "WatBoxTemSet",
            Property::CoolingHomeTempSet => "CoHomTemSet",
            Property::HeatingHomeTempSet => "HeHomTemSet",
            Property::Host => "host",
            Property::Name => "name",
            Property::ColdHotWater => "ColHtWter",
            Property::HotHotWater => "HetHtWter",
            Property::LeftHome => "LefHom",
            Property::TemperatureRecoveryB => "TemRecB",
            Property::RoomHomeTempExt => "RomHomTemExt",
        }
    }

    /// The enumerated value table for this property, if it has one.
    pub fn value_table(self) -> Option<&'static [(&'static str, i64)]> {
        match self {
            Property::Power => Some(POWER_VALUES),
            Property::Mode => Some(MODE_VALUES),
            Property::TemperatureUnit => Some(TEMPERATURE_UNIT_VALUES),
            Property::TemperatureRecovery | Property::AllError => Some(ON_OFF_VALUES),
            _ => None,
        }
    }
}

/// Value table for [`Property::Power`].
pub const POWER_VALUES: &[(&str, i64)] = &[("off", 0), ("on", 1)];

/// Value table for [`Property::Mode`].
pub const MODE_VALUES: &[(&str, i64)] = &[
    ("cool", 0),
    ("heat", 1),
    ("hotWater", 2),
    ("coolHotWater", 3),
    ("heatHotWater", 4),
];

/// Value table for [`Property::TemperatureUnit`].
pub const TEMPERATURE_UNIT_VALUES: &[(&str, i64)] = &[("celsius", 0), ("fahrenheit", 1)];

/// Generic off/on table shared by the boolean flags.
pub const ON_OFF_VALUES: &[(&str, i64)] = &[("off", 0), ("on", 1)];

// ── Typed value enums ─────────────────────────────────────────────────────────

/// Power switch values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum Power {
    Off = 0,
    On = 1,
}

impl Power {
    pub fn wire_value(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for Power {
    type Error = ();

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Power::Off),
            1 => Ok(Power::On),
            _ => Err(()),
        }
    }
}

/// Operating mode values.
///
/// The combined modes run space conditioning and domestic hot water at once;
/// `HotWater` alone drives neither heating nor cooling of the home circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum OperatingMode {
    Cool = 0,
    Heat = 1,
    HotWater = 2,
    CoolHotWater = 3,
    HeatHotWater = 4,
}

impl OperatingMode {
    pub fn wire_value(self) -> i64 {
        self as i64
    }

    /// `true` when the home circuit is cooling.
    pub fn is_cooling(self) -> bool {
        matches!(self, OperatingMode::Cool | OperatingMode::CoolHotWater)
    }

    /// `true` when the home circuit is heating.
    pub fn is_heating(self) -> bool {
        matches!(self, OperatingMode::Heat | OperatingMode::HeatHotWater)
    }
}

impl TryFrom<i64> for OperatingMode {
    type Error = ();

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OperatingMode::Cool),
            1 => Ok(OperatingMode::Heat),
            2 => Ok(OperatingMode::HotWater),
            3 => Ok(OperatingMode::CoolHotWater),
            4 => Ok(OperatingMode::HeatHotWater),
            _ => Err(()),
        }
    }
}

// ── Catalog operations ────────────────────────────────────────────────────────

/// The full ordered code list for a complete status poll.
pub fn poll_codes() -> Vec<&'static str> {
    Property::ALL.iter().map(|p| p.code()).collect()
}

/// Checks the catalog invariants: every wire code is unique.
///
/// Called once at process start, before any traffic flows.
///
/// # Errors
///
/// Returns [`CatalogError::DuplicateCode`] naming both offending properties.
pub fn validate() -> Result<(), CatalogError> {
    for (index, property) in Property::ALL.iter().enumerate() {
        for earlier in &Property::ALL[..index] {
            if earlier.code() == property.code() {
                return Err(CatalogError::DuplicateCode {
                    code: property.code(),
                    first: *earlier,
                    second: *property,
                });
            }
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
