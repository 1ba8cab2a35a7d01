//! The status store: last-known field values plus derived read views.
//!
//! The snapshot is a plain map from wire code to the last raw value the
//! device reported.  Merging a patch overwrites or inserts per code and
//! never removes anything.  All user-facing readings are *derived views*:
//! pure functions over the current snapshot, recomputed on every read and
//! never cached, so a merge can never leave a stale reading behind.
//!
//! # Split temperature decoding
//!
//! Telemetry temperatures arrive as two integer fields, a `…Hig` and a
//! `…Low` companion, decoding as `high − 100 + low / 100` (integer part
//! offset by 100, fractional hundredths in the low component).  The decode
//! is carried out in integer hundredths so the pre-rounding value is exact.
//!
//! # Rounding rule
//!
//! Views that report whole degrees round half **away from zero** — the same
//! tie-break as `f64::round`.  `45.5` reads as `46`, `-45.5` as `-46`.
//! Rounding happens only at the read boundary; the stored raw snapshot is
//! never mutated by a read.

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::catalog::{OperatingMode, Property};

/// Fallback whole-degree reading for the home circuit when telemetry or a
/// set-point has not arrived yet.
pub const DEFAULT_HOME_TEMPERATURE: i64 = 20;

/// Fallback whole-degree reading for the domestic hot water tank.
pub const DEFAULT_WATER_BOX_TEMPERATURE: i64 = 45;

/// A raw field value as reported by the device: integer or string.
///
/// The wire is JSON, so other shapes are possible in principle; anything
/// that is not an integer or a string is dropped at patch-building time,
/// the same way unknown codes are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    /// Converts a raw JSON value, returning `None` for unsupported shapes.
    pub fn from_json(value: &Value) -> Option<FieldValue> {
        match value {
            Value::Number(n) => n.as_i64().map(FieldValue::Int),
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            _ => None,
        }
    }

    /// The integer content, if this value is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }
}

/// A patch of field values keyed by wire code, ready to merge.
pub type StatusPatch = HashMap<String, FieldValue>;

/// Zips parallel code and value arrays into a patch.
///
/// Codes without a matching value, and values of unsupported shapes, are
/// silently dropped — a partial patch must never fail wholesale.
pub fn zip_patch(cols: &[String], values: &[Value]) -> StatusPatch {
    cols.iter()
        .zip(values.iter())
        .filter_map(|(code, value)| FieldValue::from_json(value).map(|v| (code.clone(), v)))
        .collect()
}

/// The derived heating/cooling state exposed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Off,
    Heat,
    Cool,
}

/// Mutable snapshot of last-known field values for one device.
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    fields: HashMap<String, FieldValue>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `patch` into the snapshot: overwrite or insert per code,
    /// leaving every code absent from the patch untouched.
    pub fn merge(&mut self, patch: StatusPatch) {
        self.fields.extend(patch);
    }

    /// The raw stored value for a wire code.
    pub fn raw(&self, code: &str) -> Option<&FieldValue> {
        self.fields.get(code)
    }

    /// Number of codes currently held.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn int(&self, property: Property) -> Option<i64> {
        self.fields.get(property.code()).and_then(FieldValue::as_int)
    }

    /// Decodes a split High/Low pair into rounded whole degrees.
    fn split(&self, high: Property, low: Property) -> Option<i64> {
        let high = self.int(high)?;
        let low = self.int(low)?;
        Some(round_half_away_from_zero(split_decode_hundredths(high, low)))
    }

    // ── Derived views ─────────────────────────────────────────────────────────

    /// `true` iff the power field reports the `on` enumerator.
    pub fn power(&self) -> bool {
        self.int(Property::Power) == Some(1)
    }

    /// The current operating mode, if reported and recognized.
    pub fn mode(&self) -> Option<OperatingMode> {
        self.int(Property::Mode).and_then(|v| OperatingMode::try_from(v).ok())
    }

    /// The heating/cooling state: OFF whenever power is off, regardless of
    /// mode; otherwise the direction the mode implies, with hot-water-only
    /// reading as OFF.
    pub fn target_heating_cooling_state(&self) -> TargetState {
        if !self.power() {
            return TargetState::Off;
        }
        match self.mode() {
            Some(mode) if mode.is_cooling() => TargetState::Cool,
            Some(mode) if mode.is_heating() => TargetState::Heat,
            _ => TargetState::Off,
        }
    }

    /// The active set-point for the home circuit: the cooling set-point when
    /// the mode implies cooling, the heating set-point when it implies
    /// heating, else [`DEFAULT_HOME_TEMPERATURE`].
    pub fn target_temperature(&self) -> i64 {
        let set_point = match self.mode() {
            Some(mode) if mode.is_cooling() => self.int(Property::CoolingWaterOutTempSet),
            Some(mode) if mode.is_heating() => self.int(Property::HeatingWaterOutTempSet),
            _ => None,
        };
        set_point.unwrap_or(DEFAULT_HOME_TEMPERATURE)
    }

    /// The heat-pump outlet water temperature, split-decoded and rounded;
    /// [`DEFAULT_HOME_TEMPERATURE`] while either component is missing.
    pub fn current_temperature(&self) -> i64 {
        self.split(Property::OutletWaterTempHigh, Property::OutletWaterTempLow)
            .unwrap_or(DEFAULT_HOME_TEMPERATURE)
    }

    /// The hot water tank set-point; [`DEFAULT_WATER_BOX_TEMPERATURE`] when
    /// unset.
    pub fn water_heater_target_temperature(&self) -> i64 {
        self.int(Property::WaterBoxTempSet)
            .unwrap_or(DEFAULT_WATER_BOX_TEMPERATURE)
    }

    /// The hot water tank temperature, split-decoded and rounded;
    /// [`DEFAULT_WATER_BOX_TEMPERATURE`] while either component is missing.
    pub fn water_heater_current_temperature(&self) -> i64 {
        self.split(Property::WaterBoxTempHigh, Property::WaterBoxTempLow)
            .unwrap_or(DEFAULT_WATER_BOX_TEMPERATURE)
    }
}

// ── Split decode arithmetic ───────────────────────────────────────────────────

/// Decodes a split temperature pair into exact integer hundredths of a
/// degree: `(high − 100) · 100 + low`.
pub fn split_decode_hundredths(high: i64, low: i64) -> i64 {
    (high - 100) * 100 + low
}

/// Rounds hundredths of a degree to whole degrees, ties away from zero.
pub fn round_half_away_from_zero(hundredths: i64) -> i64 {
    if hundredths >= 0 {
        (hundredths + 50).div_euclid(100)
    } else {
        -((-hundredths + 50).div_euclid(100))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(pairs: &[(&str, i64)]) -> StatusPatch {
        pairs
            .iter()
            .map(|(code, value)| (code.to_string(), FieldValue::Int(*value)))
            .collect()
    }

    // ── Split decode ──────────────────────────────────────────────────────────

    #[test]
    fn test_split_decode_is_exact_for_all_low_components() {
        // high − 100 + low / 100, computed in hundredths, for every valid low.
        for low in 0..100 {
            let hundredths = split_decode_hundredths(145, low);
            assert_eq!(hundredths, 4500 + low);
        }
    }

    #[test]
    fn test_split_decode_handles_sub_zero_readings() {
        // high = 95 encodes −5 °C.
        assert_eq!(split_decode_hundredths(95, 0), -500);
        assert_eq!(split_decode_hundredths(95, 25), -475);
    }

    #[test]
    fn test_rounding_ties_go_away_from_zero() {
        assert_eq!(round_half_away_from_zero(4550), 46);
        assert_eq!(round_half_away_from_zero(-4550), -46);
        assert_eq!(round_half_away_from_zero(4549), 45);
        assert_eq!(round_half_away_from_zero(4551), 46);
        assert_eq!(round_half_away_from_zero(0), 0);
        assert_eq!(round_half_away_from_zero(-49), 0);
        assert_eq!(round_half_away_from_zero(-50), -1);
    }

    // ── Merge semantics ───────────────────────────────────────────────────────

    #[test]
    fn test_merge_inserts_and_overwrites() {
        let mut store = StatusStore::new();
        store.merge(patch(&[("Pow", 0), ("Mod", 1)]));
        store.merge(patch(&[("Pow", 1)]));

        assert_eq!(store.raw("Pow"), Some(&FieldValue::Int(1)));
        assert_eq!(store.raw("Mod"), Some(&FieldValue::Int(1)), "unrelated code untouched");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let p = patch(&[("Pow", 1), ("WatBoxTemSet", 50)]);

        let mut once = StatusStore::new();
        once.merge(p.clone());

        let mut twice = StatusStore::new();
        twice.merge(p.clone());
        twice.merge(p);

        assert_eq!(once.raw("Pow"), twice.raw("Pow"));
        assert_eq!(once.raw("WatBoxTemSet"), twice.raw("WatBoxTemSet"));
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn test_merge_of_disjoint_patches_is_commutative() {
        let a = patch(&[("Pow", 1), ("Mod", 3)]);
        let b = patch(&[("WatBoxTemSet", 50), ("HeWatOutTemSet", 35)]);

        let mut ab = StatusStore::new();
        ab.merge(a.clone());
        ab.merge(b.clone());

        let mut ba = StatusStore::new();
        ba.merge(b);
        ba.merge(a);

        for code in ["Pow", "Mod", "WatBoxTemSet", "HeWatOutTemSet"] {
            assert_eq!(ab.raw(code), ba.raw(code), "code {code}");
        }
    }

    #[test]
    fn test_merge_never_removes_existing_fields() {
        let mut store = StatusStore::new();
        store.merge(patch(&[("Pow", 1), ("Mod", 1), ("WatBoxTemSet", 50)]));
        store.merge(patch(&[("Mod", 0)]));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_zip_patch_drops_unsupported_value_shapes() {
        let cols = vec!["Pow".to_string(), "name".to_string(), "Mod".to_string()];
        let values = vec![json!(1), json!("living room"), json!([1, 2])];

        let p = zip_patch(&cols, &values);
        assert_eq!(p.get("Pow"), Some(&FieldValue::Int(1)));
        assert_eq!(
            p.get("name"),
            Some(&FieldValue::Text("living room".to_string()))
        );
        assert_eq!(p.get("Mod"), None, "array values are dropped");
    }

    #[test]
    fn test_zip_patch_ignores_trailing_codes_without_values() {
        let cols = vec!["Pow".to_string(), "Mod".to_string()];
        let values = vec![json!(1)];
        let p = zip_patch(&cols, &values);
        assert_eq!(p.len(), 1);
    }

    // ── Derived views ─────────────────────────────────────────────────────────

    #[test]
    fn test_power_view_requires_the_on_enumerator() {
        let mut store = StatusStore::new();
        assert!(!store.power());

        store.merge(patch(&[("Pow", 1)]));
        assert!(store.power());

        store.merge(patch(&[("Pow", 0)]));
        assert!(!store.power());
    }

    #[test]
    fn test_state_is_off_whenever_power_is_off_regardless_of_mode() {
        for mode in 0..5 {
            let mut store = StatusStore::new();
            store.merge(patch(&[("Pow", 0), ("Mod", mode)]));
            assert_eq!(
                store.target_heating_cooling_state(),
                TargetState::Off,
                "mode {mode}"
            );
        }
    }

    #[test]
    fn test_state_follows_mode_direction_when_powered() {
        let cases = [
            (0, TargetState::Cool),
            (1, TargetState::Heat),
            (2, TargetState::Off),
            (3, TargetState::Cool),
            (4, TargetState::Heat),
        ];
        for (mode, expected) in cases {
            let mut store = StatusStore::new();
            store.merge(patch(&[("Pow", 1), ("Mod", mode)]));
            assert_eq!(store.target_heating_cooling_state(), expected, "mode {mode}");
        }
    }

    #[test]
    fn test_state_is_off_for_unknown_mode_value() {
        let mut store = StatusStore::new();
        store.merge(patch(&[("Pow", 1), ("Mod", 9)]));
        assert_eq!(store.target_heating_cooling_state(), TargetState::Off);
    }

    #[test]
    fn test_target_temperature_tracks_the_active_direction() {
        let mut store = StatusStore::new();
        store.merge(patch(&[
            ("Pow", 1),
            ("CoWatOutTemSet", 18),
            ("HeWatOutTemSet", 35),
        ]));

        store.merge(patch(&[("Mod", 0)]));
        assert_eq!(store.target_temperature(), 18, "cooling set-point");

        store.merge(patch(&[("Mod", 4)]));
        assert_eq!(store.target_temperature(), 35, "heating set-point");

        store.merge(patch(&[("Mod", 2)]));
        assert_eq!(
            store.target_temperature(),
            DEFAULT_HOME_TEMPERATURE,
            "hot-water-only falls back to the default"
        );
    }

    #[test]
    fn test_target_temperature_defaults_when_mode_is_missing() {
        let store = StatusStore::new();
        assert_eq!(store.target_temperature(), DEFAULT_HOME_TEMPERATURE);
    }

    #[test]
    fn test_current_temperature_split_decodes_the_outlet_pair() {
        let mut store = StatusStore::new();
        store.merge(patch(&[("HepOutWatTemHig", 135), ("HepOutWatTemLow", 20)]));
        // 135 − 100 + 20/100 = 35.20 → 35
        assert_eq!(store.current_temperature(), 35);
    }

    #[test]
    fn test_current_temperature_defaults_while_either_component_is_missing() {
        let mut store = StatusStore::new();
        assert_eq!(store.current_temperature(), DEFAULT_HOME_TEMPERATURE);

        store.merge(patch(&[("HepOutWatTemHig", 135)]));
        assert_eq!(store.current_temperature(), DEFAULT_HOME_TEMPERATURE);
    }

    #[test]
    fn test_water_heater_current_temperature_pins_the_tie_break() {
        let mut store = StatusStore::new();
        store.merge(patch(&[("WatBoxTemHig", 145), ("WatBoxTemLow", 50)]));
        // 145 − 100 + 50/100 = 45.5 → ties away from zero → 46
        assert_eq!(store.water_heater_current_temperature(), 46);
    }

    #[test]
    fn test_water_heater_views_default_to_45() {
        let store = StatusStore::new();
        assert_eq!(
            store.water_heater_target_temperature(),
            DEFAULT_WATER_BOX_TEMPERATURE
        );
        assert_eq!(
            store.water_heater_current_temperature(),
            DEFAULT_WATER_BOX_TEMPERATURE
        );
    }

    #[test]
    fn test_water_heater_target_reads_the_set_point() {
        let mut store = StatusStore::new();
        store.merge(patch(&[("WatBoxTemSet", 52)]));
        assert_eq!(store.water_heater_target_temperature(), 52);
    }

    #[test]
    fn test_reads_never_mutate_the_raw_snapshot() {
        let mut store = StatusStore::new();
        store.merge(patch(&[("WatBoxTemHig", 145), ("WatBoxTemLow", 50)]));

        let _ = store.water_heater_current_temperature();
        let _ = store.target_heating_cooling_state();

        assert_eq!(store.raw("WatBoxTemHig"), Some(&FieldValue::Int(145)));
        assert_eq!(store.raw("WatBoxTemLow"), Some(&FieldValue::Int(50)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_views_recompute_after_every_merge() {
        let mut store = StatusStore::new();
        store.merge(patch(&[("WatBoxTemHig", 145), ("WatBoxTemLow", 50)]));
        assert_eq!(store.water_heater_current_temperature(), 46);

        store.merge(patch(&[("WatBoxTemLow", 25)]));
        assert_eq!(store.water_heater_current_temperature(), 45);
    }
}
