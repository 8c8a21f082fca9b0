//! Tracker settings.
//!
//! Settings arrive as a string-keyed map of typed values, resolved upstream
//! by whatever persistence layer the caller uses. `check_settings_validity`
//! validates the map; `LapSettings::from_settings` turns it into the typed
//! configuration consumed by the tracking stages.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::costs::{CostFunction, CostMethod, FeaturePenalties, IouMethod, OverlapCost};
use crate::tracking::LinkingThreshold;
use crate::{Error, Result};

// ===== Keys =====

pub const KEY_LINKING_MAX_DISTANCE: &str = "LINKING_MAX_DISTANCE";
pub const KEY_LINKING_FEATURE_PENALTIES: &str = "LINKING_FEATURE_PENALTIES";
pub const KEY_COST_METHOD: &str = "COST_METHOD";
pub const KEY_MIN_IOU: &str = "MIN_IOU";
pub const KEY_IOU_CALCULATION: &str = "IOU_CALCULATION";
pub const KEY_SCALE_FACTOR: &str = "SCALE_FACTOR";

pub const KEY_ALLOW_GAP_CLOSING: &str = "ALLOW_GAP_CLOSING";
pub const KEY_GAP_CLOSING_MAX_DISTANCE: &str = "GAP_CLOSING_MAX_DISTANCE";
pub const KEY_GAP_CLOSING_MAX_FRAME_GAP: &str = "MAX_FRAME_GAP";
pub const KEY_GAP_CLOSING_FEATURE_PENALTIES: &str = "GAP_CLOSING_FEATURE_PENALTIES";
pub const KEY_GAP_CLOSING_SCALE_BY_FRAME_GAP: &str = "GAP_CLOSING_SCALE_BY_FRAME_GAP";

pub const KEY_ALLOW_TRACK_SPLITTING: &str = "ALLOW_TRACK_SPLITTING";
pub const KEY_SPLITTING_MAX_DISTANCE: &str = "SPLITTING_MAX_DISTANCE";
pub const KEY_SPLITTING_FEATURE_PENALTIES: &str = "SPLITTING_FEATURE_PENALTIES";

pub const KEY_ALLOW_TRACK_MERGING: &str = "ALLOW_TRACK_MERGING";
pub const KEY_MERGING_MAX_DISTANCE: &str = "MERGING_MAX_DISTANCE";
pub const KEY_MERGING_FEATURE_PENALTIES: &str = "MERGING_FEATURE_PENALTIES";

pub const KEY_ALTERNATIVE_LINKING_COST_FACTOR: &str = "ALTERNATIVE_LINKING_COST_FACTOR";
pub const KEY_CUTOFF_PERCENTILE: &str = "CUTOFF_PERCENTILE";

// ===== Defaults =====

pub const DEFAULT_LINKING_MAX_DISTANCE: f64 = 15.0;
pub const DEFAULT_GAP_CLOSING_MAX_DISTANCE: f64 = 15.0;
pub const DEFAULT_GAP_CLOSING_MAX_FRAME_GAP: i64 = 2;
pub const DEFAULT_SPLITTING_MAX_DISTANCE: f64 = 15.0;
pub const DEFAULT_MERGING_MAX_DISTANCE: f64 = 15.0;
pub const DEFAULT_ALTERNATIVE_LINKING_COST_FACTOR: f64 = 1.05;
pub const DEFAULT_CUTOFF_PERCENTILE: f64 = 0.9;
pub const DEFAULT_MIN_IOU: f64 = 0.3;
pub const DEFAULT_SCALE_FACTOR: f64 = 1.0;

/// Keys every settings map must hold.
const MANDATORY_KEYS: &[&str] = &[
    KEY_LINKING_MAX_DISTANCE,
    KEY_LINKING_FEATURE_PENALTIES,
    KEY_ALLOW_GAP_CLOSING,
    KEY_GAP_CLOSING_MAX_DISTANCE,
    KEY_GAP_CLOSING_MAX_FRAME_GAP,
    KEY_GAP_CLOSING_FEATURE_PENALTIES,
    KEY_ALLOW_TRACK_SPLITTING,
    KEY_SPLITTING_MAX_DISTANCE,
    KEY_SPLITTING_FEATURE_PENALTIES,
    KEY_ALLOW_TRACK_MERGING,
    KEY_MERGING_MAX_DISTANCE,
    KEY_MERGING_FEATURE_PENALTIES,
    KEY_ALTERNATIVE_LINKING_COST_FACTOR,
    KEY_CUTOFF_PERCENTILE,
];

/// Keys that may be omitted.
const OPTIONAL_KEYS: &[&str] = &[
    KEY_COST_METHOD,
    KEY_MIN_IOU,
    KEY_IOU_CALCULATION,
    KEY_SCALE_FACTOR,
    KEY_GAP_CLOSING_SCALE_BY_FRAME_GAP,
];

/// A typed setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    FeatureMap(BTreeMap<String, f64>),
}

impl SettingValue {
    fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "boolean",
            SettingValue::Integer(_) => "integer",
            SettingValue::Double(_) => "double",
            SettingValue::Text(_) => "text",
            SettingValue::FeatureMap(_) => "feature map",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(v) => write!(f, "{}", v),
            SettingValue::Integer(v) => write!(f, "{}", v),
            SettingValue::Double(v) => write!(f, "{}", v),
            SettingValue::Text(v) => write!(f, "{}", v),
            SettingValue::FeatureMap(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Integer(v)
    }
}

impl From<i32> for SettingValue {
    fn from(v: i32) -> Self {
        SettingValue::Integer(v as i64)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Double(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::Text(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::Text(v)
    }
}

impl From<BTreeMap<String, f64>> for SettingValue {
    fn from(v: BTreeMap<String, f64>) -> Self {
        SettingValue::FeatureMap(v)
    }
}

/// String-keyed settings map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, SettingValue>);

impl Settings {
    /// Create an empty settings map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default settings for LAP tracking.
    ///
    /// Frame-to-frame linking by squared distance up to 15, gap closing over
    /// at most 2 frames, splitting and merging disabled.
    pub fn default_lap() -> Self {
        let mut s = Self::new();
        s.insert(KEY_LINKING_MAX_DISTANCE, DEFAULT_LINKING_MAX_DISTANCE);
        s.insert(KEY_LINKING_FEATURE_PENALTIES, FeaturePenalties::new());
        s.insert(KEY_ALLOW_GAP_CLOSING, true);
        s.insert(KEY_GAP_CLOSING_MAX_DISTANCE, DEFAULT_GAP_CLOSING_MAX_DISTANCE);
        s.insert(KEY_GAP_CLOSING_MAX_FRAME_GAP, DEFAULT_GAP_CLOSING_MAX_FRAME_GAP);
        s.insert(KEY_GAP_CLOSING_FEATURE_PENALTIES, FeaturePenalties::new());
        s.insert(KEY_ALLOW_TRACK_SPLITTING, false);
        s.insert(KEY_SPLITTING_MAX_DISTANCE, DEFAULT_SPLITTING_MAX_DISTANCE);
        s.insert(KEY_SPLITTING_FEATURE_PENALTIES, FeaturePenalties::new());
        s.insert(KEY_ALLOW_TRACK_MERGING, false);
        s.insert(KEY_MERGING_MAX_DISTANCE, DEFAULT_MERGING_MAX_DISTANCE);
        s.insert(KEY_MERGING_FEATURE_PENALTIES, FeaturePenalties::new());
        s.insert(KEY_ALTERNATIVE_LINKING_COST_FACTOR, DEFAULT_ALTERNATIVE_LINKING_COST_FACTOR);
        s.insert(KEY_CUTOFF_PERCENTILE, DEFAULT_CUTOFF_PERCENTILE);
        s
    }

    /// Set a value, returning the previous one.
    pub fn insert(&mut self, key: &str, value: impl Into<SettingValue>) -> Option<SettingValue> {
        self.0.insert(key.to_string(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn mistyped(key: &str, expected: &str, value: &SettingValue) -> Error {
        Error::InvalidSettings(format!(
            "value for {} should be {}, got {} ({})",
            key,
            expected,
            value.type_name(),
            value
        ))
    }

    fn missing(key: &str) -> Error {
        Error::InvalidSettings(format!("missing mandatory key {}", key))
    }

    /// Read a boolean.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            Some(SettingValue::Bool(v)) => Ok(*v),
            Some(other) => Err(Self::mistyped(key, "a boolean", other)),
            None => Err(Self::missing(key)),
        }
    }

    /// Read an integer.
    pub fn get_integer(&self, key: &str) -> Result<i64> {
        match self.get(key) {
            Some(SettingValue::Integer(v)) => Ok(*v),
            Some(other) => Err(Self::mistyped(key, "an integer", other)),
            None => Err(Self::missing(key)),
        }
    }

    /// Read a double. Integers are widened.
    pub fn get_double(&self, key: &str) -> Result<f64> {
        match self.get(key) {
            Some(SettingValue::Double(v)) => Ok(*v),
            Some(SettingValue::Integer(v)) => Ok(*v as f64),
            Some(other) => Err(Self::mistyped(key, "a double", other)),
            None => Err(Self::missing(key)),
        }
    }

    /// Read a text value.
    pub fn get_text(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(SettingValue::Text(v)) => Ok(v),
            Some(other) => Err(Self::mistyped(key, "a text", other)),
            None => Err(Self::missing(key)),
        }
    }

    /// Read a feature penalty map.
    pub fn get_feature_map(&self, key: &str) -> Result<&BTreeMap<String, f64>> {
        match self.get(key) {
            Some(SettingValue::FeatureMap(v)) => Ok(v),
            Some(other) => Err(Self::mistyped(key, "a feature map", other)),
            None => Err(Self::missing(key)),
        }
    }

    fn get_or<T>(&self, key: &str, default: T, read: impl Fn(&Self, &str) -> Result<T>) -> Result<T> {
        if self.contains_key(key) {
            read(self, key)
        } else {
            Ok(default)
        }
    }
}

impl FromIterator<(String, SettingValue)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        Settings(iter.into_iter().collect())
    }
}

/// Validate a settings map.
///
/// Checks that mandatory keys are present, that no unknown key is present,
/// that values have the right type, and that numbers lie in their ranges.
///
/// # Errors
/// `Error::InvalidSettings` listing every problem found, one per line.
pub fn check_settings_validity(settings: &Settings) -> Result<()> {
    let mut problems: Vec<String> = Vec::new();
    let mut check = |result: Result<()>| {
        if let Err(Error::InvalidSettings(msg)) = result {
            problems.push(msg);
        } else if let Err(e) = result {
            problems.push(e.to_string());
        }
    };

    for key in MANDATORY_KEYS {
        if !settings.contains_key(key) {
            check(Err(Settings::missing(key)));
        }
    }
    for (key, _) in settings.iter() {
        if !MANDATORY_KEYS.contains(&key) && !OPTIONAL_KEYS.contains(&key) {
            check(Err(Error::InvalidSettings(format!("unknown key {}", key))));
        }
    }

    for key in [
        KEY_LINKING_MAX_DISTANCE,
        KEY_GAP_CLOSING_MAX_DISTANCE,
        KEY_SPLITTING_MAX_DISTANCE,
        KEY_MERGING_MAX_DISTANCE,
        KEY_ALTERNATIVE_LINKING_COST_FACTOR,
    ] {
        if settings.contains_key(key) {
            check(settings.get_double(key).and_then(|v| positive(key, v)));
        }
    }
    if settings.contains_key(KEY_CUTOFF_PERCENTILE) {
        check(settings.get_double(KEY_CUTOFF_PERCENTILE).and_then(|v| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(Error::InvalidSettings(format!("{} must be in (0, 1], got {}", KEY_CUTOFF_PERCENTILE, v)))
            }
        }));
    }
    if settings.contains_key(KEY_GAP_CLOSING_MAX_FRAME_GAP) {
        check(settings.get_integer(KEY_GAP_CLOSING_MAX_FRAME_GAP).and_then(|v| {
            if v >= 1 && v <= i32::MAX as i64 {
                Ok(())
            } else {
                Err(Error::InvalidSettings(format!(
                    "{} must be at least 1, got {}",
                    KEY_GAP_CLOSING_MAX_FRAME_GAP, v
                )))
            }
        }));
    }
    for key in [KEY_ALLOW_GAP_CLOSING, KEY_ALLOW_TRACK_SPLITTING, KEY_ALLOW_TRACK_MERGING] {
        if settings.contains_key(key) {
            check(settings.get_bool(key).map(|_| ()));
        }
    }
    if settings.contains_key(KEY_GAP_CLOSING_SCALE_BY_FRAME_GAP) {
        check(settings.get_bool(KEY_GAP_CLOSING_SCALE_BY_FRAME_GAP).map(|_| ()));
    }
    for key in [
        KEY_LINKING_FEATURE_PENALTIES,
        KEY_GAP_CLOSING_FEATURE_PENALTIES,
        KEY_SPLITTING_FEATURE_PENALTIES,
        KEY_MERGING_FEATURE_PENALTIES,
    ] {
        if settings.contains_key(key) {
            check(settings.get_feature_map(key).and_then(|map| feature_weights(key, map)));
        }
    }

    let method = settings.get_or(KEY_COST_METHOD, CostMethod::Distance, |s, k| s.get_text(k)?.parse());
    check(method.as_ref().map(|_| ()).map_err(Clone::clone));
    if let Ok(CostMethod::Overlap) = method {
        if !settings.contains_key(KEY_MIN_IOU) {
            check(Err(Error::InvalidSettings(format!(
                "missing key {}, mandatory with {} = {}",
                KEY_MIN_IOU,
                KEY_COST_METHOD,
                CostMethod::Overlap.as_str()
            ))));
        }
    }
    if settings.contains_key(KEY_MIN_IOU) {
        check(settings.get_double(KEY_MIN_IOU).and_then(|v| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(Error::InvalidSettings(format!("{} must be in (0, 1], got {}", KEY_MIN_IOU, v)))
            }
        }));
    }
    if settings.contains_key(KEY_IOU_CALCULATION) {
        check(settings.get_text(KEY_IOU_CALCULATION).and_then(|v| v.parse::<IouMethod>()).map(|_| ()));
    }
    if settings.contains_key(KEY_SCALE_FACTOR) {
        check(settings.get_double(KEY_SCALE_FACTOR).and_then(|v| positive(KEY_SCALE_FACTOR, v)));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidSettings(problems.join("\n")))
    }
}

fn positive(key: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidSettings(format!("{} must be strictly positive, got {}", key, value)))
    }
}

fn feature_weights(key: &str, map: &BTreeMap<String, f64>) -> Result<()> {
    match map.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
        Some((feature, w)) => Err(Error::InvalidSettings(format!(
            "{}: weight for {} must be finite and non-negative, got {}",
            key, feature, w
        ))),
        None => Ok(()),
    }
}

/// Frame-to-frame linking configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkingSettings {
    /// Cost family.
    pub method: CostMethod,
    /// Maximum linking distance, for distance costs.
    pub max_distance: f64,
    /// Minimum IoU, for overlap costs.
    pub min_iou: f64,
    /// Overlap parameters, for overlap costs.
    pub overlap: OverlapCost,
    /// Feature penalties applied to the base cost.
    pub feature_penalties: FeaturePenalties,
    /// Factor applied to the largest candidate cost to get the alternative cost.
    pub alternative_cost_factor: f64,
}

impl Default for LinkingSettings {
    fn default() -> Self {
        Self {
            method: CostMethod::Distance,
            max_distance: DEFAULT_LINKING_MAX_DISTANCE,
            min_iou: DEFAULT_MIN_IOU,
            overlap: OverlapCost::default(),
            feature_penalties: FeaturePenalties::new(),
            alternative_cost_factor: DEFAULT_ALTERNATIVE_LINKING_COST_FACTOR,
        }
    }
}

impl LinkingSettings {
    /// Cost function selected by these settings.
    pub fn cost_function(&self) -> CostFunction {
        match self.method {
            CostMethod::Distance => CostFunction::distance(&self.feature_penalties),
            CostMethod::Overlap => CostFunction::overlap(self.overlap, &self.feature_penalties),
        }
    }

    /// Admissibility threshold selected by these settings.
    pub fn threshold(&self) -> LinkingThreshold {
        match self.method {
            CostMethod::Distance => LinkingThreshold::MaxDistance(self.max_distance),
            CostMethod::Overlap => LinkingThreshold::MinOverlap(self.min_iou),
        }
    }
}

/// Segment-level (gap closing, splitting, merging) configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSettings {
    pub allow_gap_closing: bool,
    pub gap_closing_max_distance: f64,
    /// Largest frame difference bridged by gap closing.
    pub max_frame_gap: i32,
    pub gap_closing_feature_penalties: FeaturePenalties,
    /// Divide gap-closing costs by the frame difference.
    pub gap_closing_scale_by_frame_gap: bool,

    pub allow_splitting: bool,
    pub splitting_max_distance: f64,
    pub splitting_feature_penalties: FeaturePenalties,

    pub allow_merging: bool,
    pub merging_max_distance: f64,
    pub merging_feature_penalties: FeaturePenalties,

    pub alternative_cost_factor: f64,
    /// Percentile of candidate costs used for the alternative cost.
    pub cutoff_percentile: f64,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            allow_gap_closing: true,
            gap_closing_max_distance: DEFAULT_GAP_CLOSING_MAX_DISTANCE,
            max_frame_gap: DEFAULT_GAP_CLOSING_MAX_FRAME_GAP as i32,
            gap_closing_feature_penalties: FeaturePenalties::new(),
            gap_closing_scale_by_frame_gap: false,
            allow_splitting: false,
            splitting_max_distance: DEFAULT_SPLITTING_MAX_DISTANCE,
            splitting_feature_penalties: FeaturePenalties::new(),
            allow_merging: false,
            merging_max_distance: DEFAULT_MERGING_MAX_DISTANCE,
            merging_feature_penalties: FeaturePenalties::new(),
            alternative_cost_factor: DEFAULT_ALTERNATIVE_LINKING_COST_FACTOR,
            cutoff_percentile: DEFAULT_CUTOFF_PERCENTILE,
        }
    }
}

impl SegmentSettings {
    /// Whether any segment-level event is enabled.
    pub fn any_enabled(&self) -> bool {
        self.allow_gap_closing || self.allow_splitting || self.allow_merging
    }
}

/// Typed view of a validated settings map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LapSettings {
    pub linking: LinkingSettings,
    pub segments: SegmentSettings,
}

impl LapSettings {
    /// Validate and resolve a settings map.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        check_settings_validity(settings)?;

        let method = settings.get_or(KEY_COST_METHOD, CostMethod::Distance, |s, k| s.get_text(k)?.parse())?;
        let iou_method = settings.get_or(KEY_IOU_CALCULATION, IouMethod::Precise, |s, k| s.get_text(k)?.parse())?;
        let scale = settings.get_or(KEY_SCALE_FACTOR, DEFAULT_SCALE_FACTOR, Settings::get_double)?;
        let factor = settings.get_double(KEY_ALTERNATIVE_LINKING_COST_FACTOR)?;

        let linking = LinkingSettings {
            method,
            max_distance: settings.get_double(KEY_LINKING_MAX_DISTANCE)?,
            min_iou: settings.get_or(KEY_MIN_IOU, DEFAULT_MIN_IOU, Settings::get_double)?,
            overlap: OverlapCost::new(iou_method, scale),
            feature_penalties: settings.get_feature_map(KEY_LINKING_FEATURE_PENALTIES)?.clone(),
            alternative_cost_factor: factor,
        };

        let segments = SegmentSettings {
            allow_gap_closing: settings.get_bool(KEY_ALLOW_GAP_CLOSING)?,
            gap_closing_max_distance: settings.get_double(KEY_GAP_CLOSING_MAX_DISTANCE)?,
            max_frame_gap: settings.get_integer(KEY_GAP_CLOSING_MAX_FRAME_GAP)? as i32,
            gap_closing_feature_penalties: settings.get_feature_map(KEY_GAP_CLOSING_FEATURE_PENALTIES)?.clone(),
            gap_closing_scale_by_frame_gap: settings.get_or(
                KEY_GAP_CLOSING_SCALE_BY_FRAME_GAP,
                false,
                Settings::get_bool,
            )?,
            allow_splitting: settings.get_bool(KEY_ALLOW_TRACK_SPLITTING)?,
            splitting_max_distance: settings.get_double(KEY_SPLITTING_MAX_DISTANCE)?,
            splitting_feature_penalties: settings.get_feature_map(KEY_SPLITTING_FEATURE_PENALTIES)?.clone(),
            allow_merging: settings.get_bool(KEY_ALLOW_TRACK_MERGING)?,
            merging_max_distance: settings.get_double(KEY_MERGING_MAX_DISTANCE)?,
            merging_feature_penalties: settings.get_feature_map(KEY_MERGING_FEATURE_PENALTIES)?.clone(),
            alternative_cost_factor: factor,
            cutoff_percentile: settings.get_double(KEY_CUTOFF_PERCENTILE)?,
        };

        Ok(Self { linking, segments })
    }
}
