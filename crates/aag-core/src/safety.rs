//! The pure function mapping raw reading inputs plus configured thresholds
//! to cloud/wind/rain conditions and the composite `is_safe` flag.

use serde::{Deserialize, Serialize};

use crate::types::{CloudCondition, RainCondition, WindCondition};

/// Configurable safety thresholds. Defaults match the station's factory
/// recommendation (also the defaults of the original Python driver this
/// was ported from).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cloudy: f64,
    pub very_cloudy: f64,
    pub windy: f64,
    pub very_windy: f64,
    pub gusty: f64,
    pub very_gusty: f64,
    pub wet: i64,
    pub rainy: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            cloudy: -25.0,
            very_cloudy: -15.0,
            windy: 50.0,
            very_windy: 75.0,
            gusty: 100.0,
            very_gusty: 125.0,
            wet: 2200,
            rainy: 1800,
        }
    }
}

/// Which domains' unsafe verdicts are forced to "safe" regardless of the
/// classified condition. Configured via `ignore_unsafe` (subset of
/// `{cloud, wind, rain}`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IgnoreUnsafe {
    pub cloud: bool,
    pub wind: bool,
    pub rain: bool,
}

/// The raw inputs the safety classifier needs from a reading cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyInputs {
    pub sky_temp: Option<f64>,
    pub ambient_temp: Option<f64>,
    pub wind_speed: Option<f64>,
    pub rain_frequency: Option<i64>,
}

/// Result of classifying a single reading cycle against thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyOutcome {
    pub cloud_condition: CloudCondition,
    pub wind_condition: WindCondition,
    pub rain_condition: RainCondition,
    pub cloud_safe: bool,
    pub wind_safe: bool,
    pub rain_safe: bool,
    pub is_safe: bool,
}

fn classify_cloud(sky_temp: Option<f64>, ambient_temp: Option<f64>, t: &Thresholds) -> CloudCondition {
    match (sky_temp, ambient_temp) {
        (Some(sky), Some(ambient)) => {
            let diff = sky - ambient;
            if diff >= t.very_cloudy {
                CloudCondition::VeryCloudy
            } else if diff >= t.cloudy {
                CloudCondition::Cloudy
            } else {
                CloudCondition::Clear
            }
        }
        _ => CloudCondition::Unknown,
    }
}

fn classify_wind(wind_speed: Option<f64>, t: &Thresholds) -> WindCondition {
    match wind_speed {
        None => WindCondition::Unknown,
        Some(w) => {
            if w >= t.very_gusty {
                WindCondition::VeryGusty
            } else if w >= t.gusty {
                WindCondition::Gusty
            } else if w >= t.very_windy {
                WindCondition::VeryWindy
            } else if w >= t.windy {
                WindCondition::Windy
            } else {
                WindCondition::Calm
            }
        }
    }
}

fn classify_rain(rain_frequency: Option<i64>, t: &Thresholds) -> RainCondition {
    match rain_frequency {
        None => RainCondition::Unknown,
        Some(rf) => {
            if rf <= t.rainy {
                RainCondition::Rainy
            } else if rf <= t.wet {
                RainCondition::Wet
            } else {
                RainCondition::Dry
            }
        }
    }
}

/// Classify a reading's raw inputs against thresholds, producing the
/// condition buckets and the composite `is_safe` flag.
pub fn classify(inputs: SafetyInputs, thresholds: &Thresholds, ignore: IgnoreUnsafe) -> SafetyOutcome {
    let cloud_condition = classify_cloud(inputs.sky_temp, inputs.ambient_temp, thresholds);
    let wind_condition = classify_wind(inputs.wind_speed, thresholds);
    let rain_condition = classify_rain(inputs.rain_frequency, thresholds);

    let mut cloud_safe = cloud_condition == CloudCondition::Clear;
    let mut wind_safe = wind_condition == WindCondition::Calm;
    let mut rain_safe = rain_condition == RainCondition::Dry;

    if ignore.cloud {
        cloud_safe = true;
    }
    if ignore.wind {
        wind_safe = true;
    }
    if ignore.rain {
        rain_safe = true;
    }

    let any_unknown = cloud_condition == CloudCondition::Unknown
        || wind_condition == WindCondition::Unknown
        || rain_condition == RainCondition::Unknown;

    let is_safe = if any_unknown {
        false
    } else {
        cloud_safe && wind_safe && rain_safe
    };

    SafetyOutcome {
        cloud_condition,
        wind_condition,
        rain_condition,
        cloud_safe,
        wind_safe,
        rain_safe,
        is_safe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Thresholds {
        Thresholds::default()
    }

    #[test]
    fn clear_calm_dry_is_safe() {
        let inputs = SafetyInputs {
            sky_temp: Some(-20.0),
            ambient_temp: Some(20.0),
            wind_speed: Some(6.0),
            rain_frequency: Some(2600),
        };
        let out = classify(inputs, &defaults(), IgnoreUnsafe::default());
        assert_eq!(out.cloud_condition, CloudCondition::Clear);
        assert_eq!(out.wind_condition, WindCondition::Calm);
        assert_eq!(out.rain_condition, RainCondition::Dry);
        assert!(out.is_safe);
    }

    #[test]
    fn very_cloudy_only_is_unsafe() {
        let inputs = SafetyInputs {
            sky_temp: Some(10.0),
            ambient_temp: Some(20.0),
            wind_speed: Some(6.0),
            rain_frequency: Some(2600),
        };
        let out = classify(inputs, &defaults(), IgnoreUnsafe::default());
        assert_eq!(out.cloud_condition, CloudCondition::VeryCloudy);
        assert!(!out.cloud_safe);
        assert!(!out.is_safe);
    }

    #[test]
    fn gusty_wind_is_unsafe() {
        let inputs = SafetyInputs {
            sky_temp: Some(-20.0),
            ambient_temp: Some(20.0),
            wind_speed: Some(101.0),
            rain_frequency: Some(2600),
        };
        let out = classify(inputs, &defaults(), IgnoreUnsafe::default());
        assert_eq!(out.wind_condition, WindCondition::Gusty);
        assert!(!out.is_safe);
    }

    #[test]
    fn rainy_then_dry_after_threshold_tweak() {
        let mut inputs = SafetyInputs {
            sky_temp: Some(-20.0),
            ambient_temp: Some(20.0),
            wind_speed: Some(6.0),
            rain_frequency: Some(1700),
        };
        let out = classify(inputs, &defaults(), IgnoreUnsafe::default());
        assert_eq!(out.rain_condition, RainCondition::Rainy);
        assert!(!out.is_safe);

        inputs.rain_frequency = Some(2300);
        let out = classify(inputs, &defaults(), IgnoreUnsafe::default());
        assert_eq!(out.rain_condition, RainCondition::Dry);
    }

    #[test]
    fn wind_threshold_boundary_is_more_severe_bucket() {
        let t = defaults();
        let inputs = SafetyInputs {
            sky_temp: None,
            ambient_temp: None,
            wind_speed: Some(t.windy),
            rain_frequency: None,
        };
        let out = classify(inputs, &t, IgnoreUnsafe::default());
        assert_eq!(out.wind_condition, WindCondition::Windy);
    }

    #[test]
    fn rain_threshold_boundaries() {
        let t = defaults();
        let wet_boundary = classify(
            SafetyInputs { rain_frequency: Some(t.wet), ..Default::default() },
            &t,
            IgnoreUnsafe::default(),
        );
        assert_eq!(wet_boundary.rain_condition, RainCondition::Wet);

        let rainy_boundary = classify(
            SafetyInputs { rain_frequency: Some(t.rainy), ..Default::default() },
            &t,
            IgnoreUnsafe::default(),
        );
        assert_eq!(rainy_boundary.rain_condition, RainCondition::Rainy);
    }

    #[test]
    fn missing_inputs_are_unknown_and_unsafe() {
        let out = classify(SafetyInputs::default(), &defaults(), IgnoreUnsafe::default());
        assert_eq!(out.cloud_condition, CloudCondition::Unknown);
        assert_eq!(out.wind_condition, WindCondition::Unknown);
        assert_eq!(out.rain_condition, RainCondition::Unknown);
        assert!(!out.is_safe);
    }

    #[test]
    fn ignore_overrides_force_flag_true_but_unknown_still_wins() {
        let t = defaults();
        let inputs = SafetyInputs {
            sky_temp: None,
            ambient_temp: None,
            wind_speed: Some(6.0),
            rain_frequency: Some(2600),
        };
        let ignore = IgnoreUnsafe { cloud: true, wind: false, rain: false };
        let out = classify(inputs, &t, ignore);
        assert!(out.cloud_safe, "ignored domain's flag should be forced true");
        assert!(!out.is_safe, "an Unknown condition still forces is_safe false");
    }

    #[test]
    fn ignore_lets_otherwise_fully_known_reading_be_safe() {
        let t = defaults();
        let inputs = SafetyInputs {
            sky_temp: Some(10.0),
            ambient_temp: Some(20.0),
            wind_speed: Some(6.0),
            rain_frequency: Some(2600),
        };
        let ignore = IgnoreUnsafe { cloud: true, wind: false, rain: false };
        let out = classify(inputs, &t, ignore);
        assert_eq!(out.cloud_condition, CloudCondition::VeryCloudy);
        assert!(out.cloud_safe);
        assert!(out.is_safe);
    }

    #[test]
    fn wind_monotone_increasing_never_decreases_severity() {
        let t = defaults();
        let speeds = [0.0, 10.0, t.windy, t.very_windy, t.gusty, t.very_gusty, 1000.0];
        let mut last = WindCondition::Unknown;
        for s in speeds {
            let out = classify(
                SafetyInputs { wind_speed: Some(s), ..Default::default() },
                &t,
                IgnoreUnsafe::default(),
            );
            assert!(out.wind_condition >= last);
            last = out.wind_condition;
        }
    }
}
