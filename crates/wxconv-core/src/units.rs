//! Unit conversion for weather measurements
//!
//! Every unit belongs to exactly one [`Category`] and converts through that
//! category's base unit (m/s, K, mm, hPa). How a unit reaches the base is
//! described by its [`Scale`], so linear, affine and empirical units share
//! the same two-hop path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Kelvin at 0 °C
const ZERO_CELSIUS_K: f64 = 273.15;

/// Water freezes at 32 °F
const FREEZING_FAHRENHEIT: f64 = 32.0;

/// Standard atmosphere in hPa; also exactly 760 mmHg
const ATM_HPA: f64 = 1013.25;
const MMHG_PER_ATM: f64 = 760.0;

/// Coefficient of the empirical Beaufort curve `v = 0.836 * B^(3/2)` (m/s)
const BEAUFORT_COEFF: f64 = 0.836;

/// Top of the traditional whole-number Beaufort scale
const BEAUFORT_MAX_FORCE: f64 = 12.0;

/// Unit conversion error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitError {
    #[error(
        "Unsupported conversion from '{from}' to '{to}', valid targets: {}",
        .valid_targets.join(", ")
    )]
    UnsupportedConversion {
        from: String,
        to: String,
        valid_targets: Vec<String>,
    },

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),
}

pub type UnitResult<T> = Result<T, UnitError>;

impl UnitError {
    fn unsupported<'a>(from: &str, to: &str, targets: impl IntoIterator<Item = &'a Unit>) -> Self {
        UnitError::UnsupportedConversion {
            from: from.to_string(),
            to: to.to_string(),
            valid_targets: targets.into_iter().map(|u| u.symbol().to_string()).collect(),
        }
    }
}

/// Group of mutually convertible units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Speed,
    Temperature,
    /// Precipitation amounts and distances
    Precipitation,
    Pressure,
}

const SPEED_UNITS: [Unit; 5] = [
    Unit::KilometersPerHour,
    Unit::MilesPerHour,
    Unit::MetersPerSecond,
    Unit::Beaufort,
    Unit::Knots,
];

const TEMPERATURE_UNITS: [Unit; 3] = [Unit::Kelvin, Unit::Fahrenheit, Unit::Celsius];

const PRECIPITATION_UNITS: [Unit; 5] = [
    Unit::Millimeters,
    Unit::Inches,
    Unit::Meters,
    Unit::Kilometers,
    Unit::Miles,
];

const PRESSURE_UNITS: [Unit; 5] = [
    Unit::Atmospheres,
    Unit::Millibars,
    Unit::MillimetersOfMercury,
    Unit::Kilopascals,
    Unit::Hectopascals,
];

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Speed,
        Category::Temperature,
        Category::Precipitation,
        Category::Pressure,
    ];

    /// Units of this category, in declaration order
    pub fn units(self) -> &'static [Unit] {
        match self {
            Category::Speed => &SPEED_UNITS,
            Category::Temperature => &TEMPERATURE_UNITS,
            Category::Precipitation => &PRECIPITATION_UNITS,
            Category::Pressure => &PRESSURE_UNITS,
        }
    }

    /// The pivot every conversion in this category passes through
    pub fn base_unit(self) -> Unit {
        match self {
            Category::Speed => Unit::MetersPerSecond,
            Category::Temperature => Unit::Kelvin,
            Category::Precipitation => Unit::Millimeters,
            Category::Pressure => Unit::Hectopascals,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Speed => "speed",
            Category::Temperature => "temperature",
            Category::Precipitation => "precipitation",
            Category::Pressure => "pressure",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A supported measurement unit, serialized as its symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "km/h")]
    KilometersPerHour,
    #[serde(rename = "mph")]
    MilesPerHour,
    #[serde(rename = "m/s")]
    MetersPerSecond,
    #[serde(rename = "Bft")]
    Beaufort,
    #[serde(rename = "kt")]
    Knots,
    #[serde(rename = "K")]
    Kelvin,
    #[serde(rename = "F")]
    Fahrenheit,
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "mm")]
    Millimeters,
    #[serde(rename = "in")]
    Inches,
    #[serde(rename = "m")]
    Meters,
    #[serde(rename = "km")]
    Kilometers,
    #[serde(rename = "mi")]
    Miles,
    #[serde(rename = "atm")]
    Atmospheres,
    #[serde(rename = "mbar")]
    Millibars,
    #[serde(rename = "mmHg")]
    MillimetersOfMercury,
    #[serde(rename = "kPa")]
    Kilopascals,
    #[serde(rename = "hPa")]
    Hectopascals,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::KilometersPerHour => "km/h",
            Unit::MilesPerHour => "mph",
            Unit::MetersPerSecond => "m/s",
            Unit::Beaufort => "Bft",
            Unit::Knots => "kt",
            Unit::Kelvin => "K",
            Unit::Fahrenheit => "F",
            Unit::Celsius => "C",
            Unit::Millimeters => "mm",
            Unit::Inches => "in",
            Unit::Meters => "m",
            Unit::Kilometers => "km",
            Unit::Miles => "mi",
            Unit::Atmospheres => "atm",
            Unit::Millibars => "mbar",
            Unit::MillimetersOfMercury => "mmHg",
            Unit::Kilopascals => "kPa",
            Unit::Hectopascals => "hPa",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Unit::KilometersPerHour
            | Unit::MilesPerHour
            | Unit::MetersPerSecond
            | Unit::Beaufort
            | Unit::Knots => Category::Speed,
            Unit::Kelvin | Unit::Fahrenheit | Unit::Celsius => Category::Temperature,
            Unit::Millimeters | Unit::Inches | Unit::Meters | Unit::Kilometers | Unit::Miles => {
                Category::Precipitation
            }
            Unit::Atmospheres
            | Unit::Millibars
            | Unit::MillimetersOfMercury
            | Unit::Kilopascals
            | Unit::Hectopascals => Category::Pressure,
        }
    }

    /// How this unit maps onto its category's base unit
    pub fn scale(self) -> Scale {
        match self {
            // speed, base m/s
            Unit::MetersPerSecond => Scale::Linear(1.0),
            Unit::KilometersPerHour => Scale::Linear(1000.0 / 3600.0),
            Unit::MilesPerHour => Scale::Linear(1609.344 / 3600.0),
            Unit::Knots => Scale::Linear(1852.0 / 3600.0),
            Unit::Beaufort => Scale::Empirical {
                to_base: beaufort_to_mps,
                from_base: mps_to_beaufort,
            },
            // temperature, base K
            Unit::Kelvin => Scale::Affine {
                origin: 0.0,
                ratio: (1.0, 1.0),
                base_at_origin: 0.0,
            },
            Unit::Celsius => Scale::Affine {
                origin: 0.0,
                ratio: (1.0, 1.0),
                base_at_origin: ZERO_CELSIUS_K,
            },
            Unit::Fahrenheit => Scale::Affine {
                origin: FREEZING_FAHRENHEIT,
                ratio: (5.0, 9.0),
                base_at_origin: ZERO_CELSIUS_K,
            },
            // precipitation and distance, base mm
            Unit::Millimeters => Scale::Linear(1.0),
            Unit::Inches => Scale::Linear(25.4),
            Unit::Meters => Scale::Linear(1_000.0),
            Unit::Kilometers => Scale::Linear(1_000_000.0),
            Unit::Miles => Scale::Linear(1_609_344.0),
            // pressure, base hPa
            Unit::Hectopascals | Unit::Millibars => Scale::Linear(1.0),
            Unit::Kilopascals => Scale::Linear(10.0),
            Unit::Atmospheres => Scale::Linear(ATM_HPA),
            Unit::MillimetersOfMercury => Scale::Linear(ATM_HPA / MMHG_PER_ATM),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all_units()
            .find(|u| u.symbol() == s)
            .ok_or_else(|| UnitError::UnknownUnit(s.to_string()))
    }
}

/// Conversion strategy between a unit and its category's base unit
#[derive(Debug, Clone, Copy)]
pub enum Scale {
    /// `base = value * factor`
    Linear(f64),
    /// `base = (value - origin) * num / den + base_at_origin`
    ///
    /// The ratio stays a fraction so exact pairs such as 0 °C = 32 °F come
    /// back exact.
    Affine {
        origin: f64,
        ratio: (f64, f64),
        base_at_origin: f64,
    },
    /// Fitted curve with an explicit inverse
    Empirical {
        to_base: fn(f64) -> f64,
        from_base: fn(f64) -> f64,
    },
}

impl Scale {
    pub fn to_base(&self, value: f64) -> f64 {
        match *self {
            Scale::Linear(factor) => value * factor,
            Scale::Affine {
                origin,
                ratio: (num, den),
                base_at_origin,
            } => (value - origin) * num / den + base_at_origin,
            Scale::Empirical { to_base, .. } => to_base(value),
        }
    }

    pub fn from_base(&self, base: f64) -> f64 {
        match *self {
            Scale::Linear(factor) => base / factor,
            Scale::Affine {
                origin,
                ratio: (num, den),
                base_at_origin,
            } => (base - base_at_origin) * den / num + origin,
            Scale::Empirical { from_base, .. } => from_base(base),
        }
    }
}

// The Beaufort curve is mirrored for negative inputs so signed values never
// produce NaN.

fn beaufort_to_mps(force: f64) -> f64 {
    (BEAUFORT_COEFF * force.abs().powf(1.5)).copysign(force)
}

fn mps_to_beaufort(mps: f64) -> f64 {
    (mps.abs() / BEAUFORT_COEFF).powf(2.0 / 3.0).copysign(mps)
}

/// Whole-number Beaufort force for a wind speed in m/s, clamped to 0..=12
///
/// [`convert`] returns the continuous value; this is the rounded scale step
/// used for display.
pub fn beaufort_force(mps: f64) -> u8 {
    // NaN saturates to 0 in the cast
    mps_to_beaufort(mps).round().clamp(0.0, BEAUFORT_MAX_FORCE) as u8
}

/// Every supported unit, grouped by category
pub fn all_units() -> impl Iterator<Item = Unit> {
    Category::ALL
        .into_iter()
        .flat_map(|c| c.units().iter().copied())
}

/// Symbols `from` may be converted to
///
/// For an unknown `from` this is every known symbol.
pub fn valid_targets(from: &str) -> Vec<&'static str> {
    match from.parse::<Unit>() {
        Ok(unit) => unit.category().units().iter().map(|u| u.symbol()).collect(),
        Err(_) => all_units().map(Unit::symbol).collect(),
    }
}

/// Convert `value` between two unit symbols
pub fn convert(from: &str, to: &str, value: f64) -> UnitResult<f64> {
    let Ok(from_unit) = from.parse::<Unit>() else {
        debug!(from, to, "unknown source unit");
        let known: Vec<Unit> = all_units().collect();
        return Err(UnitError::unsupported(from, to, &known));
    };

    if from == to {
        return Ok(value);
    }

    match to.parse::<Unit>() {
        Ok(to_unit) => convert_units(from_unit, to_unit, value),
        Err(_) => {
            debug!(from, to, "unknown target unit");
            Err(UnitError::unsupported(
                from,
                to,
                from_unit.category().units(),
            ))
        }
    }
}

/// Convert `value` between two typed units of the same category
pub fn convert_units(from: Unit, to: Unit, value: f64) -> UnitResult<f64> {
    if from == to {
        return Ok(value);
    }

    if from.category() != to.category() {
        debug!(from = %from, to = %to, "cross-category conversion");
        return Err(UnitError::unsupported(
            from.symbol(),
            to.symbol(),
            from.category().units(),
        ));
    }

    Ok(to.scale().from_base(from.scale().to_base(value)))
}
