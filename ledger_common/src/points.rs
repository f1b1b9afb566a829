use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of `Points` units in one loyalty point. Amounts are kept to two decimal places.
pub const POINTS_SCALE: i64 = 100;

//--------------------------------------       Points        ---------------------------------------------------------
/// A loyalty-point amount, stored as an integer number of hundredths of a point.
///
/// The accrual service reports amounts as JSON numbers (`15.5`). These are converted once, at the edge, with
/// [`Points::try_from_decimal`] and everything downstream works with exact integer arithmetic.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Points(i64);

op!(binary Points, Add, add);
op!(binary Points, Sub, sub);
op!(inplace Points, AddAssign, add_assign);
op!(inplace Points, SubAssign, sub_assign);
op!(unary Points, Neg, neg);

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in points: {0}")]
pub struct PointsConversionError(String);

impl From<i64> for Points {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<f64> for Points {
    type Error = PointsConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::try_from_decimal(value)
    }
}

impl FromStr for Points {
    type Err = PointsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<f64>().map_err(|e| PointsConversionError(format!("{s}: {e}")))?;
        Self::try_from_decimal(value)
    }
}

impl Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = POINTS_SCALE.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / scale, abs % scale)
    }
}

impl Points {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Converts a decimal amount, as reported on the wire, into `Points`, rounding to the nearest hundredth.
    /// Negative, infinite and NaN amounts are rejected.
    pub fn try_from_decimal(value: f64) -> Result<Self, PointsConversionError> {
        if !value.is_finite() {
            return Err(PointsConversionError(format!("{value} is not a finite number")));
        }
        if value < 0.0 {
            return Err(PointsConversionError(format!("{value} is negative")));
        }
        let scaled = (value * POINTS_SCALE as f64).round();
        if scaled >= i64::MAX as f64 {
            return Err(PointsConversionError(format!("{value} is too large")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(scaled as i64))
    }

}
