pub mod prelude {
    pub use super::taskset_serde::prelude::*;
    pub use super::Time;
}

pub mod taskset_serde;

use num::rational::Rational64;

/// Exact rational time.
///
/// All simulation clocks, deadlines and budgets are fractions with a reduced,
/// positive denominator, so arithmetic never loses precision. The float view
/// ([`Time::as_f64`]) exists only for plotting and text output.
#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq, PartialOrd, Ord)]
pub struct Time {
    pub value: Rational64,
}

impl Time {
    pub const ZERO: Time = Time { value: Rational64::new_raw(0, 1) };

    /// Far-future sentinel, comparable against any ordinary time.
    ///
    /// Kept at 2^31 - 1 so that sums and cross-multiplied comparisons with
    /// ordinary times stay well inside the i64 numerator range.
    pub const NEVER: Time = Time { value: Rational64::new_raw(i32::MAX as i64, 1) };

    /// Sentinel below every ordinary time, used as a priority threshold.
    pub const LOWEST: Time = Time { value: Rational64::new_raw(-(i32::MAX as i64), 1) };

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn integer(value: i64) -> Self {
        Self { value: Rational64::from_integer(value) }
    }

    pub fn ratio(num: i64, den: i64) -> Self {
        Self { value: Rational64::new(num, den) }
    }

    pub fn numer(&self) -> i64 {
        *self.value.numer()
    }

    pub fn denom(&self) -> i64 {
        *self.value.denom()
    }

    pub fn is_integer(&self) -> bool {
        self.value.is_integer()
    }

    pub fn floor(&self) -> i64 {
        self.value.floor().to_integer()
    }

    pub fn ceil(&self) -> i64 {
        self.value.ceil().to_integer()
    }

    /// Lossy view for plotting and experiment output.
    pub fn as_f64(&self) -> f64 {
        self.numer() as f64 / self.denom() as f64
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    pub fn max(self, other: Self) -> Self {
        if self >= other { self } else { other }
    }
}

impl From<i64> for Time {
    fn from(value: i64) -> Self {
        Self::integer(value)
    }
}

impl std::ops::Add for Time {
    type Output = Time;

    fn add(self, rhs: Self) -> Self::Output {
        Self::Output { value: self.value + rhs.value }
    }
}

impl std::ops::Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::Output { value: self.value - rhs.value }
    }
}

impl std::ops::Mul for Time {
    type Output = Time;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::Output { value: self.value * rhs.value }
    }
}

impl std::ops::Div for Time {
    type Output = Time;

    fn div(self, rhs: Self) -> Self::Output {
        Self::Output { value: self.value / rhs.value }
    }
}

impl std::ops::Neg for Time {
    type Output = Time;

    fn neg(self) -> Self::Output {
        Self::Output { value: -self.value }
    }
}

impl std::ops::Mul<i64> for Time {
    type Output = Time;

    fn mul(self, rhs: i64) -> Self::Output {
        self * Time::integer(rhs)
    }
}

impl std::ops::Mul<Time> for i64 {
    type Output = Time;

    fn mul(self, rhs: Time) -> Self::Output {
        rhs * self
    }
}

impl std::ops::Div<i64> for Time {
    type Output = Time;

    fn div(self, rhs: i64) -> Self::Output {
        self / Time::integer(rhs)
    }
}

impl std::ops::AddAssign for Time {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::SubAssign for Time {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::iter::Sum for Time {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Time::zero(), |acc, val| acc + val)
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_integer() {
            write!(f, "{}", self.numer())
        } else {
            write!(f, "{}/{}", self.numer(), self.denom())
        }
    }
}

impl std::str::FromStr for Time {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((num, den)) => Ok(Time::ratio(num.trim().parse()?, den.trim().parse()?)),
            None => Ok(Time::integer(s.trim().parse()?)),
        }
    }
}

impl serde::Serialize for Time {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer {
        self.to_string().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Time {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de> {
        let time_string = String::deserialize(deserializer)?;

        time_string.parse()
            .map_err(|err| serde::de::Error::custom(format!("Invalid time: {err}")))
    }
}

// =============================================================================

#[test]
fn fractions_reduce_on_construction() {
    assert_eq!(Time::ratio(6, 4), Time::ratio(3, 2));
    assert_eq!(Time::ratio(-6, -4), Time::ratio(3, 2));
    assert_eq!(Time::ratio(6, -4).numer(), -3);
    assert_eq!(Time::ratio(6, -4).denom(), 2);
}

#[test]
fn floor_and_ceil_of_negative_values() {
    assert_eq!(Time::ratio(-3, 2).floor(), -2);
    assert_eq!(Time::ratio(-3, 2).ceil(), -1);
    assert_eq!(Time::integer(-2).floor(), -2);
    assert_eq!(Time::integer(-2).ceil(), -2);
}

#[test]
fn sentinels_compare_against_ordinary_times() {
    let late = Time::integer(1_000_000);
    assert!(Time::NEVER > late);
    assert!(Time::LOWEST < -late);
    assert!(Time::NEVER > Time::ZERO);
}

#[test]
fn display_and_parse_round_trip() {
    for time in [Time::integer(5), Time::ratio(3, 2), Time::ratio(-7, 3)] {
        let parsed: Time = time.to_string().parse().unwrap();
        assert_eq!(parsed, time);
    }
}
