//! Day offset within a scheduled week.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when building a [`DayOffset`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("day offset must be between 0 and {max} (got {got})", max = DayOffset::MAX)]
pub struct DayOffsetError {
    /// The rejected value.
    pub got: i32,
}

/// Number of days after a schedule's start day (0 = the start day itself).
///
/// A schedule covers one week, so only `0..=6` is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DayOffset(i32);

impl DayOffset {
    /// Largest valid offset.
    pub const MAX: i32 = 6;

    /// Build a day offset, rejecting values outside `0..=6`.
    ///
    /// # Errors
    ///
    /// Returns [`DayOffsetError`] if `value` is out of range.
    pub const fn new(value: i32) -> Result<Self, DayOffsetError> {
        if value < 0 || value > Self::MAX {
            return Err(DayOffsetError { got: value });
        }
        Ok(Self(value))
    }

    /// Get the underlying i32 value.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for DayOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i32> for DayOffset {
    type Error = DayOffsetError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DayOffset> for i32 {
    fn from(offset: DayOffset) -> Self {
        offset.0
    }
}

impl<'de> Deserialize<'de> for DayOffset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i32::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for DayOffset {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i32 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i32 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for DayOffset {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <i32 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(raw)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for DayOffset {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i32 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
