//! Conversion between sqlscope values and PostgreSQL wire values

use bytes::BytesMut;
use postgres_types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use sqlscope_core::Value;
use std::error::Error;
use tokio_postgres::Row as PgRow;

type BoxError = Box<dyn Error + Sync + Send>;

/// Parameter value matched to the prepared statement's parameter type, so
/// integers are written with the width the server expects
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
}

impl PgValue {
    pub(crate) fn for_type(value: &Value, target: Option<&Type>) -> Self {
        let Some(target) = target else {
            return Self::untyped(value);
        };
        match value {
            Value::Int16(v) => Self::coerce_int(i64::from(*v), target),
            Value::Int32(v) => Self::coerce_int(i64::from(*v), target),
            Value::Int64(v) => Self::coerce_int(*v, target),
            Value::Float32(v) if *target == Type::FLOAT8 => PgValue::Float64(f64::from(*v)),
            Value::Float64(v) if *target == Type::FLOAT4 => PgValue::Float32(*v as f32),
            Value::String(v) => Self::coerce_string(v, target),
            _ => Self::untyped(value),
        }
    }

    fn coerce_int(value: i64, target: &Type) -> Self {
        match *target {
            Type::INT2 => i16::try_from(value).map_or(PgValue::Int64(value), PgValue::Int16),
            Type::INT4 => i32::try_from(value).map_or(PgValue::Int64(value), PgValue::Int32),
            Type::FLOAT4 => PgValue::Float32(value as f32),
            Type::FLOAT8 => PgValue::Float64(value as f64),
            Type::TEXT | Type::VARCHAR | Type::NUMERIC => PgValue::String(value.to_string()),
            _ => PgValue::Int64(value),
        }
    }

    fn coerce_string(value: &str, target: &Type) -> Self {
        let parsed = match *target {
            Type::JSON | Type::JSONB => serde_json::from_str(value).ok().map(PgValue::Json),
            Type::UUID => uuid::Uuid::parse_str(value).ok().map(PgValue::Uuid),
            Type::DATE => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(PgValue::Date),
            Type::TIME => chrono::NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
                .ok()
                .map(PgValue::Time),
            Type::TIMESTAMP => chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(PgValue::DateTime),
            Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|ts| PgValue::DateTimeUtc(ts.with_timezone(&chrono::Utc))),
            Type::INT2 | Type::INT4 | Type::INT8 => value
                .trim()
                .parse::<i64>()
                .ok()
                .map(|v| Self::coerce_int(v, target)),
            Type::BOOL => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(PgValue::Bool(true)),
                "false" | "f" | "0" => Some(PgValue::Bool(false)),
                _ => None,
            },
            _ => None,
        };
        parsed.unwrap_or_else(|| PgValue::String(value.to_string()))
    }

    /// Used when the server did not report a parameter type
    fn untyped(value: &Value) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int16(v) => PgValue::Int16(*v),
            Value::Int32(v) => PgValue::Int32(*v),
            Value::Int64(v) => PgValue::Int64(*v),
            Value::Float32(v) => PgValue::Float32(*v),
            Value::Float64(v) => PgValue::Float64(*v),
            Value::Decimal(v) | Value::String(v) => PgValue::String(v.clone()),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Uuid(v) => PgValue::Uuid(*v),
            Value::Json(v) => PgValue::Json(v.clone()),
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// NUMERIC rendered as exact decimal text
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        decode_numeric(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Raw UTF-8 payload, for enums and other types without a dedicated mapping
struct PgText(String);

impl<'a> FromSql<'a> for PgText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(PgText(String::from_utf8(raw.to_vec())?))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

const NUMERIC_NEGATIVE: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

/// Decode the binary NUMERIC format: digit count, weight, sign and display
/// scale, followed by base-10000 digits
pub(crate) fn decode_numeric(raw: &[u8]) -> Result<String, BoxError> {
    let word = |offset: usize| -> Result<u16, BoxError> {
        raw.get(offset..offset + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated NUMERIC value".into())
    };

    let ndigits = word(0)? as usize;
    let weight = word(2)? as i16 as i32;
    let sign = word(4)?;
    let dscale = word(6)? as usize;
    if sign == NUMERIC_NAN {
        return Ok("NaN".to_string());
    }
    let digits = (0..ndigits)
        .map(|i| word(8 + i * 2))
        .collect::<Result<Vec<u16>, _>>()?;
    let digit_at = |position: i32| -> u16 {
        usize::try_from(position)
            .ok()
            .and_then(|p| digits.get(p).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == NUMERIC_NEGATIVE {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&digit_at(0).to_string());
        for position in 1..=weight {
            text.push_str(&format!("{:04}", digit_at(position)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        for group in 1..=dscale.div_ceil(4) as i32 {
            fraction.push_str(&format!("{:04}", digit_at(weight + group)));
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }
    Ok(text)
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
    match row.try_get::<_, Option<T>>(idx) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(column = idx, error = %err, "could not decode PostgreSQL value");
            None
        }
    }
}

/// Convert one column of a result row; undecodable values become NULL
pub(crate) fn column_value(row: &PgRow, idx: usize) -> Value {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::BOOL => get(row, idx).map(Value::Bool),
        Type::INT2 => get(row, idx).map(Value::Int16),
        Type::INT4 => get(row, idx).map(Value::Int32),
        Type::INT8 => get(row, idx).map(Value::Int64),
        Type::OID => get::<u32>(row, idx).map(|v| Value::Int64(i64::from(v))),
        Type::FLOAT4 => get(row, idx).map(Value::Float32),
        Type::FLOAT8 => get(row, idx).map(Value::Float64),
        Type::NUMERIC => get::<PgNumeric>(row, idx).map(|n| Value::Decimal(n.0)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => get(row, idx).map(Value::String),
        Type::BYTEA => get(row, idx).map(Value::Bytes),
        Type::UUID => get(row, idx).map(Value::Uuid),
        Type::JSON | Type::JSONB => get(row, idx).map(Value::Json),
        Type::DATE => get(row, idx).map(Value::Date),
        Type::TIME => get(row, idx).map(Value::Time),
        Type::TIMESTAMP => get(row, idx).map(Value::DateTime),
        Type::TIMESTAMPTZ => get(row, idx).map(Value::DateTimeUtc),
        _ => get::<PgText>(row, idx).map(|t| Value::String(t.0)),
    };
    value.unwrap_or(Value::Null)
}
