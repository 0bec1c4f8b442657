//! Conversion between sqlscope values and mysql_async values

use chrono::{Datelike, Timelike};
use mysql_async::Value as MySqlValue;
use mysql_async::consts::ColumnType;
use sqlscope_core::Value;

/// Bind a value as a prepared-statement parameter
pub(crate) fn to_mysql(value: &Value) -> MySqlValue {
    match value {
        Value::Null => MySqlValue::NULL,
        Value::Bool(v) => MySqlValue::Int(i64::from(*v)),
        Value::Int16(v) => MySqlValue::Int(i64::from(*v)),
        Value::Int32(v) => MySqlValue::Int(i64::from(*v)),
        Value::Int64(v) => MySqlValue::Int(*v),
        Value::Float32(v) => MySqlValue::Float(*v),
        Value::Float64(v) => MySqlValue::Double(*v),
        Value::Decimal(v) | Value::String(v) => MySqlValue::Bytes(v.clone().into_bytes()),
        Value::Bytes(v) => MySqlValue::Bytes(v.clone()),
        Value::Uuid(v) => MySqlValue::Bytes(v.to_string().into_bytes()),
        Value::Json(v) => MySqlValue::Bytes(v.to_string().into_bytes()),
        Value::Date(d) => MySqlValue::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        Value::Time(t) => MySqlValue::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1_000,
        ),
        Value::DateTime(dt) => datetime(dt),
        Value::DateTimeUtc(dt) => datetime(&dt.naive_utc()),
    }
}

fn datetime(dt: &chrono::NaiveDateTime) -> MySqlValue {
    MySqlValue::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.nanosecond() / 1_000,
    )
}

/// Convert a result value, using the column type to read text-protocol bytes
pub(crate) fn from_mysql(value: MySqlValue, column_type: ColumnType) -> Value {
    match value {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text_value(text, column_type),
            Err(err) => Value::Bytes(err.into_bytes()),
        },
        MySqlValue::Int(i) => Value::Int64(i),
        MySqlValue::UInt(u) => i64::try_from(u).map_or_else(|_| Value::Decimal(u.to_string()), Value::Int64),
        MySqlValue::Float(f) => Value::Float32(f),
        MySqlValue::Double(d) => Value::Float64(d),
        MySqlValue::Date(year, month, day, hour, minute, second, micros) => {
            let date = chrono::NaiveDate::from_ymd_opt(year.into(), month.into(), day.into());
            match date {
                Some(date) if hour == 0 && minute == 0 && second == 0 && micros == 0 => {
                    Value::Date(date)
                }
                Some(date) => date
                    .and_hms_micro_opt(hour.into(), minute.into(), second.into(), micros)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Null),
                // zero dates such as 0000-00-00
                None => Value::String(format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
                )),
            }
        }
        MySqlValue::Time(negative, days, hours, minutes, seconds, micros) => {
            let hours = days * 24 + u32::from(hours);
            let sign = if negative { "-" } else { "" };
            Value::String(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"))
        }
    }
}

fn text_value(text: String, column_type: ColumnType) -> Value {
    match column_type {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_YEAR => text.parse().map_or(Value::String(text), Value::Int64),
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
            text.parse().map_or(Value::String(text), Value::Float64)
        }
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => Value::Decimal(text),
        ColumnType::MYSQL_TYPE_JSON => {
            serde_json::from_str(&text).map_or(Value::String(text), Value::Json)
        }
        _ => Value::String(text),
    }
}
