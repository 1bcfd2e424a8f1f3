//! `Date`, backed by chrono. Time values are milliseconds since the epoch
//! with `NaN` for an invalid date; local fields use the host time zone.
//! `Date.now()` reads the interpreter's virtual clock.

use chrono::{
    DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{arg, constructor, method, Facility};
use crate::script::error::Flow;
use crate::script::interpreter::Interpreter;
use crate::script::ops::Hint;
use crate::script::value::*;

const MS_PER_DAY: f64 = 86_400_000.0;
const MAX_TIME: f64 = 8.64e15;

// ─── Time arithmetic ──────────────────────────────────────────────────────────

/// Year, month (0-based), day, hours, minutes, seconds, milliseconds.
type Fields = [f64; 7];

fn time_clip(t: f64) -> f64 {
    if !t.is_finite() || t.abs() > MAX_TIME {
        f64::NAN
    } else {
        t.trunc() + 0.0
    }
}

fn utc_datetime(t: f64) -> Option<DateTime<Utc>> {
    if t.is_nan() {
        return None;
    }
    Utc.timestamp_millis_opt(t as i64).single()
}

fn local_datetime(t: f64) -> Option<DateTime<Local>> {
    if t.is_nan() {
        return None;
    }
    Local.timestamp_millis_opt(t as i64).single()
}

fn fields_of<Tz: TimeZone>(dt: &DateTime<Tz>) -> Fields {
    [
        dt.year() as f64,
        dt.month0() as f64,
        dt.day() as f64,
        dt.hour() as f64,
        dt.minute() as f64,
        dt.second() as f64,
        dt.timestamp_subsec_millis() as f64,
    ]
}

fn fields(t: f64, local: bool) -> Option<Fields> {
    if local {
        local_datetime(t).map(|dt| fields_of(&dt))
    } else {
        utc_datetime(t).map(|dt| fields_of(&dt))
    }
}

/// Days since the epoch for the first of a possibly out-of-range month.
fn make_day(year: f64, month: f64, date: f64) -> Option<f64> {
    if !(year.is_finite() && month.is_finite() && date.is_finite()) {
        return None;
    }
    let year = year.trunc() + (month.trunc() / 12.0).floor();
    let month = month.trunc().rem_euclid(12.0);
    if year.abs() > 400_000.0 {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year as i32, month as u32 + 1, 1)?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    Some(first.signed_duration_since(epoch).num_days() as f64 + date.trunc() - 1.0)
}

/// Milliseconds for `fields` read as UTC, overflow carried between fields.
fn make_time(f: &Fields) -> f64 {
    if f.iter().any(|x| !x.is_finite()) {
        return f64::NAN;
    }
    let Some(day) = make_day(f[0], f[1], f[2]) else {
        return f64::NAN;
    };
    day * MS_PER_DAY
        + f[3].trunc() * 3_600_000.0
        + f[4].trunc() * 60_000.0
        + f[5].trunc() * 1000.0
        + f[6].trunc()
}

/// Reinterprets a wall-clock time as local and returns the UTC instant.
fn local_to_utc(wall: f64) -> f64 {
    let Some(naive) = utc_datetime(wall).map(|dt| dt.naive_utc()) else {
        return f64::NAN;
    };
    // Wall times skipped by a DST change resolve an hour later.
    let resolved = Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest());
    match resolved {
        Some(dt) => dt.timestamp_millis() as f64,
        None => f64::NAN,
    }
}

fn from_fields(f: &Fields, local: bool) -> f64 {
    let wall = make_time(f);
    time_clip(if local { local_to_utc(wall) } else { wall })
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

static ISO_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([+-]\d{6}|\d{4})(?:-(\d{2})(?:-(\d{2}))?)?(?:[T ](\d{2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?)?\s*(Z|[+-]\d{2}:?\d{2})?$",
    )
    .expect("valid ISO date pattern")
});

const DATE_TIME_FORMATS: &[&str] = &[
    "%B %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%a %b %d %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%b %d, %Y", "%m/%d/%Y", "%Y/%m/%d", "%a %b %d %Y"];

/// `Date.parse`: the ISO format first, then a few common
/// human-readable forms. Unrecognised input gives `NaN`.
pub fn parse_date(s: &str) -> f64 {
    let s = s.trim();
    if let Some(t) = parse_iso(s) {
        return t;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.timestamp_millis() as f64;
    }
    let without_zone_name = s.split(" (").next().unwrap_or(s);
    if let Ok(dt) = DateTime::parse_from_str(without_zone_name, "%a %b %d %Y %H:%M:%S GMT%z") {
        return dt.timestamp_millis() as f64;
    }
    let naive = DATE_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        });
    match naive {
        Some(n) => local_to_utc(Utc.from_utc_datetime(&n).timestamp_millis() as f64),
        None => f64::NAN,
    }
}

fn parse_iso(s: &str) -> Option<f64> {
    let caps = ISO_FORMAT.captures(s)?;
    let num = |i: usize, default: f64| -> f64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(default)
    };
    let month = num(2, 1.0);
    let day = num(3, 1.0);
    let (hour, minute, second) = (num(4, 0.0), num(5, 0.0), num(6, 0.0));
    let millis = caps
        .get(7)
        .map(|m| {
            let digits: String = m.as_str().chars().chain("00".chars()).take(3).collect();
            digits.parse::<f64>().unwrap_or(0.0)
        })
        .unwrap_or(0.0);
    let valid = (1.0..=12.0).contains(&month)
        && (1.0..=31.0).contains(&day)
        && hour <= 24.0
        && minute < 60.0
        && second < 60.0
        && (hour < 24.0 || minute + second + millis == 0.0);
    if !valid {
        return Some(f64::NAN);
    }
    let fields = [num(1, 0.0), month - 1.0, day, hour, minute, second, millis];
    // Reject day overflow such as 02-30 instead of rolling it over.
    if let Some(d) = NaiveDate::from_ymd_opt(fields[0] as i32, month as u32, 1) {
        let next = if month == 12.0 {
            NaiveDate::from_ymd_opt(d.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(d.year(), month as u32 + 1, 1)
        };
        let days_in_month = next.map(|n| n.signed_duration_since(d).num_days()).unwrap_or(31);
        if day as i64 > days_in_month {
            return Some(f64::NAN);
        }
    }
    let wall = make_time(&fields);
    let date_only = caps.get(4).is_none();
    let t = match caps.get(8).map(|m| m.as_str()) {
        Some("Z") => wall,
        Some(offset) => {
            let sign = if offset.starts_with('-') { -1.0 } else { 1.0 };
            let digits: String = offset[1..].chars().filter(char::is_ascii_digit).collect();
            let hours: f64 = digits[..2].parse().unwrap_or(0.0);
            let minutes: f64 = digits[2..].parse().unwrap_or(0.0);
            wall - sign * (hours * 3_600_000.0 + minutes * 60_000.0)
        }
        None if date_only => wall,
        None => local_to_utc(wall),
    };
    Some(time_clip(t))
}

// ─── Formatting ───────────────────────────────────────────────────────────────

fn format_local(t: f64, pattern: &str) -> String {
    match local_datetime(t) {
        Some(dt) => dt.format(pattern).to_string(),
        None => "Invalid Date".to_string(),
    }
}

pub fn to_iso_string(t: f64) -> Option<String> {
    utc_datetime(t).map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

/// `Date.prototype.toString`, without the time zone name.
pub fn to_date_string(t: f64) -> String {
    format_local(t, "%a %b %d %Y %H:%M:%S GMT%z")
}

// ─── Prototype ────────────────────────────────────────────────────────────────

fn time_value(interp: &mut Interpreter, this: &Value) -> Flow<f64> {
    if let Value::Object(o) = this {
        if let ObjectKind::Date(t) = o.borrow().kind {
            return Ok(t);
        }
    }
    Err(interp.type_error("this is not a Date object."))
}

fn set_time_value(this: &Value, t: f64) -> Value {
    if let Value::Object(o) = this {
        if let ObjectKind::Date(slot) = &mut o.borrow_mut().kind {
            *slot = t;
        }
    }
    Value::Number(t)
}

macro_rules! getters {
    ($($name:ident => ($index:expr, $local:expr),)*) => {
        $(
            fn $name(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
                let t = time_value(interp, this)?;
                Ok(fields(t, $local).map_or(f64::NAN, |f| f[$index]).into())
            }
        )*
    };
}

getters! {
    get_full_year => (0, true),
    get_month => (1, true),
    get_date => (2, true),
    get_hours => (3, true),
    get_minutes => (4, true),
    get_seconds => (5, true),
    get_milliseconds => (6, true),
    get_utc_full_year => (0, false),
    get_utc_month => (1, false),
    get_utc_date => (2, false),
    get_utc_hours => (3, false),
    get_utc_minutes => (4, false),
    get_utc_seconds => (5, false),
    get_utc_milliseconds => (6, false),
}

fn get_day(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let t = time_value(interp, this)?;
    Ok(local_datetime(t)
        .map_or(f64::NAN, |dt| dt.weekday().num_days_from_sunday() as f64)
        .into())
}

fn get_utc_day(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let t = time_value(interp, this)?;
    Ok(utc_datetime(t)
        .map_or(f64::NAN, |dt| dt.weekday().num_days_from_sunday() as f64)
        .into())
}

fn get_timezone_offset(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let t = time_value(interp, this)?;
    Ok(local_datetime(t)
        .map_or(f64::NAN, |dt| -(dt.offset().local_minus_utc() as f64) / 60.0)
        .into())
}

fn get_time(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(time_value(interp, this)?.into())
}

fn set_time(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    time_value(interp, this)?;
    let t = interp.to_number(&arg(args, 0))?;
    Ok(set_time_value(this, time_clip(t)))
}

/// Shared body of the field setters: overwrites up to `max` fields
/// starting at `first` and recomputes the time value.
fn set_fields(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    first: usize,
    max: usize,
    local: bool,
) -> Flow<Value> {
    let t = time_value(interp, this)?;
    let mut values = Vec::new();
    for v in args.iter().take(max.max(1)) {
        values.push(interp.to_number(v)?);
    }
    if values.is_empty() {
        values.push(f64::NAN);
    }
    // Setting the year of an invalid date starts from the epoch.
    let base = match fields(t, local) {
        Some(f) => f,
        None if first == 0 => [1970.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
        None => return Ok(Value::Number(f64::NAN)),
    };
    let mut f = base;
    for (i, v) in values.into_iter().enumerate() {
        f[first + i] = v;
    }
    Ok(set_time_value(this, from_fields(&f, local)))
}

macro_rules! setters {
    ($($name:ident => ($first:expr, $max:expr, $local:expr),)*) => {
        $(
            fn $name(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
                set_fields(interp, this, args, $first, $max, $local)
            }
        )*
    };
}

setters! {
    set_full_year => (0, 3, true),
    set_month => (1, 2, true),
    set_date => (2, 1, true),
    set_hours => (3, 4, true),
    set_minutes => (4, 3, true),
    set_seconds => (5, 2, true),
    set_milliseconds => (6, 1, true),
    set_utc_full_year => (0, 3, false),
    set_utc_month => (1, 2, false),
    set_utc_date => (2, 1, false),
    set_utc_hours => (3, 4, false),
    set_utc_minutes => (4, 3, false),
    set_utc_seconds => (5, 2, false),
    set_utc_milliseconds => (6, 1, false),
}

fn to_iso(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let t = time_value(interp, this)?;
    match to_iso_string(t) {
        Some(s) => Ok(s.into()),
        None => Err(interp.range_error("Invalid time value")),
    }
}

fn to_json(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let t = time_value(interp, this)?;
    Ok(to_iso_string(t).map_or(Value::Null, Value::from))
}

fn to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let t = time_value(interp, this)?;
    Ok(to_date_string(t).into())
}

macro_rules! formatters {
    ($($name:ident => $pattern:expr,)*) => {
        $(
            fn $name(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
                let t = time_value(interp, this)?;
                Ok(format_local(t, $pattern).into())
            }
        )*
    };
}

formatters! {
    to_date_only_string => "%a %b %d %Y",
    to_time_string => "%H:%M:%S GMT%z",
    to_locale_string => "%-m/%-d/%Y, %-I:%M:%S %p",
    to_locale_date_string => "%-m/%-d/%Y",
    to_locale_time_string => "%-I:%M:%S %p",
}

fn to_utc_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Flow<Value> {
    let t = time_value(interp, this)?;
    Ok(match utc_datetime(t) {
        Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string().into(),
        None => Value::str("Invalid Date"),
    })
}

pub fn init(interp: &mut Interpreter) {
    let proto = interp.realm.date_proto.clone();
    let table: &[(&str, usize, NativeFn)] = &[
        ("getTime", 0, get_time),
        ("valueOf", 0, get_time),
        ("setTime", 1, set_time),
        ("getFullYear", 0, get_full_year),
        ("getMonth", 0, get_month),
        ("getDate", 0, get_date),
        ("getDay", 0, get_day),
        ("getHours", 0, get_hours),
        ("getMinutes", 0, get_minutes),
        ("getSeconds", 0, get_seconds),
        ("getMilliseconds", 0, get_milliseconds),
        ("getUTCFullYear", 0, get_utc_full_year),
        ("getUTCMonth", 0, get_utc_month),
        ("getUTCDate", 0, get_utc_date),
        ("getUTCDay", 0, get_utc_day),
        ("getUTCHours", 0, get_utc_hours),
        ("getUTCMinutes", 0, get_utc_minutes),
        ("getUTCSeconds", 0, get_utc_seconds),
        ("getUTCMilliseconds", 0, get_utc_milliseconds),
        ("getTimezoneOffset", 0, get_timezone_offset),
        ("setFullYear", 3, set_full_year),
        ("setMonth", 2, set_month),
        ("setDate", 1, set_date),
        ("setHours", 4, set_hours),
        ("setMinutes", 3, set_minutes),
        ("setSeconds", 2, set_seconds),
        ("setMilliseconds", 1, set_milliseconds),
        ("setUTCFullYear", 3, set_utc_full_year),
        ("setUTCMonth", 2, set_utc_month),
        ("setUTCDate", 1, set_utc_date),
        ("setUTCHours", 4, set_utc_hours),
        ("setUTCMinutes", 3, set_utc_minutes),
        ("setUTCSeconds", 2, set_utc_seconds),
        ("setUTCMilliseconds", 1, set_utc_milliseconds),
        ("toISOString", 0, to_iso),
        ("toJSON", 1, to_json),
        ("toString", 0, to_string),
        ("toDateString", 0, to_date_only_string),
        ("toTimeString", 0, to_time_string),
        ("toUTCString", 0, to_utc_string),
        ("toLocaleString", 0, to_locale_string),
        ("toLocaleDateString", 0, to_locale_date_string),
        ("toLocaleTimeString", 0, to_locale_time_string),
    ];
    for (name, arity, f) in table {
        method(interp, &proto, name, *arity, *f);
    }
}

// ─── Constructor ──────────────────────────────────────────────────────────────

/// Field list from constructor-style arguments; two-digit years map to 19xx.
fn fields_from_args(interp: &mut Interpreter, args: &[Value]) -> Flow<Fields> {
    let mut f: Fields = [f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    for (i, v) in args.iter().take(7).enumerate() {
        f[i] = interp.to_number(v)?;
    }
    let year = f[0].trunc();
    if (0.0..=99.0).contains(&year) {
        f[0] = 1900.0 + year;
    }
    Ok(f)
}

fn date_call(interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(to_date_string(interp.now().trunc()).into())
}

fn date_construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
    let t = match args {
        [] => interp.now().trunc(),
        [single] => {
            let existing = match single {
                Value::Object(o) => match o.borrow().kind {
                    ObjectKind::Date(t) => Some(t),
                    _ => None,
                },
                _ => None,
            };
            match existing {
                Some(t) => t,
                None => match interp.to_primitive(single, Hint::Default)? {
                    Value::Str(s) => parse_date(&s),
                    prim => time_clip(interp.to_number(&prim)?),
                },
            }
        }
        _ => {
            let f = fields_from_args(interp, args)?;
            from_fields(&f, true)
        }
    };
    Ok(new_object(ObjectKind::Date(t), Some(interp.realm.date_proto.clone())).into())
}

fn now(interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> Flow<Value> {
    Ok(interp.now().trunc().into())
}

fn parse(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let s = interp.to_string(&arg(args, 0))?;
    Ok(parse_date(&s).into())
}

fn utc(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let f = fields_from_args(interp, args)?;
    Ok(from_fields(&f, false).into())
}

fn install(interp: &mut Interpreter) -> Value {
    let proto = interp.realm.date_proto.clone();
    let ctor = constructor(interp, "Date", 7, date_call, date_construct, &proto);
    method(interp, &ctor, "now", 0, now);
    method(interp, &ctor, "parse", 1, parse);
    method(interp, &ctor, "UTC", 7, utc);
    ctor.into()
}

inventory::submit! {
    Facility { name: "Date", install }
}

#[cfg(test)]
mod tests {
    use super::parse_date;
    use crate::script::builtins::test_support::{eval_logged, run_script};

    #[test]
    fn utc_construction_and_iso_output() {
        assert_eq!(
            eval_logged("new Date(Date.UTC(2024, 0, 31, 13, 5, 9, 42)).toISOString()"),
            "2024-01-31T13:05:09.042Z"
        );
        assert_eq!(eval_logged("new Date(0).toISOString()"), "1970-01-01T00:00:00.000Z");
        assert_eq!(eval_logged("new Date(Date.UTC(2024, 0, 32)).getUTCMonth()"), "1");
        assert_eq!(eval_logged("new Date(Date.UTC(2024, 12, 1)).getUTCFullYear()"), "2025");
    }

    #[test]
    fn iso_parsing() {
        assert_eq!(parse_date("1970-01-01T00:00:01.5Z"), 1500.0);
        assert_eq!(parse_date("1970-01-02"), 86_400_000.0);
        assert_eq!(parse_date("1970-01-01T01:00:00+01:00"), 0.0);
        assert!(parse_date("2023-02-30").is_nan());
        assert!(parse_date("not a date").is_nan());
        assert_eq!(
            eval_logged("Date.parse('2024-03-05T10:20:30.123Z') === Date.UTC(2024, 2, 5, 10, 20, 30, 123)"),
            "true"
        );
    }

    #[test]
    fn local_fields_round_trip() {
        assert_eq!(
            eval_logged("(() => { const d = new Date(2024, 5, 15, 12, 30); return [d.getFullYear(), d.getMonth(), d.getDate(), d.getHours(), d.getMinutes()].join(); })()"),
            "2024,5,15,12,30"
        );
    }

    #[test]
    fn setters_carry_overflow() {
        assert_eq!(
            eval_logged("(() => { const d = new Date(Date.UTC(2020, 1, 29)); d.setUTCFullYear(2021); return d.toISOString(); })()"),
            "2021-03-01T00:00:00.000Z"
        );
        assert_eq!(
            eval_logged("(() => { const d = new Date(0); d.setUTCHours(25); return d.getUTCDate(); })()"),
            "2"
        );
    }

    #[test]
    fn invalid_dates() {
        assert_eq!(eval_logged("String(new Date('nope'))"), "Invalid Date");
        assert_eq!(eval_logged("new Date('nope').getTime()"), "NaN");
        assert_eq!(eval_logged("JSON.stringify({ d: new Date(NaN), e: new Date(0) })"), "{\"d\":null,\"e\":\"1970-01-01T00:00:00.000Z\"}");
        let (result, _) = run_script("new Date(NaN).toISOString();");
        assert_eq!(result.unwrap_err().to_string(), "RangeError: Invalid time value");
    }

    #[test]
    fn call_without_new_returns_a_string() {
        assert_eq!(eval_logged("typeof Date() + ' ' + typeof new Date()"), "string object");
        assert_eq!(eval_logged("new Date(5) - new Date(2)"), "3");
    }
}
