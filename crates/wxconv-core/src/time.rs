//! Timestamp <-> date string codec
//!
//! Formats and parses `YYYY-MM-DD[ |T]HH:mm:ss[Z]` by writing and reading
//! digits directly. The only calendar support needed is the proleptic
//! Gregorian day count; the local UTC offset comes from an [`OffsetProvider`].

use chrono::TimeZone;
use tracing::debug;

/// Timestamp type (Unix epoch seconds)
pub type Timestamp = i64;

const SECS_PER_DAY: i128 = 86_400;

/// Longest year the parser accepts; enough for every `i64` timestamp
const MAX_YEAR_DIGITS: usize = 12;

/// Room for a sign, a 12-digit year and the rest of the fields
const FORMATTED_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("Malformed date/time: {raw:?}")]
    MalformedInput { raw: String },
}

pub type TimeResult<T> = Result<T, TimeError>;

fn malformed(raw: &str) -> TimeError {
    debug!(raw, "malformed date/time");
    TimeError::MalformedInput {
        raw: raw.to_string(),
    }
}

/// Source of the local UTC offset
pub trait OffsetProvider: Send + Sync {
    /// Seconds east of UTC in effect at the UTC instant `ts`
    fn utc_offset(&self, ts: Timestamp) -> i32;
}

impl<P: OffsetProvider + ?Sized> OffsetProvider for Box<P> {
    fn utc_offset(&self, ts: Timestamp) -> i32 {
        (**self).utc_offset(ts)
    }
}

/// The process's local time zone, as reported by the OS
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLocal;

impl OffsetProvider for SystemLocal {
    fn utc_offset(&self, ts: Timestamp) -> i32 {
        // Outside chrono's representable range there is no zone data to consult
        chrono::Local
            .timestamp_opt(ts, 0)
            .single()
            .map_or(0, |dt| dt.offset().local_minus_utc())
    }
}

/// A zone that never changes offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstantOffset(i32);

impl ConstantOffset {
    pub const UTC: ConstantOffset = ConstantOffset(0);

    pub fn east(seconds: i32) -> Self {
        ConstantOffset(seconds)
    }

    pub fn seconds(&self) -> i32 {
        self.0
    }
}

impl OffsetProvider for ConstantOffset {
    fn utc_offset(&self, _ts: Timestamp) -> i32 {
        self.0
    }
}

/// Converts timestamps to and from fixed-format strings
#[derive(Debug, Clone, Default)]
pub struct TimeCodec<P = SystemLocal> {
    provider: P,
}

impl TimeCodec<SystemLocal> {
    pub fn system() -> Self {
        Self {
            provider: SystemLocal,
        }
    }
}

impl<P: OffsetProvider> TimeCodec<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Format `ts` as `YYYY-MM-DD HH:mm:ss`
    ///
    /// `iso_separator` puts a `T` between date and time; `utc` formats in UTC
    /// and appends `Z`, otherwise the local offset at `ts` is applied.
    pub fn timestamp_to_string(&self, ts: Timestamp, iso_separator: bool, utc: bool) -> String {
        let mut out = String::with_capacity(FORMATTED_CAPACITY);
        self.write_timestamp(ts, iso_separator, utc, &mut out);
        out
    }

    /// Append the formatted `ts` to `out`
    pub fn write_timestamp(&self, ts: Timestamp, iso_separator: bool, utc: bool, out: &mut String) {
        let mut wall = i128::from(ts);
        if !utc {
            wall += i128::from(self.provider.utc_offset(ts));
        }

        // |wall| / 86400 always fits in i64
        let days = wall.div_euclid(SECS_PER_DAY) as i64;
        let secs = wall.rem_euclid(SECS_PER_DAY) as u32;
        let (year, month, day) = civil_from_days(days);

        push_year(out, year);
        out.push('-');
        push_two(out, month);
        out.push('-');
        push_two(out, day);
        out.push(if iso_separator { 'T' } else { ' ' });
        push_two(out, secs / 3600);
        out.push(':');
        push_two(out, secs % 3600 / 60);
        out.push(':');
        push_two(out, secs % 60);
        if utc {
            out.push('Z');
        }
    }

    /// Parse `YYYY-MM-DD` or `YYYY-MM-DD<sep>HH:mm:ss[Z]`
    ///
    /// `<sep>` may be any single non-digit character. A trailing `Z` or
    /// `utc` selects UTC, otherwise the fields are local wall-clock time.
    pub fn string_to_timestamp(&self, s: &str, utc: bool) -> TimeResult<Timestamp> {
        let fields = DateFields::parse(s).ok_or_else(|| malformed(s))?;

        let wall = i128::from(days_from_civil(fields.year, fields.month, fields.day)) * SECS_PER_DAY
            + i128::from(fields.hour * 3600 + fields.minute * 60 + fields.second);

        let ts = if utc || fields.zulu {
            wall
        } else {
            self.resolve_local(wall)
        };

        Timestamp::try_from(ts).map_err(|_| malformed(s))
    }

    fn offset_near(&self, t: i128) -> i128 {
        let probe = t.clamp(i128::from(Timestamp::MIN), i128::from(Timestamp::MAX)) as Timestamp;
        i128::from(self.provider.utc_offset(probe))
    }

    /// Find the instant whose local wall-clock reading is `wall`
    ///
    /// A repeated reading resolves to the earlier instant; a skipped one is
    /// read with the offset in effect before the transition.
    fn resolve_local(&self, wall: i128) -> i128 {
        let candidates = [
            self.offset_near(wall - SECS_PER_DAY),
            self.offset_near(wall),
            self.offset_near(wall + SECS_PER_DAY),
        ];

        candidates
            .iter()
            .map(|&offset| (wall - offset, offset))
            .filter(|&(ts, offset)| self.offset_near(ts) == offset)
            .map(|(ts, _)| ts)
            .min()
            .unwrap_or(wall - candidates[0])
    }
}

/// Format with the system local zone
pub fn timestamp_to_string(ts: Timestamp, iso_separator: bool, utc: bool) -> String {
    TimeCodec::system().timestamp_to_string(ts, iso_separator, utc)
}

/// Parse with the system local zone
pub fn string_to_timestamp(s: &str, utc: bool) -> TimeResult<Timestamp> {
    TimeCodec::system().string_to_timestamp(s, utc)
}

#[derive(Debug, PartialEq, Eq)]
struct DateFields {
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    zulu: bool,
}

impl DateFields {
    fn parse(s: &str) -> Option<Self> {
        let mut cursor = Cursor { rest: s };

        let negative = cursor.eat('-');
        let year = cursor.number(MAX_YEAR_DIGITS)?;
        let year = if negative { -year } else { year };
        cursor.expect('-')?;
        let month = cursor.number(2)? as u32;
        cursor.expect('-')?;
        let day = cursor.number(2)? as u32;

        let mut fields = DateFields {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
            zulu: false,
        };

        if !cursor.is_empty() {
            cursor.separator()?;
            fields.hour = cursor.number(2)? as u32;
            cursor.expect(':')?;
            fields.minute = cursor.number(2)? as u32;
            cursor.expect(':')?;
            fields.second = cursor.number(2)? as u32;
            fields.zulu = cursor.eat('Z');
            if !cursor.is_empty() {
                return None;
            }
        }

        fields.in_range().then_some(fields)
    }

    fn in_range(&self) -> bool {
        (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour <= 23
            && self.minute <= 59
            && self.second <= 59
    }
}

struct Cursor<'a> {
    rest: &'a str,
}

impl Cursor<'_> {
    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn eat(&mut self, c: char) -> bool {
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn expect(&mut self, c: char) -> Option<()> {
        self.eat(c).then_some(())
    }

    /// Any single character that is not an ASCII digit
    fn separator(&mut self) -> Option<()> {
        let c = self.rest.chars().next()?;
        if c.is_ascii_digit() {
            return None;
        }
        self.rest = &self.rest[c.len_utf8()..];
        Some(())
    }

    /// Between 1 and `max_digits` ASCII digits, not followed by another digit
    fn number(&mut self, max_digits: usize) -> Option<i64> {
        let len = self
            .rest
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if len == 0 || len > max_digits {
            return None;
        }
        let (digits, rest) = self.rest.split_at(len);
        self.rest = rest;
        digits
            .bytes()
            .try_fold(0i64, |acc, b| acc.checked_mul(10)?.checked_add(i64::from(b - b'0')))
    }
}

fn is_leap_year(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date (Hinnant's days_from_civil)
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let m = i64::from(month);
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of [`days_from_civil`]
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn digit(value: u64) -> char {
    char::from(b'0' + (value % 10) as u8)
}

fn push_two(out: &mut String, value: u32) {
    out.push(digit(u64::from(value / 10)));
    out.push(digit(u64::from(value)));
}

/// At least four digits, with a leading `-` before year 0
fn push_year(out: &mut String, year: i64) {
    if year < 0 {
        out.push('-');
    }
    let mut value = year.unsigned_abs();
    let mut buf = ['0'; 20];
    let mut len = 0;
    while value > 0 || len < 4 {
        buf[len] = digit(value);
        value /= 10;
        len += 1;
    }
    out.extend(buf[..len].iter().rev());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// +01:00 until `switch`, +02:00 from then on
    struct SpringForward {
        switch: Timestamp,
    }

    impl OffsetProvider for SpringForward {
        fn utc_offset(&self, ts: Timestamp) -> i32 {
            if ts < self.switch {
                3600
            } else {
                7200
            }
        }
    }

    /// +02:00 until `switch`, +01:00 from then on
    struct FallBack {
        switch: Timestamp,
    }

    impl OffsetProvider for FallBack {
        fn utc_offset(&self, ts: Timestamp) -> i32 {
            if ts < self.switch {
                7200
            } else {
                3600
            }
        }
    }

    fn utc() -> TimeCodec<ConstantOffset> {
        TimeCodec::new(ConstantOffset::UTC)
    }

    #[test]
    fn test_epoch_formatting() {
        let codec = utc();
        assert_eq!(codec.timestamp_to_string(0, false, true), "1970-01-01 00:00:00Z");
        assert_eq!(codec.timestamp_to_string(0, true, true), "1970-01-01T00:00:00Z");
        assert_eq!(codec.timestamp_to_string(0, false, false), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_known_date() {
        assert_eq!(
            utc().timestamp_to_string(1_705_067_200, true, true),
            "2024-01-12T13:46:40Z"
        );
    }

    #[test]
    fn test_negative_timestamp() {
        assert_eq!(
            utc().timestamp_to_string(-1, false, true),
            "1969-12-31 23:59:59Z"
        );
        assert_eq!(
            utc().string_to_timestamp("1969-12-31 23:59:59", true),
            Ok(-1)
        );
    }

    #[test]
    fn test_local_offset_applied() {
        let codec = TimeCodec::new(ConstantOffset::east(-5 * 3600));
        assert_eq!(
            codec.timestamp_to_string(1_705_067_200, false, false),
            "2024-01-12 08:46:40"
        );
        assert_eq!(
            codec.string_to_timestamp("2024-01-12 08:46:40", false),
            Ok(1_705_067_200)
        );
    }

    #[test]
    fn test_utc_flag_wins_over_provider() {
        let codec = TimeCodec::new(ConstantOffset::east(3 * 3600));
        assert_eq!(codec.timestamp_to_string(0, false, true), "1970-01-01 00:00:00Z");
        assert_eq!(codec.string_to_timestamp("1970-01-01 00:00:00", true), Ok(0));
        assert_eq!(codec.string_to_timestamp("1970-01-01 00:00:00Z", false), Ok(0));
    }

    #[test]
    fn test_date_only_is_midnight() {
        let codec = TimeCodec::new(ConstantOffset::east(3600));
        assert_eq!(codec.string_to_timestamp("2024-01-12", false), Ok(1_705_014_000));
        assert_eq!(codec.string_to_timestamp("2024-01-12", true), Ok(1_705_017_600));
    }

    #[test]
    fn test_permissive_separator() {
        let codec = utc();
        for text in [
            "2024-01-12T13:46:40",
            "2024-01-12 13:46:40",
            "2024-01-12_13:46:40",
            "2024-01-12é13:46:40",
        ] {
            assert_eq!(codec.string_to_timestamp(text, true), Ok(1_705_067_200), "{text}");
        }
    }

    #[test]
    fn test_malformed_inputs() {
        let codec = utc();
        for text in [
            "",
            "not-a-date",
            "2024-13-01",
            "2024-00-10",
            "2024-01-00",
            "2024-01-32",
            "2023-02-29",
            "2024-01-12T24:00:00",
            "2024-01-12T23:60:00",
            "2024-01-12T23:59:60",
            "2024-01-12T13:46",
            "2024-01-12T13:46:40ZZ",
            "2024-01-12T13:46:40+01:00",
            "2024-01-12Z",
            "2024-01-1213:46:40",
            "2024-001-12",
            "9999999999999-01-01",
        ] {
            assert_eq!(
                codec.string_to_timestamp(text, false),
                Err(TimeError::MalformedInput {
                    raw: text.to_string()
                }),
                "{text}"
            );
        }
    }

    #[test]
    fn test_leap_day() {
        let codec = utc();
        let ts = codec.string_to_timestamp("2024-02-29", true).unwrap();
        assert_eq!(codec.timestamp_to_string(ts, false, true), "2024-02-29 00:00:00Z");
        assert!(codec.string_to_timestamp("1900-02-29", true).is_err());
        assert!(codec.string_to_timestamp("2000-02-29", true).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_round_trip() {
        let codec = utc();
        for ts in [Timestamp::MIN, Timestamp::MAX, -62_135_596_800, 253_402_300_800] {
            let text = codec.timestamp_to_string(ts, true, true);
            assert_eq!(codec.string_to_timestamp(&text, true), Ok(ts), "{text}");
        }
    }

    #[test]
    fn test_year_padding() {
        let codec = utc();
        // 0001-01-01
        assert_eq!(
            codec.timestamp_to_string(-62_135_596_800, false, true),
            "0001-01-01 00:00:00Z"
        );
        // 10000-01-01
        assert_eq!(
            codec.timestamp_to_string(253_402_300_800, false, true),
            "10000-01-01 00:00:00Z"
        );
        // 1 BC is year 0, 2 BC is year -1
        assert_eq!(
            codec.string_to_timestamp("-0001-12-31 23:59:59", true),
            Ok(-62_167_219_201)
        );
    }

    #[test]
    fn test_write_timestamp_appends() {
        let codec = utc();
        let mut out = String::new();
        codec.write_timestamp(0, true, true, &mut out);
        out.push(',');
        codec.write_timestamp(86_400, true, true, &mut out);
        assert_eq!(out, "1970-01-01T00:00:00Z,1970-01-02T00:00:00Z");
    }

    #[test]
    fn test_local_round_trip_across_spring_forward() {
        let switch = 1_711_846_800; // 2024-03-31T01:00:00Z
        let codec = TimeCodec::new(SpringForward { switch });
        for ts in (switch - 7200..switch + 7200).step_by(600) {
            let text = codec.timestamp_to_string(ts, false, false);
            assert_eq!(codec.string_to_timestamp(&text, false), Ok(ts), "{text}");
        }
    }

    #[test]
    fn test_spring_forward_gap_moves_forward() {
        let switch = 1_711_846_800;
        let codec = TimeCodec::new(SpringForward { switch });
        // 02:30 local never happens; read with +01:00 it lands at 03:30 +02:00
        let ts = codec.string_to_timestamp("2024-03-31 02:30:00", false).unwrap();
        assert_eq!(ts, switch + 1800);
        assert_eq!(codec.timestamp_to_string(ts, false, false), "2024-03-31 03:30:00");
    }

    #[test]
    fn test_fall_back_repeated_hour_picks_earlier() {
        let switch = 1_729_990_800; // 2024-10-27T01:00:00Z
        let codec = TimeCodec::new(FallBack { switch });
        // 02:30 local occurs at 00:30Z (+02:00) and again at 01:30Z (+01:00)
        let ts = codec.string_to_timestamp("2024-10-27 02:30:00", false).unwrap();
        assert_eq!(ts, switch - 1800);
        // outside the repeated hour everything round-trips
        for ts in [switch - 7200, switch + 3600, switch + 7200] {
            let text = codec.timestamp_to_string(ts, false, false);
            assert_eq!(codec.string_to_timestamp(&text, false), Ok(ts), "{text}");
        }
    }

    #[test]
    fn test_civil_days_agree() {
        for days in (-800_000..800_000).step_by(997) {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m, d), days);
        }
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(civil_from_days(19_734), (2024, 1, 12));
    }

    #[test]
    fn test_boxed_provider() {
        let codec: TimeCodec<Box<dyn OffsetProvider>> =
            TimeCodec::new(Box::new(ConstantOffset::east(3600)));
        assert_eq!(codec.timestamp_to_string(0, false, false), "1970-01-01 01:00:00");
    }

    #[test]
    fn test_error_message() {
        let err = utc().string_to_timestamp("2024-13-01", false).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @r#"Malformed date/time: "2024-13-01""#);
    }
}
