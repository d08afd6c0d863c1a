use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Timelike,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

pub const TIMEZONE_ENV_VAR: &str =
  "TODO_TIMEZONE";
pub const DEFAULT_TIMEZONE: &str =
  "UTC";

/// `$TODO_TIMEZONE` wins over the
/// configured value.
pub fn resolve_timezone(
  configured: Option<&str>
) -> anyhow::Result<Tz> {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && !raw.trim().is_empty()
  {
    return parse_timezone(&raw)
      .with_context(|| {
        format!(
          "invalid {TIMEZONE_ENV_VAR}"
        )
      });
  }

  parse_timezone(
    configured
      .unwrap_or(DEFAULT_TIMEZONE)
  )
}

pub fn parse_timezone(
  raw: &str
) -> anyhow::Result<Tz> {
  raw.trim().parse::<Tz>().map_err(
    |err| {
      anyhow!(
        "unknown timezone {raw:?}: \
         {err}"
      )
    }
  )
}

#[must_use]
pub fn to_local_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

#[must_use]
pub fn format_clock(
  dt: DateTime<Utc>,
  tz: &Tz
) -> String {
  dt.with_timezone(tz)
    .format("%H:%M")
    .to_string()
}

/// The next hour from `now`, at
/// minute precision.
#[must_use]
pub fn default_due(
  now: DateTime<Utc>
) -> DateTime<Utc> {
  hours_from_now(now, 1)
}

#[must_use]
pub fn hours_from_now(
  now: DateTime<Utc>,
  hours: i64
) -> DateTime<Utc> {
  let next = now + Duration::hours(hours);
  next
    .with_second(0)
    .and_then(|dt| dt.with_nanosecond(0))
    .unwrap_or(next)
}

#[tracing::instrument(skip(now, tz), fields(input = input))]
pub fn parse_due_expr(
  input: &str,
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  if lower.is_empty() {
    return Err(anyhow!(
      "empty date expression"
    ));
  }

  let today = to_local_date(now, tz);
  let default_time = default_due(now)
    .with_timezone(tz)
    .time();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      return from_local(
        today.and_time(default_time),
        tz,
        token
      );
    }
    | "tomorrow" => {
      let date = today
        .succ_opt()
        .ok_or_else(|| {
          anyhow!("date out of range")
        })?;
      return from_local(
        date.and_time(default_time),
        tz,
        token
      );
    }
    | _ => {}
  }

  let rel_re = Regex::new(
    r"^\+(?P<num>\d+)(?P<unit>[mhd])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps["num"]
      .parse()
      .with_context(|| {
        format!(
          "invalid offset in {token}"
        )
      })?;
    let delta = match &caps["unit"] {
      | "m" => Duration::try_minutes(num),
      | "h" => Duration::try_hours(num),
      | _ => Duration::try_days(num)
    };
    return delta
      .and_then(|delta| {
        now.checked_add_signed(delta)
      })
      .ok_or_else(|| {
        anyhow!(
          "date out of range: {token}"
        )
      });
  }

  if let Ok(naive) =
    NaiveDateTime::parse_from_str(
      &lower,
      "%Y-%m-%dt%H:%M"
    )
  {
    return from_local(
      naive, tz, token
    );
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      &lower, "%Y-%m-%d"
    )
  {
    return from_local(
      date.and_time(default_time),
      tz,
      token
    );
  }

  if let Ok(time) =
    NaiveTime::parse_from_str(
      &lower, "%H:%M"
    )
  {
    return from_local(
      today.and_time(time),
      tz,
      token
    );
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {token} (try today, tomorrow, \
     YYYY-MM-DD, YYYY-MM-DDTHH:MM, \
     HH:MM or +3h)"
  ))
}

/// Combines a date field and a time
/// field the way the inline editor
/// does. Either one empty means no due
/// date.
pub fn combine_date_time(
  date: &str,
  time: &str,
  tz: &Tz
) -> anyhow::Result<
  Option<DateTime<Utc>>
> {
  let (date, time) =
    (date.trim(), time.trim());
  if date.is_empty() || time.is_empty()
  {
    return Ok(None);
  }

  let raw = format!("{date}T{time}");
  let naive =
    NaiveDateTime::parse_from_str(
      &raw,
      "%Y-%m-%dT%H:%M"
    )
    .with_context(|| {
      format!(
        "invalid date/time: {date} \
         {time}"
      )
    })?;
  from_local(naive, tz, &raw).map(Some)
}

fn from_local(
  naive: NaiveDateTime,
  tz: &Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match tz.from_local_datetime(&naive)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in {}: {context}",
        tz.name()
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    DateTime,
    TimeZone,
    Utc
  };

  use super::{
    combine_date_time,
    default_due,
    hours_from_now,
    parse_due_expr,
    parse_timezone
  };

  fn now() -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2026, 10, 18, 14, 20, 45
      )
      .single()
      .expect("valid now")
  }

  fn utc(
    y: i32,
    mo: u32,
    d: u32,
    h: u32,
    mi: u32
  ) -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(y, mo, d, h, mi, 0)
      .single()
      .expect("valid instant")
  }

  #[test]
  fn default_due_is_next_hour() {
    assert_eq!(
      default_due(now()),
      utc(2026, 10, 18, 15, 20)
    );
    assert_eq!(
      hours_from_now(now(), 24),
      utc(2026, 10, 19, 14, 20)
    );
  }

  #[test]
  fn parses_named_days_at_default_time()
  {
    let tz = chrono_tz::UTC;
    assert_eq!(
      parse_due_expr("today", now(), &tz)
        .expect("today"),
      utc(2026, 10, 18, 15, 20)
    );
    assert_eq!(
      parse_due_expr(
        "Tomorrow",
        now(),
        &tz
      )
      .expect("tomorrow"),
      utc(2026, 10, 19, 15, 20)
    );
    assert_eq!(
      parse_due_expr("now", now(), &tz)
        .expect("now"),
      now()
    );
  }

  #[test]
  fn parses_absolute_forms() {
    let tz = chrono_tz::UTC;
    assert_eq!(
      parse_due_expr(
        "2026-12-24T18:30",
        now(),
        &tz
      )
      .expect("datetime"),
      utc(2026, 12, 24, 18, 30)
    );
    assert_eq!(
      parse_due_expr(
        "2026-12-24",
        now(),
        &tz
      )
      .expect("date"),
      utc(2026, 12, 24, 15, 20)
    );
    assert_eq!(
      parse_due_expr("09:05", now(), &tz)
        .expect("clock"),
      utc(2026, 10, 18, 9, 5)
    );
  }

  #[test]
  fn parses_relative_offsets() {
    let tz = chrono_tz::UTC;
    assert_eq!(
      parse_due_expr("+3h", now(), &tz)
        .expect("hours"),
      now() + chrono::Duration::hours(3)
    );
    assert_eq!(
      parse_due_expr("+2d", now(), &tz)
        .expect("days"),
      now() + chrono::Duration::days(2)
    );
  }

  #[test]
  fn huge_offsets_are_errors() {
    let tz = chrono_tz::UTC;
    for expr in [
      "+9999999999999h",
      "+9999999999999d",
      "+9999999999999999m",
      "+99999999999999999999h"
    ] {
      assert!(
        parse_due_expr(expr, now(), &tz)
          .is_err(),
        "{expr}"
      );
    }
  }

  #[test]
  fn dst_gap_is_rejected() {
    let tz = parse_timezone(
      "America/New_York"
    )
    .expect("tz");
    // Clocks jump from 02:00 to 03:00.
    assert!(
      parse_due_expr(
        "2026-03-08T02:30",
        now(),
        &tz
      )
      .is_err()
    );
    assert!(
      combine_date_time(
        "2026-03-08",
        "02:30",
        &tz
      )
      .is_err()
    );
  }

  #[test]
  fn dst_overlap_takes_earlier_instant()
  {
    let tz = parse_timezone(
      "America/New_York"
    )
    .expect("tz");
    // 01:30 happens twice; EDT comes first.
    assert_eq!(
      parse_due_expr(
        "2026-11-01T01:30",
        now(),
        &tz
      )
      .expect("datetime"),
      utc(2026, 11, 1, 5, 30)
    );
  }

  #[test]
  fn local_times_use_timezone() {
    let tz = parse_timezone(
      "America/New_York"
    )
    .expect("tz");
    // EDT is UTC-4 in October.
    assert_eq!(
      parse_due_expr(
        "2026-10-20T09:00",
        now(),
        &tz
      )
      .expect("datetime"),
      utc(2026, 10, 20, 13, 0)
    );
  }

  #[test]
  fn rejects_garbage() {
    let tz = chrono_tz::UTC;
    assert!(
      parse_due_expr("someday", now(), &tz)
        .is_err()
    );
    assert!(
      parse_due_expr("  ", now(), &tz)
        .is_err()
    );
    assert!(
      parse_timezone("Mars/Olympus")
        .is_err()
    );
  }

  #[test]
  fn combine_requires_both_fields() {
    let tz = chrono_tz::UTC;
    assert_eq!(
      combine_date_time(
        "2026-10-20",
        "",
        &tz
      )
      .expect("combine"),
      None
    );
    assert_eq!(
      combine_date_time(
        "2026-10-20",
        "07:45",
        &tz
      )
      .expect("combine"),
      Some(utc(2026, 10, 20, 7, 45))
    );
    assert!(
      combine_date_time(
        "20/10/2026",
        "07:45",
        &tz
      )
      .is_err()
    );
  }
}
