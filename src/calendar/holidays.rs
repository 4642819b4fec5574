//! Rule-based NYSE holidays and early closes.
//!
//! Rules follow the exchange's observance policy: a holiday falling on Sunday is observed the
//! following Monday and one falling on Saturday the preceding Friday, except New Year's Day,
//! which is not moved back into the previous year.

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};

/// Full-day NYSE closures for `year`.
pub fn nyse_holidays(year: i32) -> Vec<NaiveDate> {
    let new_years = ymd(year, 1, 1).and_then(|d| match d.weekday() {
        Weekday::Sat => None,
        Weekday::Sun => d.succ_opt(),
        _ => Some(d),
    });

    let juneteenth = if year >= 2022 {
        ymd(year, 6, 19).and_then(observed)
    } else {
        None
    };

    [
        new_years,
        nth_weekday(year, 1, Weekday::Mon, 3),
        nth_weekday(year, 2, Weekday::Mon, 3),
        good_friday(year),
        last_weekday(year, 5, Weekday::Mon),
        juneteenth,
        ymd(year, 7, 4).and_then(observed),
        nth_weekday(year, 9, Weekday::Mon, 1),
        thanksgiving(year),
        ymd(year, 12, 25).and_then(observed),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Sessions that end at 13:00 New York time (last minute 13:00) in `year`.
pub fn nyse_early_closes(year: i32) -> Vec<(NaiveDate, NaiveTime)> {
    let one_pm = NaiveTime::from_hms_opt(13, 0, 0).unwrap_or(NaiveTime::MIN);

    // July 3 closes early only when Independence Day itself is a weekday after it.
    let july_3 = ymd(year, 7, 3).filter(|d| {
        matches!(
            d.weekday(),
            Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu
        )
    });

    let black_friday = thanksgiving(year).and_then(|d| d.succ_opt());

    // A Friday Christmas Eve is the observed Christmas holiday instead.
    let christmas_eve = ymd(year, 12, 24).filter(|d| {
        matches!(
            d.weekday(),
            Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu
        )
    });

    [july_3, black_friday, christmas_eve]
        .into_iter()
        .flatten()
        .map(|d| (d, one_pm))
        .collect()
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn observed(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => date.pred_opt(),
        Weekday::Sun => date.succ_opt(),
        _ => Some(date),
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let mut d = ymd(next_year, next_month, 1)?.pred_opt()?;
    while d.weekday() != weekday {
        d = d.pred_opt()?;
    }
    Some(d)
}

fn thanksgiving(year: i32) -> Option<NaiveDate> {
    nth_weekday(year, 11, Weekday::Thu, 4)
}

/// Good Friday, two days before Western Easter (anonymous Gregorian computus).
fn good_friday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, month as u32, day as u32)?.checked_sub_days(Days::new(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn nyse_holidays_2015() {
        assert_eq!(
            nyse_holidays(2015),
            vec![
                date(2015, 1, 1),
                date(2015, 1, 19),
                date(2015, 2, 16),
                date(2015, 4, 3),
                date(2015, 5, 25),
                date(2015, 7, 3),
                date(2015, 9, 7),
                date(2015, 11, 26),
                date(2015, 12, 25),
            ]
        );
    }

    #[test]
    fn new_years_on_saturday_is_not_observed() {
        // 2022-01-01 was a Saturday; NYSE traded on Friday 2021-12-31.
        let holidays = nyse_holidays(2022);
        assert!(!holidays.contains(&date(2021, 12, 31)));
        assert!(!holidays.contains(&date(2022, 1, 1)));
        assert!(holidays.contains(&date(2022, 6, 20)));
    }

    #[test]
    fn nyse_early_closes_2015() {
        let dates: Vec<_> = nyse_early_closes(2015).into_iter().map(|(d, _)| d).collect();
        // July 3 2015 was itself the observed holiday.
        assert_eq!(dates, vec![date(2015, 11, 27), date(2015, 12, 24)]);
    }

    #[test]
    fn good_friday_known_dates() {
        assert_eq!(good_friday(2015), Some(date(2015, 4, 3)));
        assert_eq!(good_friday(2016), Some(date(2016, 3, 25)));
        assert_eq!(good_friday(2024), Some(date(2024, 3, 29)));
    }
}
