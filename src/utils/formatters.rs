//! Display formatting shared by e-mails, exports and message templates.
//!
//! Output follows the pt-BR / pt-PT conventions: `.` groups thousands and
//! `,` separates decimals.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike};

use crate::models::Region;

const MONTHS_PT: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

pub fn month_name_pt(month: u32) -> &'static str {
    MONTHS_PT[((month.clamp(1, 12)) - 1) as usize]
}

pub fn currency_symbol(region: Region) -> &'static str {
    match region {
        Region::Br => "R$",
        Region::Pt => "€",
    }
}

/// Groups the integer digits of `value` with `.`.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

fn format_decimal(value: f64, decimals: usize) -> String {
    let rendered = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (rendered.clone(), None),
    };
    let negative = value < 0.0 && rendered.chars().any(|c| c != '0' && c != '.');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&group_thousands(&int_part));
    if let Some(frac) = frac_part {
        out.push(',');
        out.push_str(&frac);
    }
    out
}

/// `R$ 1.234,56` or `€ 1.234,56`. Missing or non-finite values render as zero.
/// Negative amounts carry the sign ahead of the symbol: `-R$ 42,00`.
pub fn format_currency(value: Option<f64>, region: Region, show_symbol: bool) -> String {
    let value = value.filter(|v| v.is_finite()).unwrap_or(0.0);
    let number = format_decimal(value, 2);
    if !show_symbol {
        return number;
    }
    match number.strip_prefix('-') {
        Some(magnitude) => format!("-{} {}", currency_symbol(region), magnitude),
        None => format!("{} {}", currency_symbol(region), number),
    }
}

/// `R$ 1.5K` / `R$ 2.0M` for card displays; smaller values use the full format.
pub fn format_compact_currency(value: f64, region: Region) -> String {
    let symbol = currency_symbol(region);
    if value >= 1_000_000.0 {
        format!("{} {:.1}M", symbol, value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{} {:.1}K", symbol, value / 1_000.0)
    } else {
        format_currency(Some(value), region, true)
    }
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Progressive phone mask, usable while the number is being typed.
///
/// BR: `(XX) XXXXX-XXXX`; PT: `XXX XXX XXX`, with `+351` once more than
/// nine digits are present.
pub fn format_phone(raw: &str, region: Region) -> String {
    let n = digits_only(raw);
    let len = n.len();

    match region {
        Region::Pt => {
            if len <= 3 {
                n
            } else if len <= 6 {
                format!("{} {}", &n[..3], &n[3..])
            } else if len <= 9 {
                format!("{} {} {}", &n[..3], &n[3..6], &n[6..])
            } else {
                format!("+351 {} {} {}", &n[..3], &n[3..6], &n[6..9])
            }
        }
        Region::Br => {
            if len <= 2 {
                format!("({n}")
            } else if len <= 7 {
                format!("({}) {}", &n[..2], &n[2..])
            } else if len <= 11 {
                format!("({}) {}-{}", &n[..2], &n[2..len - 4], &n[len - 4..])
            } else {
                raw.to_string()
            }
        }
    }
}

/// Integer-like number with thousands separator; decimals kept up to three places.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        return format_decimal(value, 0);
    }
    let rendered = format_decimal(value, 3);
    rendered.trim_end_matches('0').trim_end_matches(',').to_string()
}

pub fn format_percentage(value: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, value)
}

/// `45min`, `1h`, `1h 30min`.
pub fn format_duration(minutes: i64) -> String {
    if minutes < 60 {
        return format!("{minutes}min");
    }
    let hours = minutes / 60;
    let mins = minutes % 60;
    if mins == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {mins}min")
    }
}

/// `dd/mm/yyyy`
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    format_naive_date(date.date_naive())
}

pub fn format_naive_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// `05 de março de 2024`
pub fn format_date_long(date: NaiveDate) -> String {
    format!(
        "{:02} de {} de {}",
        date.day(),
        month_name_pt(date.month()),
        date.year()
    )
}

/// `HH:MM`
pub fn format_time<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    format!("{:02}:{:02}", date.hour(), date.minute())
}

/// `dd/mm/yyyy às HH:MM`
pub fn format_date_time<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    format!("{} às {}", format_date(date), format_time(date))
}

/// `Hoje`, `Ontem` or the plain date, relative to `today`.
pub fn format_relative_date(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Hoje".to_string()
    } else if today.pred_opt() == Some(date) {
        "Ontem".to_string()
    } else {
        format_naive_date(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn currency_by_region() {
        assert_eq!(format_currency(Some(1234.56), Region::Br, true), "R$ 1.234,56");
        assert_eq!(format_currency(Some(1234.56), Region::Pt, true), "€ 1.234,56");
        assert_eq!(format_currency(Some(1234.5), Region::Br, false), "1.234,50");
        assert_eq!(format_currency(Some(0.5), Region::Br, true), "R$ 0,50");
        assert_eq!(format_currency(Some(1_000_000.0), Region::Br, true), "R$ 1.000.000,00");
    }

    #[test]
    fn negative_currency_puts_the_sign_before_the_symbol() {
        assert_eq!(format_currency(Some(-42.0), Region::Br, true), "-R$ 42,00");
        assert_eq!(format_currency(Some(-1234.5), Region::Pt, true), "-€ 1.234,50");
        assert_eq!(format_currency(Some(-42.0), Region::Br, false), "-42,00");
        assert_eq!(format_currency(Some(-0.001), Region::Br, true), "R$ 0,00");
    }

    #[test]
    fn missing_currency_renders_zero() {
        assert_eq!(format_currency(None, Region::Br, true), "R$ 0,00");
        assert_eq!(format_currency(None, Region::Pt, true), "€ 0,00");
        assert_eq!(format_currency(Some(f64::NAN), Region::Br, false), "0,00");
    }

    #[test]
    fn compact_currency() {
        assert_eq!(format_compact_currency(1500.0, Region::Br), "R$ 1.5K");
        assert_eq!(format_compact_currency(2_000_000.0, Region::Br), "R$ 2.0M");
        assert_eq!(format_compact_currency(999.0, Region::Pt), "€ 999,00");
        assert_eq!(currency_symbol(Region::Pt), "€");
    }

    #[test]
    fn brazilian_phone_mask_is_progressive() {
        assert_eq!(format_phone("1", Region::Br), "(1");
        assert_eq!(format_phone("11", Region::Br), "(11");
        assert_eq!(format_phone("11987", Region::Br), "(11) 987");
        assert_eq!(format_phone("1198765432", Region::Br), "(11) 9876-5432");
        assert_eq!(format_phone("11987654321", Region::Br), "(11) 98765-4321");
        assert_eq!(format_phone("+55 (11) 98765-4321", Region::Br), "+55 (11) 98765-4321");
    }

    #[test]
    fn portuguese_phone_mask() {
        assert_eq!(format_phone("912", Region::Pt), "912");
        assert_eq!(format_phone("91234", Region::Pt), "912 34");
        assert_eq!(format_phone("912345678", Region::Pt), "912 345 678");
        assert_eq!(format_phone("9123456789", Region::Pt), "+351 912 345 678");
    }

    #[test]
    fn numbers_and_percentages() {
        assert_eq!(format_number(1234567.0), "1.234.567");
        assert_eq!(format_number(1234.5), "1.234,5");
        assert_eq!(format_percentage(12.345, 1), "12.3%");
        assert_eq!(format_percentage(50.0, 0), "50%");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(45), "45min");
        assert_eq!(format_duration(60), "1h");
        assert_eq!(format_duration(90), "1h 30min");
        assert_eq!(format_duration(125), "2h 5min");
    }

    #[test]
    fn dates_and_times() {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let moment = Utc
            .with_ymd_and_hms(2024, 3, 5, 17, 7, 0)
            .unwrap()
            .with_timezone(&offset);
        assert_eq!(format_date(&moment), "05/03/2024");
        assert_eq!(format_time(&moment), "14:07");
        assert_eq!(format_date_time(&moment), "05/03/2024 às 14:07");
        assert_eq!(
            format_date_long(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
            "05 de março de 2024"
        );
    }

    #[test]
    fn relative_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(format_relative_date(today, today), "Hoje");
        assert_eq!(format_relative_date(today.pred_opt().unwrap(), today), "Ontem");
        assert_eq!(
            format_relative_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), today),
            "01/03/2024"
        );
    }
}
