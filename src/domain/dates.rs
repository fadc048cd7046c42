//! Publication timestamps: parsing the CMS format and pt-BR display forms.

use chrono_tz::Tz;
use time::{
    OffsetDateTime, format_description::FormatItem, format_description::well_known::Rfc3339,
    macros::format_description,
};

use super::error::DomainError;
use crate::util::timezone;

/// The CMS emits offsets without a colon, e.g. `2021-03-25T19:25:28+0000`.
const CMS_TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
);

const MONTHS_PT_BR: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

pub fn parse_cms_timestamp(value: &str) -> Result<OffsetDateTime, DomainError> {
    let trimmed = value.trim();
    OffsetDateTime::parse(trimmed, CMS_TIMESTAMP_FORMAT)
        .or_else(|_| OffsetDateTime::parse(trimmed, &Rfc3339))
        .map_err(|_| DomainError::timestamp(value))
}

/// Listing card form: `25 mar 2021`.
pub fn format_card_date(instant: OffsetDateTime, tz: Tz) -> String {
    let date = timezone::localized_date(instant, tz);
    format!(
        "{:02} {} {}",
        date.day(),
        month_abbreviation(date.month()),
        date.year()
    )
}

/// Post page form: `25 de mar de 2021`.
pub fn format_detail_date(instant: OffsetDateTime, tz: Tz) -> String {
    let date = timezone::localized_date(instant, tz);
    format!(
        "{} de {} de {}",
        date.day(),
        month_abbreviation(date.month()),
        date.year()
    )
}

/// Machine-readable form for `<time datetime>`.
pub fn format_iso(instant: OffsetDateTime, tz: Tz) -> String {
    timezone::localized_datetime(instant, tz).to_rfc3339()
}

fn month_abbreviation(month: time::Month) -> &'static str {
    MONTHS_PT_BR[usize::from(u8::from(month)) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cms_offsets_without_colon() {
        let parsed = parse_cms_timestamp("2021-03-25T19:25:28+0000").expect("valid timestamp");
        assert_eq!(parsed.unix_timestamp(), 1_616_700_328);
    }

    #[test]
    fn parses_rfc3339_offsets() {
        let parsed = parse_cms_timestamp("2021-03-25T16:25:28-03:00").expect("valid timestamp");
        assert_eq!(parsed.unix_timestamp(), 1_616_700_328);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_cms_timestamp("yesterday"),
            Err(DomainError::Timestamp { .. })
        ));
    }

    #[test]
    fn formats_card_and_detail_dates_in_portuguese() {
        let instant = parse_cms_timestamp("2021-03-05T19:25:28+0000").expect("valid timestamp");
        let tz = chrono_tz::America::Sao_Paulo;

        assert_eq!(format_card_date(instant, tz), "05 mar 2021");
        assert_eq!(format_detail_date(instant, tz), "5 de mar de 2021");
    }

    #[test]
    fn localizes_before_formatting() {
        let instant = parse_cms_timestamp("2021-01-01T01:00:00+0000").expect("valid timestamp");

        assert_eq!(
            format_card_date(instant, chrono_tz::America::Sao_Paulo),
            "31 dez 2020"
        );
        assert_eq!(format_card_date(instant, chrono_tz::UTC), "01 jan 2021");
    }
}
