use chrono::NaiveDateTime;

use crate::error::{Result, SubsetError};

/// Parses GTFS `YYYYMMDD` date strings into timestamps at midnight UTC.
pub struct DateParser;

impl DateParser {
    pub fn parse(value: &str) -> Result<NaiveDateTime> {
        let trimmed = value.trim();
        if trimmed.len() != 8 || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(SubsetError::BadDate(value.to_string()));
        }
        let date = chrono::NaiveDate::parse_from_str(trimmed, "%Y%m%d")
            .map_err(|_| SubsetError::BadDate(value.to_string()))?;
        Ok(date.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
    }

    pub fn parse_batch<I, S>(values: I) -> Result<Vec<NaiveDateTime>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|value| Self::parse(value.as_ref()))
            .collect()
    }

    pub fn format(timestamp: &NaiveDateTime) -> String {
        timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_date() {
        let parsed = DateParser::parse("20221002").expect("parse");
        assert_eq!(DateParser::format(&parsed), "2022-10-02 00:00:00");
    }

    #[test]
    fn rejects_malformed_date() {
        assert!(DateParser::parse("2022-10-02").is_err());
        assert!(DateParser::parse("202210").is_err());
        assert!(DateParser::parse("20221332").is_err());
        assert!(DateParser::parse("abcdefgh").is_err());
    }

    #[test]
    fn parses_batch() {
        let parsed = DateParser::parse_batch(["20221002", "20221003"]).expect("parse batch");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn batch_fails_on_first_bad_value() {
        assert!(DateParser::parse_batch(["20221002", "bad"]).is_err());
    }
}
