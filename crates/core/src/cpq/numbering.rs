use chrono::NaiveDate;

/// Human-readable document numbers of the form `PREFIX-YYYYMMDD-NNN`.
///
/// The sequence restarts at 001 every day. Suffixes past 999 simply widen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailySequence {
    prefix: &'static str,
}

pub const QUOTATION_NUMBERS: DailySequence = DailySequence::new("QUO");
pub const ORDER_NUMBERS: DailySequence = DailySequence::new("ORD");

impl DailySequence {
    pub const fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    /// Common prefix shared by every number issued on `date`, including the trailing dash.
    pub fn day_prefix(&self, date: NaiveDate) -> String {
        format!("{}-{}-", self.prefix, date.format("%Y%m%d"))
    }

    /// Number following `latest`, the highest number already issued on `date`.
    pub fn next(&self, date: NaiveDate, latest: Option<&str>) -> String {
        let day_prefix = self.day_prefix(date);
        let next = latest
            .and_then(|number| number.strip_prefix(day_prefix.as_str()))
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .map_or(1, |current| current + 1);
        format!("{day_prefix}{next:03}")
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ORDER_NUMBERS, QUOTATION_NUMBERS};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).expect("valid date")
    }

    #[test]
    fn first_number_of_the_day_starts_at_one() {
        assert_eq!(QUOTATION_NUMBERS.next(day(), None), "QUO-20260307-001");
        assert_eq!(ORDER_NUMBERS.next(day(), None), "ORD-20260307-001");
    }

    #[test]
    fn increments_latest_number_of_the_same_day() {
        assert_eq!(QUOTATION_NUMBERS.next(day(), Some("QUO-20260307-041")), "QUO-20260307-042");
        assert_eq!(QUOTATION_NUMBERS.next(day(), Some("QUO-20260307-999")), "QUO-20260307-1000");
    }

    #[test]
    fn sequence_resets_when_latest_belongs_to_another_day() {
        assert_eq!(QUOTATION_NUMBERS.next(day(), Some("QUO-20260306-017")), "QUO-20260307-001");
        assert_eq!(QUOTATION_NUMBERS.next(day(), Some("garbage")), "QUO-20260307-001");
    }
}
