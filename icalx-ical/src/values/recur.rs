use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::combinator::{cut, map, map_res, opt};
use nom::error::context;
use nom::multi::separated_list1;
use nom::sequence::{pair, preceded};

use crate::grammar::semicolon;
use crate::values::date_time::DateTime;
use crate::values::integer::Integer;
use crate::values::list::List;
use crate::{impl_icalendar_entity_traits, ICalendarEntity, ParserError, ParserInput, ParserResult};

#[macro_export]
macro_rules! build_ical_param {
    ($struct_name:ident, $key_str:expr, $value_parser:expr, $value_type:ty $(,)*) => {
        #[derive(Debug, Clone, Eq, PartialEq)]
        pub struct $struct_name(pub $value_type);

        impl ICalendarEntity for $struct_name {
            fn parse_ical(input: ParserInput) -> ParserResult<Self> {
                map(pair(tag($key_str), preceded(tag("="), cut($value_parser))), |(_key, value)| Self(value))(input)
            }

            fn render_ical(&self) -> String {
                format!("{}={}", $key_str, self.0.render_ical())
            }
        }

        impl_icalendar_entity_traits!($struct_name);
    };
}

build_ical_param!(FreqParam, "FREQ", Frequency::parse_ical, Frequency);
build_ical_param!(UntilParam, "UNTIL", DateTime::parse_ical, DateTime);
build_ical_param!(CountParam, "COUNT", count, Integer);
build_ical_param!(IntervalParam, "INTERVAL", interval, Integer);
build_ical_param!(BysecondParam, "BYSECOND", byseclist, List<Integer>);
build_ical_param!(ByminuteParam, "BYMINUTE", byminlist, List<Integer>);
build_ical_param!(ByhourParam, "BYHOUR", byhrlist, List<Integer>);
build_ical_param!(BydayParam, "BYDAY", bywdaylist, List<WeekDayNum>);
build_ical_param!(BymonthdayParam, "BYMONTHDAY", bymodaylist, List<Integer>);
build_ical_param!(ByyeardayParam, "BYYEARDAY", byyrdaylist, List<Integer>);
build_ical_param!(ByweeknoParam, "BYWEEKNO", bywknolist, List<Integer>);
build_ical_param!(BymonthParam, "BYMONTH", bymolist, List<Integer>);
build_ical_param!(BysetposParam, "BYSETPOS", bysplist, List<Integer>);
build_ical_param!(WkstParam, "WKST", WeekDay::parse_ical, WeekDay);

enum RecurRulePart {
    Freq(FreqParam),
    Until(UntilParam),
    Count(CountParam),
    Interval(IntervalParam),
    Bysecond(BysecondParam),
    Byminute(ByminuteParam),
    Byhour(ByhourParam),
    Byday(BydayParam),
    Bymonthday(BymonthdayParam),
    Byyearday(ByyeardayParam),
    Byweekno(ByweeknoParam),
    Bymonth(BymonthParam),
    Bysetpos(BysetposParam),
    Wkst(WkstParam),
}

impl ICalendarEntity for RecurRulePart {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "RECUR-RULE-PART",
            alt((
                map(FreqParam::parse_ical, Self::Freq),
                map(UntilParam::parse_ical, Self::Until),
                map(CountParam::parse_ical, Self::Count),
                map(IntervalParam::parse_ical, Self::Interval),
                map(BysecondParam::parse_ical, Self::Bysecond),
                map(ByminuteParam::parse_ical, Self::Byminute),
                map(ByhourParam::parse_ical, Self::Byhour),
                map(BydayParam::parse_ical, Self::Byday),
                map(BymonthdayParam::parse_ical, Self::Bymonthday),
                map(ByyeardayParam::parse_ical, Self::Byyearday),
                map(ByweeknoParam::parse_ical, Self::Byweekno),
                map(BymonthParam::parse_ical, Self::Bymonth),
                map(BysetposParam::parse_ical, Self::Bysetpos),
                map(WkstParam::parse_ical, Self::Wkst),
            )),
        )(input)
    }

    fn render_ical(&self) -> String {
        match self {
            Self::Freq(param) => param.render_ical(),
            Self::Until(param) => param.render_ical(),
            Self::Count(param) => param.render_ical(),
            Self::Interval(param) => param.render_ical(),
            Self::Bysecond(param) => param.render_ical(),
            Self::Byminute(param) => param.render_ical(),
            Self::Byhour(param) => param.render_ical(),
            Self::Byday(param) => param.render_ical(),
            Self::Bymonthday(param) => param.render_ical(),
            Self::Byyearday(param) => param.render_ical(),
            Self::Byweekno(param) => param.render_ical(),
            Self::Bymonth(param) => param.render_ical(),
            Self::Bysetpos(param) => param.render_ical(),
            Self::Wkst(param) => param.render_ical(),
        }
    }
}

fn interval(input: ParserInput) -> ParserResult<Integer> {
    Integer::parse_unsigned_m_n(1, 9, 1, i64::MAX)(input)
}

fn count(input: ParserInput) -> ParserResult<Integer> {
    Integer::parse_unsigned_m_n(1, 9, 0, i64::MAX)(input)
}

fn byseclist(input: ParserInput) -> ParserResult<List<Integer>> {
    map(separated_list1(crate::grammar::comma, Integer::parse_unsigned_m_n(1, 2, 0, 60)), List)(input)
}

fn byminlist(input: ParserInput) -> ParserResult<List<Integer>> {
    map(separated_list1(crate::grammar::comma, Integer::parse_unsigned_m_n(1, 2, 0, 59)), List)(input)
}

fn byhrlist(input: ParserInput) -> ParserResult<List<Integer>> {
    map(separated_list1(crate::grammar::comma, Integer::parse_unsigned_m_n(1, 2, 0, 23)), List)(input)
}

fn bywdaylist(input: ParserInput) -> ParserResult<List<WeekDayNum>> {
    map(separated_list1(crate::grammar::comma, WeekDayNum::parse_ical), List)(input)
}

fn bymodaylist(input: ParserInput) -> ParserResult<List<Integer>> {
    map(separated_list1(crate::grammar::comma, Integer::parse_signed_m_n(1, 2, 1, 31)), List)(input)
}

fn byyrdaylist(input: ParserInput) -> ParserResult<List<Integer>> {
    map(separated_list1(crate::grammar::comma, Integer::parse_signed_m_n(1, 3, 1, 366)), List)(input)
}

fn bywknolist(input: ParserInput) -> ParserResult<List<Integer>> {
    map(separated_list1(crate::grammar::comma, Integer::parse_signed_m_n(1, 2, 1, 53)), List)(input)
}

fn bymolist(input: ParserInput) -> ParserResult<List<Integer>> {
    map(separated_list1(crate::grammar::comma, Integer::parse_unsigned_m_n(1, 2, 1, 12)), List)(input)
}

fn bysplist(input: ParserInput) -> ParserResult<List<Integer>> {
    map(separated_list1(crate::grammar::comma, Integer::parse_signed_m_n(1, 3, 1, 366)), List)(input)
}

/// Supported frequencies round-trip for all seven RFC 5545 values; `icalx-core` rejects
/// expansion of anything beyond `DAILY`/`WEEKLY`/`MONTHLY`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ICalendarEntity for Frequency {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "FREQ",
            alt((
                map(tag("SECONDLY"), |_| Self::Secondly),
                map(tag("MINUTELY"), |_| Self::Minutely),
                map(tag("HOURLY"), |_| Self::Hourly),
                map(tag("DAILY"), |_| Self::Daily),
                map(tag("WEEKLY"), |_| Self::Weekly),
                map(tag("MONTHLY"), |_| Self::Monthly),
                map(tag("YEARLY"), |_| Self::Yearly),
            )),
        )(input)
    }

    fn render_ical(&self) -> String {
        match self {
            Self::Secondly => String::from("SECONDLY"),
            Self::Minutely => String::from("MINUTELY"),
            Self::Hourly => String::from("HOURLY"),
            Self::Daily => String::from("DAILY"),
            Self::Weekly => String::from("WEEKLY"),
            Self::Monthly => String::from("MONTHLY"),
            Self::Yearly => String::from("YEARLY"),
        }
    }
}

impl_icalendar_entity_traits!(Frequency);

impl Frequency {
    pub fn is_expansion_supported(&self) -> bool {
        matches!(self, Self::Daily | Self::Weekly | Self::Monthly)
    }
}

/// `weekdaynum = [[plus / minus] ordwk] weekday`
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct WeekDayNum(pub Option<Integer>, pub WeekDay);

impl ICalendarEntity for WeekDayNum {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "WEEKDAYNUM",
            |input| {
                let (remaining, ordwk) = opt(Integer::parse_signed_m_n(1, 2, 1, 53))(input)?;
                let (remaining, weekday) = WeekDay::parse_ical(remaining)?;

                Ok((remaining, WeekDayNum(ordwk, weekday)))
            },
        )(input)
    }

    fn render_ical(&self) -> String {
        let mut output = String::new();

        if let Some(ordwk) = self.0 {
            output.push_str(&ordwk.render_ical());
        }

        output.push_str(&self.1.render_ical());
        output
    }

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl_icalendar_entity_traits!(WeekDayNum);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum WeekDay {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl ICalendarEntity for WeekDay {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "WEEKDAY",
            alt((
                map(tag("SU"), |_| Self::Sunday),
                map(tag("MO"), |_| Self::Monday),
                map(tag("TU"), |_| Self::Tuesday),
                map(tag("WE"), |_| Self::Wednesday),
                map(tag("TH"), |_| Self::Thursday),
                map(tag("FR"), |_| Self::Friday),
                map(tag("SA"), |_| Self::Saturday),
            )),
        )(input)
    }

    fn render_ical(&self) -> String {
        match self {
            Self::Sunday => String::from("SU"),
            Self::Monday => String::from("MO"),
            Self::Tuesday => String::from("TU"),
            Self::Wednesday => String::from("WE"),
            Self::Thursday => String::from("TH"),
            Self::Friday => String::from("FR"),
            Self::Saturday => String::from("SA"),
        }
    }
}

impl_icalendar_entity_traits!(WeekDay);

impl WeekDay {
    pub fn to_chrono_weekday(self) -> chrono::Weekday {
        match self {
            Self::Sunday => chrono::Weekday::Sun,
            Self::Monday => chrono::Weekday::Mon,
            Self::Tuesday => chrono::Weekday::Tue,
            Self::Wednesday => chrono::Weekday::Wed,
            Self::Thursday => chrono::Weekday::Thu,
            Self::Friday => chrono::Weekday::Fri,
            Self::Saturday => chrono::Weekday::Sat,
        }
    }
}

/// A decoded `RRULE` value. `FREQ` is required, `INTERVAL` defaults to 1, `COUNT`/`UNTIL` are
/// mutually exclusive, `WKST` defaults to Monday.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Recur {
    pub freq: Option<FreqParam>,
    pub until: Option<UntilParam>,
    pub count: Option<CountParam>,
    pub interval: Option<IntervalParam>,
    pub bysecond: Option<BysecondParam>,
    pub byminute: Option<ByminuteParam>,
    pub byhour: Option<ByhourParam>,
    pub byday: Option<BydayParam>,
    pub bymonthday: Option<BymonthdayParam>,
    pub byyearday: Option<ByyeardayParam>,
    pub byweekno: Option<ByweeknoParam>,
    pub bymonth: Option<BymonthParam>,
    pub bysetpos: Option<BysetposParam>,
    pub wkst: Option<WkstParam>,
}

impl ICalendarEntity for Recur {
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        context(
            "RECUR",
            map_res(separated_list1(semicolon, RecurRulePart::parse_ical), |parts| {
                let mut recur = Recur::default();

                for part in parts {
                    recur.insert(part);
                }

                recur.validate().map_err(|error| ParserError::new(error, input))?;

                Ok(recur)
            }),
        )(input)
    }

    fn render_ical(&self) -> String {
        fn push<T: ICalendarEntity>(property: &Option<T>, parts: &mut Vec<String>) {
            if let Some(property) = property {
                parts.push(property.render_ical());
            }
        }

        let mut parts: Vec<String> = Vec::new();

        push(&self.byday, &mut parts);
        push(&self.byhour, &mut parts);
        push(&self.byminute, &mut parts);
        push(&self.bymonth, &mut parts);
        push(&self.bymonthday, &mut parts);
        push(&self.bysecond, &mut parts);
        push(&self.bysetpos, &mut parts);
        push(&self.byweekno, &mut parts);
        push(&self.byyearday, &mut parts);
        push(&self.count, &mut parts);
        push(&self.freq, &mut parts);
        push(&self.interval, &mut parts);
        push(&self.until, &mut parts);
        push(&self.wkst, &mut parts);

        parts.join(";")
    }

    fn validate(&self) -> Result<(), String> {
        if self.freq.is_none() {
            return Err(String::from("FREQ required"));
        }

        if self.count.is_some() && self.until.is_some() {
            return Err(String::from("COUNT and UNTIL are mutually exclusive"));
        }

        if let Some(IntervalParam(Integer(interval))) = &self.interval {
            if *interval < 1 {
                return Err(String::from("INTERVAL must be at least 1"));
            }
        }

        if let Some(BydayParam(days)) = &self.byday {
            let monthly = matches!(self.freq, Some(FreqParam(Frequency::Monthly)));

            if !monthly && days.iter().any(|day| day.0.is_some()) {
                return Err(String::from("BYDAY ordinal prefix is only valid with FREQ=MONTHLY"));
            }
        }

        Ok(())
    }
}

impl Recur {
    fn insert(&mut self, part: RecurRulePart) {
        match part {
            RecurRulePart::Freq(param) => self.freq = Some(param),
            RecurRulePart::Until(param) => self.until = Some(param),
            RecurRulePart::Count(param) => self.count = Some(param),
            RecurRulePart::Interval(param) => self.interval = Some(param),
            RecurRulePart::Bysecond(param) => self.bysecond = Some(param),
            RecurRulePart::Byminute(param) => self.byminute = Some(param),
            RecurRulePart::Byhour(param) => self.byhour = Some(param),
            RecurRulePart::Byday(param) => self.byday = Some(param),
            RecurRulePart::Bymonthday(param) => self.bymonthday = Some(param),
            RecurRulePart::Byyearday(param) => self.byyearday = Some(param),
            RecurRulePart::Byweekno(param) => self.byweekno = Some(param),
            RecurRulePart::Bymonth(param) => self.bymonth = Some(param),
            RecurRulePart::Bysetpos(param) => self.bysetpos = Some(param),
            RecurRulePart::Wkst(param) => self.wkst = Some(param),
        };
    }

    pub fn interval_or_default(&self) -> i64 {
        self.interval.as_ref().map(|IntervalParam(Integer(value))| *value).unwrap_or(1)
    }

    pub fn wkst_or_default(&self) -> WeekDay {
        self.wkst.as_ref().map(|WkstParam(day)| *day).unwrap_or(WeekDay::Monday)
    }
}

impl_icalendar_entity_traits!(Recur);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::assert_parser_output;

    #[test]
    fn parse_ical() {
        assert_parser_output!(
            Recur::parse_ical("FREQ=WEEKLY;INTERVAL=1;BYDAY=MO TESTING".into()),
            (
                " TESTING",
                Recur {
                    freq: Some(FreqParam(Frequency::Weekly)),
                    interval: Some(IntervalParam(Integer(1))),
                    byday: Some(BydayParam(List(vec![WeekDayNum(None, WeekDay::Monday)]))),
                    ..Recur::default()
                },
            ),
        );

        assert!(Recur::parse_ical("OTHER".into()).is_err());
        assert!(Recur::parse_ical(":".into()).is_err());
    }

    #[test]
    fn validate_requires_freq() {
        assert_eq!(Recur::default().validate(), Err(String::from("FREQ required")));
    }

    #[test]
    fn validate_rejects_count_and_until_together() {
        let recur = Recur {
            freq: Some(FreqParam(Frequency::Daily)),
            count: Some(CountParam(Integer(5))),
            until: Some(UntilParam(DateTime::LocalDate(chrono::NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()))),
            ..Recur::default()
        };

        assert_eq!(recur.validate(), Err(String::from("COUNT and UNTIL are mutually exclusive")));
    }

    #[test]
    fn validate_rejects_byday_ordinal_outside_monthly() {
        let recur = Recur {
            freq: Some(FreqParam(Frequency::Weekly)),
            byday: Some(BydayParam(List(vec![WeekDayNum(Some(Integer(-1)), WeekDay::Sunday)]))),
            ..Recur::default()
        };

        assert_eq!(recur.validate(), Err(String::from("BYDAY ordinal prefix is only valid with FREQ=MONTHLY")));
    }

    #[test]
    fn render_ical_orders_parts_alphabetically_by_part_name() {
        let recur = Recur {
            freq: Some(FreqParam(Frequency::Daily)),
            count: Some(CountParam(Integer(10))),
            interval: Some(IntervalParam(Integer(2))),
            ..Recur::default()
        };

        assert_eq!(recur.render_ical(), "COUNT=10;FREQ=DAILY;INTERVAL=2");
    }
}
