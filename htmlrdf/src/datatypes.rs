//! Picking an XSD datatype for a lexical form.
//!
//! Both engines infer datatypes for `<time>` (and Microdata for `<meter>`) by
//! trying candidate datatypes in a fixed order and taking the first whose
//! lexical space accepts the value.

use std::str::FromStr;

use oxrdf::NamedNodeRef;
use oxrdf::vocab::xsd;

type Trial = (fn(&str) -> bool, NamedNodeRef<'static>);

fn accepts<T: FromStr>(value: &str) -> bool {
    T::from_str(value).is_ok()
}

/// Order used by RDFa-in-HTML for `@datetime` and `<time>` content.
const RDFA_TEMPORAL: &[Trial] = &[
    (accepts::<oxsdatatypes::Duration>, xsd::DURATION),
    (accepts::<oxsdatatypes::DateTime>, xsd::DATE_TIME),
    (accepts::<oxsdatatypes::Date>, xsd::DATE),
    (accepts::<oxsdatatypes::Time>, xsd::TIME),
    (accepts::<oxsdatatypes::GYearMonth>, xsd::G_YEAR_MONTH),
    (accepts::<oxsdatatypes::GYear>, xsd::G_YEAR),
];

/// Order used by Microdata for `<time>` values.
const MICRODATA_TEMPORAL: &[Trial] = &[
    (accepts::<oxsdatatypes::Date>, xsd::DATE),
    (accepts::<oxsdatatypes::Time>, xsd::TIME),
    (accepts::<oxsdatatypes::DateTime>, xsd::DATE_TIME),
    (accepts::<oxsdatatypes::GYearMonth>, xsd::G_YEAR_MONTH),
    (accepts::<oxsdatatypes::GYear>, xsd::G_YEAR),
    (accepts::<oxsdatatypes::Duration>, xsd::DURATION),
];

const NUMERIC: &[Trial] = &[
    (accepts::<oxsdatatypes::Integer>, xsd::INTEGER),
    (accepts::<oxsdatatypes::Decimal>, xsd::DECIMAL),
];

fn first_match(trials: &[Trial], value: &str) -> Option<NamedNodeRef<'static>> {
    trials
        .iter()
        .find_map(|(matches, datatype)| matches(value).then_some(*datatype))
}

pub fn rdfa_temporal_datatype(value: &str) -> Option<NamedNodeRef<'static>> {
    first_match(RDFA_TEMPORAL, value)
}

pub fn microdata_temporal_datatype(value: &str) -> Option<NamedNodeRef<'static>> {
    first_match(MICRODATA_TEMPORAL, value)
}

pub fn numeric_datatype(value: &str) -> Option<NamedNodeRef<'static>> {
    first_match(NUMERIC, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2009-05-10", Some(xsd::DATE))]
    #[case("12:30:00", Some(xsd::TIME))]
    #[case("2009-05-10T12:30:00Z", Some(xsd::DATE_TIME))]
    #[case("2009-05", Some(xsd::G_YEAR_MONTH))]
    #[case("2009", Some(xsd::G_YEAR))]
    #[case("P3D", Some(xsd::DURATION))]
    #[case("last tuesday", None)]
    fn microdata_time(#[case] value: &str, #[case] expected: Option<NamedNodeRef<'static>>) {
        assert_eq!(microdata_temporal_datatype(value), expected);
    }

    #[rstest]
    #[case("P1Y2M", Some(xsd::DURATION))]
    #[case("2012-03-18T00:00:00Z", Some(xsd::DATE_TIME))]
    #[case("2012-03-18", Some(xsd::DATE))]
    #[case("not a date", None)]
    fn rdfa_time(#[case] value: &str, #[case] expected: Option<NamedNodeRef<'static>>) {
        assert_eq!(rdfa_temporal_datatype(value), expected);
    }

    #[rstest]
    #[case("3", Some(xsd::INTEGER))]
    #[case("3.5", Some(xsd::DECIMAL))]
    #[case("three", None)]
    fn meter(#[case] value: &str, #[case] expected: Option<NamedNodeRef<'static>>) {
        assert_eq!(numeric_datatype(value), expected);
    }
}
