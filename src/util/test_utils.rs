use crate::{codegen::labels::LabelCounter, translator};

/// Name every test unit is compiled under.
pub const TEST_UNIT: &str = "Test.jack";

/// Translates `src` with a fresh label counter, formatting any error.
pub fn run_unit(src: &str) -> Result<String, String> {
    translator::translate(TEST_UNIT, src, &mut LabelCounter::new())
        .map(translator::CompiledUnit::into_string)
        .map_err(|error| error.to_string())
}

pub enum Assertion {
    VmOk(&'static str),
    ExpectedError(&'static str),
}

#[track_caller]
pub fn run_assertion(assertion: Assertion, actual: Result<String, String>) {
    match (assertion, actual) {
        (Assertion::VmOk(expected), Ok(actual)) => {
            ::pretty_assertions::assert_eq!(actual, expected);
        }
        (Assertion::VmOk(_), Err(error)) => panic!("unexpected error: {error}"),
        (Assertion::ExpectedError(expected), Err(actual)) => {
            ::pretty_assertions::assert_eq!(actual, expected);
        }
        (Assertion::ExpectedError(expected), Ok(code)) => {
            panic!("expected error {expected:?}, but translation succeeded:\n{code}")
        }
    }
}

macro_rules! vm_tests {
    (
        $(
            fn $test_name:ident() {
                let source = $source:literal;
                let $assertion:ident = $expected:literal;
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let actual = crate::util::test_utils::run_unit(::indoc::indoc! { $source });
                crate::util::test_utils::run_assertion(
                    vm_tests!(@@assertion, $assertion, $expected),
                    actual,
                );
            }
        )*
    };

    (@@assertion, vm_ok, $expected:literal) => {
        crate::util::test_utils::Assertion::VmOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_error, $expected:literal) => {
        crate::util::test_utils::Assertion::ExpectedError($expected)
    };
}
pub(crate) use vm_tests;
