//! Typed access to an operator's argument list.
//!
//! [`ArgumentHelper`] looks arguments up by exact name (the first occurrence
//! wins when a name is repeated) and converts their payload to the requested
//! Rust type through [`ArgType`].
//!
//! Absence is never an error: single lookups fall back to the caller's
//! default and repeated lookups to an empty vector. Asking for the wrong kind
//! is a bug in the operator and panics; the `try_*` variants report it as
//! [`Error::ArgumentKind`] instead.

use crate::definition::{ArgValue, Argument};
use crate::error::{Error, Result};

/// A Rust type that can be read out of an [`Argument`].
pub trait ArgType: Sized {
    /// Field name of the single payload, used in diagnostics.
    const SINGLE_FIELD: &'static str;
    /// Field name of the repeated payload, used in diagnostics.
    const REPEATED_FIELD: &'static str;

    /// Extracts a single value, or `None` on a kind mismatch.
    fn from_single(value: &ArgValue) -> Option<Self>;

    /// Extracts repeated values, or `None` on a kind mismatch.
    fn from_repeated(value: &ArgValue) -> Option<Vec<Self>>;

    /// Wraps a single value into its payload.
    fn into_single(self) -> ArgValue;

    /// Wraps repeated values into their payload.
    fn into_repeated(values: Vec<Self>) -> ArgValue;
}

macro_rules! float_arg_type {
    ($t:ty) => {
        impl ArgType for $t {
            const SINGLE_FIELD: &'static str = "f";
            const REPEATED_FIELD: &'static str = "floats";

            #[allow(clippy::cast_lossless)]
            fn from_single(value: &ArgValue) -> Option<Self> {
                match value {
                    ArgValue::Float(f) => Some(*f as $t),
                    _ => None,
                }
            }

            #[allow(clippy::cast_lossless)]
            fn from_repeated(value: &ArgValue) -> Option<Vec<Self>> {
                match value {
                    ArgValue::Floats(fs) => Some(fs.iter().map(|f| *f as $t).collect()),
                    _ => None,
                }
            }

            #[allow(clippy::cast_possible_truncation)]
            fn into_single(self) -> ArgValue {
                ArgValue::Float(self as f32)
            }

            #[allow(clippy::cast_possible_truncation)]
            fn into_repeated(values: Vec<Self>) -> ArgValue {
                ArgValue::Floats(values.into_iter().map(|v| v as f32).collect())
            }
        }
    };
}

float_arg_type!(f32);
float_arg_type!(f64);

macro_rules! int_arg_type {
    ($t:ty) => {
        impl ArgType for $t {
            const SINGLE_FIELD: &'static str = "i";
            const REPEATED_FIELD: &'static str = "ints";

            fn from_single(value: &ArgValue) -> Option<Self> {
                match value {
                    ArgValue::Int(i) => <$t>::try_from(*i).ok(),
                    _ => None,
                }
            }

            fn from_repeated(value: &ArgValue) -> Option<Vec<Self>> {
                match value {
                    ArgValue::Ints(is) => is.iter().map(|i| <$t>::try_from(*i).ok()).collect(),
                    _ => None,
                }
            }

            /// Values above `i64::MAX` saturate.
            fn into_single(self) -> ArgValue {
                ArgValue::Int(i64::try_from(self).unwrap_or(i64::MAX))
            }

            fn into_repeated(values: Vec<Self>) -> ArgValue {
                ArgValue::Ints(
                    values
                        .into_iter()
                        .map(|v| i64::try_from(v).unwrap_or(i64::MAX))
                        .collect(),
                )
            }
        }
    };
}

int_arg_type!(i32);
int_arg_type!(i64);
int_arg_type!(usize);

impl ArgType for bool {
    const SINGLE_FIELD: &'static str = "i";
    const REPEATED_FIELD: &'static str = "ints";

    fn from_single(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    fn from_repeated(value: &ArgValue) -> Option<Vec<Self>> {
        match value {
            ArgValue::Ints(is) => Some(is.iter().map(|i| *i != 0).collect()),
            _ => None,
        }
    }

    fn into_single(self) -> ArgValue {
        ArgValue::Int(i64::from(self))
    }

    fn into_repeated(values: Vec<Self>) -> ArgValue {
        ArgValue::Ints(values.into_iter().map(i64::from).collect())
    }
}

impl ArgType for String {
    const SINGLE_FIELD: &'static str = "s";
    const REPEATED_FIELD: &'static str = "strings";

    fn from_single(value: &ArgValue) -> Option<Self> {
        match value {
            ArgValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn from_repeated(value: &ArgValue) -> Option<Vec<Self>> {
        match value {
            ArgValue::Strings(ss) => Some(ss.clone()),
            _ => None,
        }
    }

    fn into_single(self) -> ArgValue {
        ArgValue::Str(self)
    }

    fn into_repeated(values: Vec<Self>) -> ArgValue {
        ArgValue::Strings(values)
    }
}

/// Builds an argument from any [`ArgType`] value.
///
/// ```rust
/// use briny_net::argument::make_argument;
/// use briny_net::definition::Argument;
///
/// assert_eq!(make_argument("arg", 1i64), Argument::int("arg", 1));
/// ```
pub fn make_argument<T: ArgType>(name: impl Into<String>, value: T) -> Argument {
    Argument::new(name, value.into_single())
}

/// Builds a repeated argument from any [`ArgType`] values.
pub fn make_repeated_argument<T: ArgType>(name: impl Into<String>, values: Vec<T>) -> Argument {
    Argument::new(name, T::into_repeated(values))
}

/// Read-only view over an argument list.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentHelper<'a> {
    args: &'a [Argument],
}

impl<'a> ArgumentHelper<'a> {
    pub fn new(args: &'a [Argument]) -> Self {
        Self { args }
    }

    fn find(&self, name: &str) -> Option<&'a Argument> {
        self.args.iter().find(|a| a.name == name)
    }

    /// Whether an argument called `name` exists.
    pub fn has_argument(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Reads a single value, returning `default` when the argument is absent.
    ///
    /// # Errors
    /// [`Error::ArgumentKind`] when the argument holds a different kind.
    pub fn try_single_argument<T: ArgType>(&self, name: &str, default: T) -> Result<T> {
        match self.find(name) {
            None => Ok(default),
            Some(arg) => T::from_single(&arg.value).ok_or_else(|| Error::ArgumentKind {
                name: name.to_string(),
                expected: T::SINGLE_FIELD,
                found: arg.value.field_name(),
            }),
        }
    }

    /// Reads repeated values, returning an empty vector when absent.
    ///
    /// # Errors
    /// [`Error::ArgumentKind`] when the argument holds a different kind.
    pub fn try_repeated_argument<T: ArgType>(&self, name: &str) -> Result<Vec<T>> {
        match self.find(name) {
            None => Ok(Vec::new()),
            Some(arg) => T::from_repeated(&arg.value).ok_or_else(|| Error::ArgumentKind {
                name: name.to_string(),
                expected: T::REPEATED_FIELD,
                found: arg.value.field_name(),
            }),
        }
    }

    /// Reads a single value, returning `default` when the argument is absent.
    ///
    /// # Panics
    /// Panics if the argument exists but holds a different kind.
    pub fn single_argument<T: ArgType>(&self, name: &str, default: T) -> T {
        match self.try_single_argument(name, default) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    /// Reads repeated values, returning an empty vector when absent.
    ///
    /// # Panics
    /// Panics if the argument exists but holds a different kind.
    pub fn repeated_argument<T: ArgType>(&self, name: &str) -> Vec<T> {
        match self.try_repeated_argument(name) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Vec<Argument> {
        vec![
            Argument::float("arg0", 0.1),
            Argument::ints("arg1", [1, 2]),
            Argument::string("arg2", "argstring"),
            Argument::int("arg0", 7),
            Argument::int("big", i64::MAX),
        ]
    }

    #[test]
    fn reads_present_values_and_defaults() {
        let args = args();
        let helper = ArgumentHelper::new(&args);
        assert!((helper.single_argument::<f32>("arg0", 0.0) - 0.1).abs() < 1e-7);
        assert_eq!(helper.repeated_argument::<i32>("arg1"), vec![1, 2]);
        assert_eq!(helper.single_argument("arg2", String::from("default")), "argstring");
        assert_eq!(helper.single_argument::<f32>("missing", 0.5), 0.5);
        assert!(helper.repeated_argument::<String>("missing").is_empty());
    }

    #[test]
    fn first_duplicate_wins() {
        let args = args();
        let helper = ArgumentHelper::new(&args);
        // `arg0` appears as a float first and as an int second.
        assert!(matches!(
            helper.try_single_argument::<i64>("arg0", 0),
            Err(Error::ArgumentKind { expected: "i", found: "f", .. })
        ));
    }

    #[test]
    fn overflowing_narrowing_is_a_kind_error() {
        let args = args();
        let helper = ArgumentHelper::new(&args);
        assert_eq!(helper.try_single_argument::<i64>("big", 0).unwrap(), i64::MAX);
        assert!(helper.try_single_argument::<i32>("big", 0).is_err());
    }

    #[test]
    #[should_panic(expected = "expected ints")]
    fn wrong_repeated_kind_panics() {
        let args = vec![Argument::floats("arg0", [0.1])];
        ArgumentHelper::new(&args).repeated_argument::<i32>("arg0");
    }

    #[test]
    fn bool_reads_from_int_payload() {
        let args = vec![make_argument("flag", true), make_repeated_argument("mask", vec![true, false])];
        let helper = ArgumentHelper::new(&args);
        assert!(helper.single_argument("flag", false));
        assert_eq!(helper.repeated_argument::<bool>("mask"), vec![true, false]);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn usize_above_i64_range_saturates() {
        let args = vec![
            make_argument("n", usize::MAX),
            make_repeated_argument("dims", vec![3_usize, usize::MAX]),
        ];
        assert_eq!(args[0], Argument::int("n", i64::MAX));
        let helper = ArgumentHelper::new(&args);
        assert_eq!(helper.try_single_argument::<i64>("n", 0).unwrap(), i64::MAX);
        assert_eq!(helper.repeated_argument::<i64>("dims"), vec![3, i64::MAX]);
    }
}
