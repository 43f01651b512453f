//! Testing tools for configurations.

use crate::{Describe, Error, FromTyped, Plain, ToTyped};

/// Tests loading a Rust value from the provided `sample`.
///
/// # Errors
///
/// Propagates load errors, which allows testing negative cases.
///
/// # Examples
///
/// ## Basic usage
///
/// ```
/// use tyconf::{testing, DescribeRecord};
///
/// #[derive(DescribeRecord)]
/// struct TestConfig {
///     #[config(default_t = true)]
///     flag: bool,
///     size: u64,
/// }
///
/// let sample = tyconf::config!("size": 64);
/// let config: TestConfig = testing::test(sample)?;
/// assert!(config.flag);
/// assert_eq!(config.size, 64);
/// # anyhow::Ok(())
/// ```
///
/// ## Testing errors
///
/// ```
/// # use tyconf::{testing, DescribeRecord, ErrorKind};
/// #[derive(Debug, DescribeRecord)]
/// struct TestConfig {
///     #[config(default_t = true)]
///     flag: bool,
/// }
///
/// let sample = tyconf::config!("flag": "maybe");
/// let err = testing::test::<TestConfig>(sample).unwrap_err();
/// let err = err.as_validation().unwrap();
/// assert_eq!(err.path(), Some("flag"));
/// assert_eq!(*err.kind(), ErrorKind::ImplicitCast);
/// ```
pub fn test<T: Describe + FromTyped>(sample: Plain) -> Result<T, Error> {
    crate::from_plain(&sample)
}

/// Tests loading a Rust value from the provided `sample` and checks that the value survives a round trip
/// through plain values: the dump of the loaded value must be stable w.r.t. reloading, and it must coincide
/// with the dump of the Rust value.
///
/// # Panics
///
/// Panics if any of the round-trip checks fails.
///
/// # Errors
///
/// Propagates load errors, which allows testing negative cases.
///
/// # Examples
///
/// ```
/// use tyconf::{testing, DescribeRecord};
///
/// #[derive(Debug, DescribeRecord)]
/// struct TestConfig {
///     ratio: f64,
///     names: Vec<String>,
/// }
///
/// let sample = tyconf::config!("ratio": 1, "names": vec!["a", "b"]);
/// let config: TestConfig = testing::test_round_trip(sample)?;
/// assert_eq!(config.ratio, 1.0);
/// # anyhow::Ok(())
/// ```
#[track_caller] // necessary for assertion panics to be located in the test code, rather than in this crate
pub fn test_round_trip<T: Describe + FromTyped + ToTyped>(sample: Plain) -> Result<T, Error> {
    let ty = T::ty();
    let value = crate::load(&ty, &sample)?;
    let dumped = crate::dump(&ty, &value)
        .unwrap_or_else(|err| panic!("failed dumping loaded value of type {ty}: {err}"));
    let reloaded = crate::load(&ty, &dumped)
        .unwrap_or_else(|err| panic!("failed reloading dumped value of type {ty}: {err}"));
    let redumped = crate::dump(&ty, &reloaded)
        .unwrap_or_else(|err| panic!("failed dumping reloaded value of type {ty}: {err}"));
    assert_eq!(dumped, redumped, "dump of type {ty} is not stable");

    let output = T::from_typed(value)?;
    let output_dump = crate::to_plain(&output)
        .unwrap_or_else(|err| panic!("failed dumping Rust value of type {ty}: {err}"));
    assert_eq!(output_dump, dumped, "dump of the Rust value of type {ty} differs");
    Ok(output)
}
