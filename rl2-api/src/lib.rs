// builders + trainer + higher level helpers
pub mod builders;
pub mod logging;
pub mod trainer;

#[cfg(feature = "test-utils")]
pub mod test_utils;
