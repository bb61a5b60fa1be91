//! Call-site capture for audit records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// File, line and function of the code that initiated an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    /// Enclosing function path, or the operation name when the caller's
    /// function is not known
    pub function: String,
}

impl SourceLocation {
    /// Create a location from explicit parts
    pub fn new(file: impl Into<String>, line: u32, column: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            function: function.into(),
        }
    }

    /// Location of the caller of the enclosing `#[track_caller]` chain
    #[track_caller]
    pub fn caller(function: &str) -> Self {
        Self::from_location(Location::caller(), function)
    }

    /// Convert a [`std::panic::Location`]
    pub fn from_location(location: &Location<'_>, function: &str) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
            function: function.to_string(),
        }
    }

    /// Location used for events that carry no call site
    pub fn unknown() -> Self {
        Self::new("<unknown>", 0, 0, "<unknown>")
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{} ({})", self.file, self.line, self.column, self.function)
    }
}

/// Strip the `::__f` suffix produced by [`source_location!`]
#[doc(hidden)]
pub fn __enclosing_function(raw: &'static str) -> &'static str {
    raw.strip_suffix("::__f").unwrap_or(raw)
}

/// Capture the current file, line, column and enclosing function
///
/// ```
/// use kcommon_core::source_location;
///
/// fn setup() -> kcommon_core::SourceLocation {
///     source_location!()
/// }
///
/// let loc = setup();
/// assert!(loc.function.ends_with("setup"));
/// ```
#[macro_export]
macro_rules! source_location {
    () => {{
        fn __f() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::SourceLocation::new(
            file!(),
            line!(),
            column!(),
            $crate::source_location::__enclosing_function(__type_name_of(__f)),
        )
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn captured() -> SourceLocation {
        SourceLocation::caller("captured")
    }

    #[test]
    fn test_caller_points_at_call_site() {
        let line = line!() + 1;
        let loc = captured();
        assert_eq!(loc.line, line);
        assert!(loc.file.ends_with("source_location.rs"));
        assert_eq!(loc.function, "captured");
    }

    #[test]
    fn test_macro_captures_function() {
        let loc = crate::source_location!();
        assert!(loc.function.ends_with("test_macro_captures_function"));
        assert!(loc.line > 0);
    }

    #[test]
    fn test_display() {
        let loc = SourceLocation::new("main.rs", 10, 5, "app::main");
        assert_eq!(loc.to_string(), "main.rs:10:5 (app::main)");
    }
}
