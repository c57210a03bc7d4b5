//! Error codes for every diagnostic the core reports.
//!
//! Codes keep the numbering of the language's reference compiler so that
//! tooling and documentation can be shared. The first two digits after `CS`
//! do not encode a phase; use the `is_*` predicates instead.

use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ErrorCode {
    // Binding errors
    /// Cannot implicitly convert type
    CS0029,
    /// Ambiguous call between overloads
    CS0121,
    /// A constant value is expected
    CS0150,
    /// Arguments provided when creating an instance of a type parameter
    CS0417,
    /// Brace initializer outside an array creation or array-typed declaration
    CS0623,
    /// Nested array initializer expected
    CS0846,
    /// Array initializer length does not match the declared size
    CS0847,
    /// No overload of a method takes the given number of arguments
    CS1501,
    /// Argument cannot be converted to the parameter type
    CS1503,
    /// Array creation without size or initializer
    CS1586,
    /// No constructor takes the given number of arguments
    CS1729,
    /// No parameter with the given name
    CS1739,
    /// Collection literal target type is not constructible
    CS9174,
    /// `with(...)` not supported for the target type
    CS9401,
    /// `with(...)` on a read-only interface must be empty
    CS9403,
    /// No builder factory overload takes the given number of arguments
    CS9405,

    // Flow errors
    /// `break`/`continue` with no enclosing loop
    CS0139,
    /// Duplicate label in the same method
    CS0140,
    /// Control leaving a finally clause
    CS0157,
    /// Undeclared goto target
    CS0159,

    // Internal errors
    /// Internal builder error
    E9001,
}

impl ErrorCode {
    /// All error code variants, for exhaustive testing.
    pub const ALL: &[ErrorCode] = &[
        ErrorCode::CS0029,
        ErrorCode::CS0121,
        ErrorCode::CS0150,
        ErrorCode::CS0417,
        ErrorCode::CS0623,
        ErrorCode::CS0846,
        ErrorCode::CS0847,
        ErrorCode::CS1501,
        ErrorCode::CS1503,
        ErrorCode::CS1586,
        ErrorCode::CS1729,
        ErrorCode::CS1739,
        ErrorCode::CS9174,
        ErrorCode::CS9401,
        ErrorCode::CS9403,
        ErrorCode::CS9405,
        ErrorCode::CS0139,
        ErrorCode::CS0140,
        ErrorCode::CS0157,
        ErrorCode::CS0159,
        ErrorCode::E9001,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CS0029 => "CS0029",
            ErrorCode::CS0121 => "CS0121",
            ErrorCode::CS0150 => "CS0150",
            ErrorCode::CS0417 => "CS0417",
            ErrorCode::CS0623 => "CS0623",
            ErrorCode::CS0846 => "CS0846",
            ErrorCode::CS0847 => "CS0847",
            ErrorCode::CS1501 => "CS1501",
            ErrorCode::CS1503 => "CS1503",
            ErrorCode::CS1586 => "CS1586",
            ErrorCode::CS1729 => "CS1729",
            ErrorCode::CS1739 => "CS1739",
            ErrorCode::CS9174 => "CS9174",
            ErrorCode::CS9401 => "CS9401",
            ErrorCode::CS9403 => "CS9403",
            ErrorCode::CS9405 => "CS9405",
            ErrorCode::CS0139 => "CS0139",
            ErrorCode::CS0140 => "CS0140",
            ErrorCode::CS0157 => "CS0157",
            ErrorCode::CS0159 => "CS0159",
            ErrorCode::E9001 => "E9001",
        }
    }

    /// Errors reported while binding expressions into operations.
    pub fn is_bind_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::CS0029
                | ErrorCode::CS0121
                | ErrorCode::CS0150
                | ErrorCode::CS0417
                | ErrorCode::CS0623
                | ErrorCode::CS0846
                | ErrorCode::CS0847
                | ErrorCode::CS1501
                | ErrorCode::CS1503
                | ErrorCode::CS1586
                | ErrorCode::CS1729
                | ErrorCode::CS1739
                | ErrorCode::CS9174
                | ErrorCode::CS9401
                | ErrorCode::CS9403
                | ErrorCode::CS9405
        )
    }

    /// Errors reported while lowering statements into a flow graph.
    pub fn is_flow_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::CS0139 | ErrorCode::CS0140 | ErrorCode::CS0157 | ErrorCode::CS0159
        )
    }

    /// Errors about `with(...)` construct arguments.
    pub fn is_construct_argument_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::CS0417
                | ErrorCode::CS1503
                | ErrorCode::CS1729
                | ErrorCode::CS1739
                | ErrorCode::CS9401
                | ErrorCode::CS9403
                | ErrorCode::CS9405
        )
    }

    pub fn is_internal_error(&self) -> bool {
        matches!(self, ErrorCode::E9001)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse an error code string like `"CS0847"`. Case-insensitive.
impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        Self::ALL
            .iter()
            .find(|code| code.as_str() == upper)
            .copied()
            .ok_or(())
    }
}

#[cfg(test)]
mod tests;
