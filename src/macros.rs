//! Macros used by this crate

/// Create a new error (of a given enum variant) with a formatted message
macro_rules! err {
    ($variant:ident, $msg:expr) => {
        $crate::error::Error::$variant($msg.to_string())
    };
    ($variant:ident, $fmt:expr, $($arg:tt)+) => {
        $crate::error::Error::$variant(format!($fmt, $($arg)+))
    };
}

/// Create and return an error enum variant with a formatted message
macro_rules! fail {
    ($variant:ident, $msg:expr) => {
        return Err(err!($variant, $msg))
    };
    ($variant:ident, $fmt:expr, $($arg:tt)+) => {
        return Err(err!($variant, $fmt, $($arg)+))
    };
}

/// Assert a condition holds, returning an error with a formatted message if not
macro_rules! ensure {
    ($cond:expr, $variant:ident, $msg:expr) => {
        if !($cond) {
            fail!($variant, $msg);
        }
    };
    ($cond:expr, $variant:ident, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            fail!($variant, $fmt, $($arg)+);
        }
    };
}
