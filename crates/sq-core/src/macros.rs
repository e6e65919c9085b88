/// Return early with a [`crate::error::Error::NotFound`].
#[macro_export]
macro_rules! not_found {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::not_found($span, format!($($arg)*)))
    };
}

/// Return early with a [`crate::error::Error::TypeMismatch`].
#[macro_export]
macro_rules! type_mismatch {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::type_mismatch($span, format!($($arg)*)))
    };
}

/// Return early with a [`crate::error::Error::Structural`].
#[macro_export]
macro_rules! structural {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::structural($span, format!($($arg)*)))
    };
}

/// Return early with a [`crate::error::Error::Arity`].
#[macro_export]
macro_rules! arity {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::arity($span, format!($($arg)*)))
    };
}

/// Return early with a generic error
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Generic(format!($($arg)*)))
    };
}

/// Internal compiler error. Never reported as a user diagnostic.
#[macro_export]
macro_rules! ice {
    ($($arg:tt)*) => {
        panic!("internal compiler error: {}", format_args!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::tracing::warn!($($arg)*)
    };
}

/// Log a debug message
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::tracing::debug!($($arg)*)
    };
}

/// Log an info message
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::tracing::info!($($arg)*)
    };
}

/// Log an error message
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::tracing::error!($($arg)*)
    };
}

/// Log a trace message
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::tracing::trace!($($arg)*)
    };
}
