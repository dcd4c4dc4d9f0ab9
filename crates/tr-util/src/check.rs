use std::fmt;

/// Report a broken internal invariant and abort the current operation.
///
/// Contract violations are caller misuse (retaining a released object,
/// reclaiming a malformed pointer, ...). They are never recoverable, so this
/// logs at `error` level and panics with a message prefixed by
/// `contract violation:`.
#[cold]
#[track_caller]
pub fn contract_violation(args: fmt::Arguments<'_>) -> ! {
    let location = std::panic::Location::caller();
    tracing::error!(%location, "contract violation: {}", args);
    panic!("contract violation: {args}")
}

/// Fail fast unless `cond` holds.
///
/// ```should_panic
/// tr_util::tr_check!(1 + 1 == 3, "arithmetic is broken");
/// ```
#[macro_export]
macro_rules! tr_check {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::contract_violation(::std::format_args!(
                "check failed: {}",
                ::std::stringify!($cond)
            ));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::contract_violation(::std::format_args!($($arg)+));
        }
    };
}
