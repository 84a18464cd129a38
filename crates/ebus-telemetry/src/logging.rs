//! Structured logging helpers.
//!
//! Every event bus log line carries a `component` field so output from
//! several components sharing one process can be told apart.

/// Log with a `component` field at the given level.
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::info!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::warn!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::error!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        $crate::tracing::debug!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log an event-related message with the standard `event_key` and
/// `event_id` fields.
#[macro_export]
macro_rules! log_key_event {
    ($level:ident, $component:expr, $msg:expr, $event:expr $(, $($field:tt)*)?) => {
        $crate::tracing::$level!(
            component = $component,
            event_key = %$event.event_key(),
            event_id = %$event.event_id(),
            $($($field)*,)?
            $msg
        )
    };
}
