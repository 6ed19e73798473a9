/// Emits a `tracing` event for rak-transport internals.
///
/// A leading `true` marks the message as verbose, which is emitted at the
/// `trace` level instead of `debug`.
#[macro_export]
macro_rules! rak_debug {
    (true, $($t: tt)*) => {
        ::tracing::trace!(target: "rak_transport", "{}", format!($($t)*))
    };
    ($($t: tt)*) => {
        ::tracing::debug!(target: "rak_transport", "{}", format!($($t)*))
    };
}

/// Dumps raw buffers, only when the `debug_buffers` feature is enabled.
#[macro_export]
macro_rules! rak_debug_buffers {
    ($($t: tt)*) => {
        if cfg!(feature = "debug_buffers") {
            ::tracing::trace!(target: "rak_transport::buffers", "{}", format!($($t)*));
        }
    };
}
