/// creates a log on the trace level when the `log` feature is enabled
#[macro_export]
macro_rules! trace {
	($($expr:expr),*) => (
		#[cfg(feature = "log")]
		{
			log::trace!($($expr),*);
		}

		#[cfg(not(feature = "log"))]
		{
			$crate::log_allow_unused!($($expr),*);
		}
	)
}

/// creates a log on the debug level when the `log` feature is enabled
#[macro_export]
macro_rules! debug {
	($($expr:expr),*) => (
		#[cfg(feature = "log")]
		{
			log::debug!($($expr),*);
		}

		#[cfg(not(feature = "log"))]
		{
			$crate::log_allow_unused!($($expr),*);
		}
	)
}

/// allow expressions to be unused
#[macro_export]
macro_rules! log_allow_unused {
	($($expr:expr),*) => (
		$(
			let _ = $expr;
		)*
	)
}
