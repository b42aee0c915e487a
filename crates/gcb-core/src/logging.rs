use std::fmt;

use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize tracing for the bot.
///
/// Default: info for our crates, warn for everything else. Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,gcb_core=info,gcb_telegram=info,gcb_geocaching=info,{service_name}=info"
        ))
    });

    tracing_fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::External(format!("logging init failed: {e}")))
}

/// Log a fatal startup error before handing it back to `main`.
pub fn fatal<T, E: fmt::Display>(
    result: std::result::Result<T, E>,
    what: &str,
) -> std::result::Result<T, E> {
    if let Err(e) = &result {
        tracing::error!(error = %e, "{what}");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured<R>(f: impl FnOnce() -> R) -> (R, String) {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let r = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        (r, text)
    }

    #[test]
    fn fatal_errors_are_logged_and_passed_through() {
        let (res, logs) = captured(|| {
            fatal::<(), _>(
                Err(Error::External("getMe failed: Unauthorized".to_string())),
                "telegram bot failed",
            )
        });

        assert!(matches!(res, Err(Error::External(_))));
        assert!(logs.contains("ERROR"));
        assert!(logs.contains("telegram bot failed"));
        assert!(logs.contains("getMe failed: Unauthorized"));
    }

    #[test]
    fn success_is_silent() {
        let (res, logs) = captured(|| fatal::<_, Error>(Ok(7), "unused"));
        assert_eq!(res.unwrap(), 7);
        assert!(logs.is_empty());
    }
}
