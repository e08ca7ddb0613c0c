use rustyline_async::SharedWriter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub fn banner() {
    tracing::info!(r#"
     dP                                      dP
     88                                      88
.d888b88 .d8888b. dP   .dP .d8888b. .d8888b. d8888P .d8888b.
88'  `88 88ooood8 88   d8' 88'  `88 88'  `88   88   88ooood8
88.  .88 88.  ... 88 .88'  88.  .88 88.  .88   88   88.  ...
`88888P8 `88888P' 8888P'   `8888P88 `88888P8   dP   `88888P'
                                .88
                            d8888P
    "#);
    tracing::info!("Author: {}", env!("CARGO_PKG_AUTHORS"));
    tracing::info!("Current version: {}", env!("CARGO_PKG_VERSION"));
}

/// Logs go through a non-blocking writer. With a console attached that writer
/// is the console's, so log lines never break the prompt.
pub fn init_tracing(console: Option<SharedWriter>) -> WorkerGuard {
    #[cfg(target_os = "windows")]
    let _ = ansi_term::enable_ansi_support();

    let (writer, guard) = match console {
        Some(out) => tracing_appender::non_blocking(out),
        None => tracing_appender::non_blocking(std::io::stdout()),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();
    guard
}
