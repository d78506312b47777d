use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
pub struct Logs(Arc<Mutex<Vec<u8>>>);

impl Logs {
    /// Every event recorded so far, one JSON object each.
    pub fn events(&self) -> Vec<serde_json::Value> {
        let buf = self.0.lock();

        String::from_utf8_lossy(&buf)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// The `fields` of the first event at `level` whose message starts with `message`.
    pub fn find(&self, level: &str, message: &str) -> Option<serde_json::Value> {
        self.events().into_iter().find_map(|event| {
            let fields = &event["fields"];
            let matches = event["level"] == level
                && fields["message"]
                    .as_str()
                    .is_some_and(|m| m.starts_with(message));

            matches.then(|| fields.clone())
        })
    }
}

impl io::Write for Logs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Logs {
    type Writer = Logs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Captures events on the current thread until the guard drops.
pub fn capture_logs() -> (DefaultGuard, Logs) {
    let logs = Logs::default();

    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs.clone())
        .finish();

    (tracing::subscriber::set_default(subscriber), logs)
}
