use std::io::Write;
use std::thread;
use std::time::Duration;

use tracing::debug;

/// Lines of a configuration script that are sent to the device.
///
/// Blank lines and `%` comment lines are skipped; line endings are trimmed.
pub fn config_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| line.trim_end_matches(['\r', '\n']))
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('%')
        })
}

/// Write each configuration line followed by `\n`, pausing `delay` after each.
///
/// Returns the number of lines written.
pub fn send_config<W: Write + ?Sized>(
    port: &mut W,
    text: &str,
    delay: Duration,
) -> std::io::Result<usize> {
    let mut sent = 0;
    for line in config_lines(text) {
        port.write_all(line.as_bytes())?;
        port.write_all(b"\n")?;
        port.flush()?;
        debug!(line, "sent config line");
        sent += 1;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
    Ok(sent)
}
