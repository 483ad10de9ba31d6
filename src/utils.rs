use itertools::Itertools;

// Game ticks per real-time second.
pub const TICKS_PER_SECOND: i64 = 20;

/// Renders an integer with `,` between every group of three digits.
pub fn format_grouped(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let head = match digits.len() % 3 {
        0 => 3,
        n => n,
    };

    let grouped = std::iter::once(&digits[..head])
        .chain((head..digits.len()).step_by(3).map(|i| &digits[i..i + 3]))
        .join(",");

    match value < 0 {
        true => format!("-{grouped}"),
        false => grouped,
    }
}

/// Renders a tick count as `H:MM:SS.ss`.
pub fn format_ticks(ticks: i64) -> String {
    // 1 tick is 5 hundredths of a second, so integer arithmetic stays exact.
    let hundredths = ticks.unsigned_abs() as u128 * (100 / TICKS_PER_SECOND) as u128;

    let hours = hundredths / 360_000;
    let minutes = (hundredths / 6_000) % 60;
    let seconds = (hundredths / 100) % 60;
    let fraction = hundredths % 100;

    format!(
        "{}{}:{:02}:{:02}.{:02}",
        if ticks < 0 { "-" } else { "" },
        hours,
        minutes,
        seconds,
        fraction
    )
}
