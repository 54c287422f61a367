//! Rough per-tick cost estimation for the trace metrics.

/// Price per million tokens: (input, output). Longest matching prefix wins;
/// unknown models cost zero.
const PRICES: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4.1-mini", 0.40, 1.60),
    ("gpt-4.1", 2.00, 8.00),
    ("claude-3-5-haiku", 0.80, 4.00),
    ("claude", 3.00, 15.00),
];

pub fn estimate(model: &str, tokens_in: u32, tokens_out: u32) -> f64 {
    let mut best: Option<&(&str, f64, f64)> = None;
    for entry in PRICES {
        if model.starts_with(entry.0) {
            match best {
                Some(b) if b.0.len() >= entry.0.len() => {}
                _ => best = Some(entry),
            }
        }
    }
    match best {
        Some((_, input, output)) => {
            (tokens_in as f64 * input + tokens_out as f64 * output) / 1_000_000.0
        }
        None => 0.0,
    }
}
