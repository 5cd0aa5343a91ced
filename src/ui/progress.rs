/// Gauge ratio for a progress percentage. Values past 100 are clamped.
pub fn gauge_ratio(percent: f64) -> f64 {
    (percent / 100.0).clamp(0.0, 1.0)
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.1}")
    }
}

/// "elapsed / budget" caption for the session gauge
pub fn elapsed_caption(elapsed_secs: f64, budget_secs: u32) -> String {
    format!("{}s / {}s", format_label(elapsed_secs), budget_secs)
}
