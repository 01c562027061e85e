/// Upper bound for the reaction bar chart, rounded up to the next 50 ms
pub fn compute_chart_max(times: &[u64], record: Option<u64>) -> u64 {
    let highest = times
        .iter()
        .copied()
        .chain(record)
        .max()
        .unwrap_or(0)
        .max(1);
    highest.div_ceil(50) * 50
}

/// Bar labels, one per trial
pub fn bar_labels(times: &[u64]) -> Vec<String> {
    (1..=times.len()).map(|i| format!("#{i}")).collect()
}

/// Readout value, dash when absent
pub fn format_ms(val: Option<u64>) -> String {
    match val {
        Some(ms) => format!("{ms} ms"),
        None => "–".to_string(),
    }
}
