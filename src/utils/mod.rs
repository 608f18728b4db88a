/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Name proposed in the save dialog for a finished job.
///
/// The server reports its own path, e.g. `downloads/<job_id>_Title.mp4`.
pub fn suggested_file_name(job_id: &str, server_filename: Option<&str>) -> String {
    let base = server_filename
        .and_then(|path| path.rsplit(|c: char| c == '/' || c == '\\').next())
        .unwrap_or_default();
    let prefix = format!("{job_id}_");
    let base = base.strip_prefix(prefix.as_str()).unwrap_or(base);

    let name = sanitize_filename(base);
    let name = name.trim_matches(|c: char| c == '.' || c == ' ');
    if name.is_empty() {
        "video".to_string()
    } else {
        name.to_string()
    }
}

/// Human readable size using binary units, e.g. `1.5 MB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// `m:ss`; minutes are not folded into hours.
pub fn format_duration(seconds: Option<u64>) -> String {
    let seconds = seconds.unwrap_or(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
