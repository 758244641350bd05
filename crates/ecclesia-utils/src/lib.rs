//! Utility functions and helpers

/// Insert thousands separators into the integer part of a number
pub fn format_number<T: ToString>(n: T) -> String {
    let s = n.to_string();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };

    let mut grouped = String::new();
    let mut count = 0;
    for c in int_part.chars().rev() {
        if count == 3 {
            grouped.push(',');
            count = 0;
        }
        grouped.push(c);
        count += 1;
    }
    let grouped: String = grouped.chars().rev().collect();

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

/// Format a monetary amount with two decimals and thousands separators
pub fn format_amount(value: f64) -> String {
    format_number(format!("{:.2}", value))
}

/// Reduce an arbitrary label to characters safe for a file name
pub fn sanitize_filename_part(part: &str) -> String {
    let cleaned: String = part
        .trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '-',
        })
        .collect();
    let collapsed = cleaned
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if collapsed.is_empty() {
        "report".to_string()
    } else {
        collapsed
    }
}

/// Map a response content type to a file extension
///
/// Parameters such as `; charset=binary` are ignored. Returns `None`
/// for content types that do not identify a known export format.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "application/pdf" => Some("pdf"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some("xlsx"),
        "application/vnd.ms-excel" => Some("xls"),
        "text/csv" => Some("csv"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(-1000), "-1,000");
        assert_eq!(format_number("12345.5"), "12,345.5");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(675.0), "675.00");
        assert_eq!(format_amount(1234.567), "1,234.57");
        assert_eq!(format_amount(-425.5), "-425.50");
    }

    #[test]
    fn test_sanitize_filename_part() {
        assert_eq!(sanitize_filename_part("pledges"), "pledges");
        assert_eq!(sanitize_filename_part("2024-01-01"), "2024-01-01");
        assert_eq!(sanitize_filename_part("a/b c"), "a-b-c");
        assert_eq!(sanitize_filename_part("../"), "report");
    }

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for_content_type("application/pdf"), Some("pdf"));
        assert_eq!(
            extension_for_content_type(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet; charset=binary"
            ),
            Some("xlsx")
        );
        assert_eq!(extension_for_content_type("Application/Vnd.MS-Excel"), Some("xls"));
        assert_eq!(extension_for_content_type("text/csv"), Some("csv"));
        assert_eq!(extension_for_content_type("application/octet-stream"), None);
    }
}
