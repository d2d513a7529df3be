/// `1234567.891` with 2 decimals becomes `1,234,567.89`.
pub fn thousands(value: f64, decimals: usize) -> String {
    let rendered = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match rendered.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (rendered.as_str(), None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && rendered.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped, fraction),
        None => format!("{}{}", sign, grouped),
    }
}

pub fn currency(value: f64, decimals: usize) -> String {
    let body = thousands(value, decimals);
    match body.strip_prefix('-') {
        Some(positive) => format!("-${}", positive),
        None => format!("${}", body),
    }
}

pub fn percent(value: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, value)
}

pub fn optional_currency(value: Option<f64>, decimals: usize) -> String {
    value.map(|value| currency(value, decimals)).unwrap_or_else(|| "n/a".to_string())
}

pub fn optional_percent(value: Option<f64>, decimals: usize) -> String {
    value.map(|value| percent(value, decimals)).unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
mod tests {
    use super::{currency, optional_percent, percent, thousands};

    #[test]
    fn groups_thousands() {
        assert_eq!(thousands(1_234_567.891, 2), "1,234,567.89");
        assert_eq!(thousands(999.0, 0), "999");
        assert_eq!(thousands(1000.0, 0), "1,000");
        assert_eq!(thousands(-4_695_684.17, 2), "-4,695,684.17");
        assert_eq!(thousands(-0.001, 2), "0.00");
    }

    #[test]
    fn formats_currency_and_percent() {
        assert_eq!(currency(52.83, 2), "$52.83");
        assert_eq!(currency(-1500.0, 0), "-$1,500");
        assert_eq!(percent(-14.821, 1), "-14.8%");
        assert_eq!(optional_percent(None, 1), "n/a");
    }
}
