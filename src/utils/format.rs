/// Render an atomic amount with thousands separators, e.g. `12345607` with two
/// decimals becomes `XKR 123,456.07`.
pub fn pretty_print_amount(amount: u64, decimals: u32, ticker: &str) -> String {
	let (whole, fraction) = match 10u64.checked_pow(decimals) {
		Some(divisor) => (amount / divisor, amount % divisor),
		// Every u64 is below 10^20
		None => (0, amount),
	};

	let digits = whole.to_string();
	let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
	for (i, c) in digits.chars().enumerate() {
		if i > 0 && (digits.len() - i) % 3 == 0 {
			grouped.push(',');
		}
		grouped.push(c);
	}

	if decimals == 0 {
		format!("{} {}", ticker, grouped)
	} else {
		format!(
			"{} {}.{:0width$}",
			ticker,
			grouped,
			fraction,
			width = decimals as usize
		)
	}
}

/// Render a byte count using 1024-based units, e.g. `10000` becomes `9.77 KB`.
pub fn pretty_print_bytes(bytes: u64) -> String {
	const SUFFIXES: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

	let mut value = bytes as f64;
	let mut selected = 0;

	while value >= 1024.0 && selected < SUFFIXES.len() - 1 {
		selected += 1;
		value /= 1024.0;
	}

	format!("{:.2} {}", value, SUFFIXES[selected])
}
