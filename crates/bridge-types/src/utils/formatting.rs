//! Identifier shortening and escaping for logs and chat messages.

const SHORT_ID_CHARS: usize = 8;

/// First eight characters of an id, as shown to chat users.
///
/// Counts characters rather than bytes so non-ASCII ids never split a code point.
pub fn id_prefix(id: &str) -> &str {
	match id.char_indices().nth(SHORT_ID_CHARS) {
		Some((end, _)) => &id[..end],
		None => id,
	}
}

/// Shortened id for log fields; appends ".." when something was cut.
pub fn truncate_id(id: &str) -> String {
	let prefix = id_prefix(id);
	if prefix.len() == id.len() {
		id.to_string()
	} else {
		format!("{}..", prefix)
	}
}

/// Escapes the characters the chat platform's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			_ => escaped.push(c),
		}
	}
	escaped
}
