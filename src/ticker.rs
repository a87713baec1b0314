/// Lazy scan over `$`-prefixed ticker mentions in message text.
///
/// A mention is a `$` immediately followed by one or more ASCII letters.
/// The yielded symbol excludes the `$` and keeps the original casing.
pub struct TickerMentions<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for TickerMentions<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let dollar = match self.text[self.pos..].find('$') {
                Some(offset) => self.pos + offset,
                None => {
                    self.pos = bytes.len();
                    return None;
                }
            };

            let start = dollar + 1;
            let end = bytes[start..]
                .iter()
                .position(|b| !b.is_ascii_alphabetic())
                .map(|len| start + len)
                .unwrap_or(bytes.len());

            self.pos = end.max(start);
            if end > start {
                return Some(&self.text[start..end]);
            }
        }
        None
    }
}

/// Extract ticker symbols in left-to-right order, duplicates preserved.
pub fn extract(text: Option<&str>) -> TickerMentions<'_> {
    TickerMentions {
        text: text.unwrap_or_default(),
        pos: 0,
    }
}
