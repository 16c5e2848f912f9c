//! Header fields for requests and responses.

/// Header fields in the order they appear on the wire.
///
/// Names compare ASCII case-insensitively but keep the spelling they were
/// given, so a response goes out exactly as its handler wrote it.
///
/// ```
/// use servedir::http::Headers;
///
/// let mut headers: Headers = [("Host", "localhost"), ("Accept", "*/*")].into_iter().collect();
/// headers.set("content-type", "text/plain");
/// headers.set("Content-Type", "text/html");
///
/// assert_eq!(headers.get("HOST"), Some("localhost"));
/// assert_eq!(headers.get("content-type"), Some("text/html"));
/// assert_eq!(headers.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    value: String,
}

impl Field {
    fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field after the existing ones, keeping earlier fields of the
    /// same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Leaves exactly one field called `name`.
    ///
    /// The field keeps the position of the first existing one with that
    /// name, or goes last if there was none.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let field = Field {
            name: name.into(),
            value: value.into(),
        };
        let Some(first) = self.fields.iter().position(|f| f.is(&field.name)) else {
            self.fields.push(field);
            return;
        };

        let mut index = 0;
        self.fields.retain(|f| {
            let keep = index <= first || !f.is(&field.name);
            index += 1;
            keep
        });
        self.fields[first] = field;
    }

    /// The value of the first field called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.is(name))
            .map(|f| f.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.is(name))
    }

    /// Drops every field called `name`; `true` if there was one.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|f| !f.is(name));
        self.fields.len() != before
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Number of fields, counting repeated names separately.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `(name, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(headers: &Headers) -> Vec<(&str, &str)> {
        headers.iter().collect()
    }

    #[test]
    fn lookup_ignores_case_but_keeps_spelling() {
        let mut h = Headers::new();
        h.append("X-Served-By", "servedir");
        assert_eq!(h.get("x-served-by"), Some("servedir"));
        assert!(h.contains("X-SERVED-BY"));
        assert_eq!(pairs(&h), [("X-Served-By", "servedir")]);
    }

    #[test]
    fn set_collapses_repeats_in_place() {
        let mut h: Headers = [
            ("Vary", "Accept"),
            ("Location", "/a"),
            ("vary", "Origin"),
            ("Connection", "close"),
        ]
        .into_iter()
        .collect();

        h.set("VARY", "*");
        assert_eq!(
            pairs(&h),
            [("VARY", "*"), ("Location", "/a"), ("Connection", "close")]
        );

        h.set("Content-Type", "text/plain");
        assert_eq!(h.iter().last(), Some(("Content-Type", "text/plain")));
    }

    #[test]
    fn append_keeps_earlier_values() {
        let mut h = Headers::new();
        h.append("Set-Cookie", "a=1");
        h.append("set-cookie", "b=2");
        assert_eq!(h.len(), 2);
        assert_eq!(h.get("Set-Cookie"), Some("a=1"));
    }

    #[test]
    fn remove_reports_whether_anything_went() {
        let mut h: Headers = [("X-Partial", "1"), ("x-partial", "2"), ("Host", "a")]
            .into_iter()
            .collect();
        assert!(h.remove("X-PARTIAL"));
        assert!(!h.remove("x-partial"));
        assert_eq!(pairs(&h), [("Host", "a")]);
        h.clear();
        assert!(h.is_empty());
    }
}
