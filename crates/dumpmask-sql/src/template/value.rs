//! The value a template renders against.

/// The raw literal payload of one column value, as seen by a template.
///
/// Lengths are counted in Unicode scalar values, never bytes, so a
/// multi-byte character is never split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateValue<'a> {
    raw: &'a str,
    cost: u32,
}

impl<'a> TemplateValue<'a> {
    /// Wrap a cell payload; `cost` is the bcrypt work factor for [`hashed`].
    ///
    /// [`hashed`]: TemplateValue::hashed
    pub fn new(raw: &'a str, cost: u32) -> Self {
        Self { raw, cost }
    }

    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    /// First `n` characters, or the whole value if it is shorter.
    pub fn first(&self, n: usize) -> String {
        self.raw.chars().take(n).collect()
    }

    /// Last `n` characters, or the whole value if it is shorter.
    pub fn last(&self, n: usize) -> String {
        let len = self.raw.chars().count();
        if len <= n {
            return self.raw.to_string();
        }
        self.raw.chars().skip(len - n).collect()
    }

    /// Salted bcrypt hash of the value.
    ///
    /// Every call draws a fresh salt, so hashing the same value twice gives
    /// two different strings that both verify against the original.
    pub fn hashed(&self) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(self.raw, self.cost)
    }
}
