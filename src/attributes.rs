//! Typed reads of single-valued directory attributes.
//!
//! Directory entries hand back every attribute as a list of strings. [`AttributeSet`]
//! turns that into "present with a typed value" or "absent" for one named attribute.

use std::{collections::HashMap, str::FromStr};

use ldap3::SearchEntry;

use crate::error::ExpiryError;

pub trait AttributeSet {
    /// All values of the attribute `name`, if the entry has it
    fn values(&self, name: &str) -> Option<&[String]>;

    /// First value of the attribute `name`
    fn raw(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Reads and parses the first value of `name`.
    ///
    /// # Errors
    /// Returns [`ExpiryError::ConversionError`] if the value is present but does not parse as `T`.
    /// An absent attribute is `Ok(None)`.
    fn read<T: FromStr>(&self, name: &str) -> Result<Option<T>, ExpiryError> {
        self.raw(name)
            .map(|value| {
                value.trim().parse::<T>().map_err(|_| {
                    ExpiryError::ConversionError(format!(
                        "attribute {name} has an unexpected value: {value:?}"
                    ))
                })
            })
            .transpose()
    }
}

fn lookup<'a>(attrs: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a [String]> {
    // attribute names are case insensitive
    attrs
        .get(name)
        .or_else(|| {
            attrs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, values)| values)
        })
        .map(Vec::as_slice)
}

impl AttributeSet for HashMap<String, Vec<String>> {
    fn values(&self, name: &str) -> Option<&[String]> {
        lookup(self, name)
    }
}

impl AttributeSet for SearchEntry {
    fn values(&self, name: &str) -> Option<&[String]> {
        lookup(&self.attrs, name)
    }
}

/// Builds an in-memory entry from `(attribute, value)` pairs
#[cfg(test)]
pub(crate) fn entry(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
    let mut attrs: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in pairs {
        attrs
            .entry((*name).to_owned())
            .or_default()
            .push((*value).to_owned());
    }
    attrs
}
