//! Address identifier used as the routing key for bindings.

use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Opaque, cheaply clonable routing target name.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Address(Arc<str>);

impl Address {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Address {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl Borrow<str> for Address {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Address;
    use std::collections::HashMap;

    #[test]
    fn lookup_by_str_matches_owned_address() {
        let mut map = HashMap::new();
        map.insert(Address::from("orders"), 1);

        assert_eq!(map.get("orders"), Some(&1));
        assert_eq!(Address::from(String::from("orders")), Address::new("orders"));
    }
}
