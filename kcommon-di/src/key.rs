//! Registration keys

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Type token plus optional name identifying one registration
///
/// Two keys are equal when they carry the same [`TypeId`] and the same
/// name. An unnamed key stores the empty string, so `of::<T>()` and
/// `named::<T>("")` are the same key. The type name is kept for
/// diagnostics only.
#[derive(Clone)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
    name: String,
}

impl ServiceKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named::<T>(String::new())
    }

    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: name.into(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The registration name, or `None` for the unnamed key
    pub fn name(&self) -> Option<&str> {
        if self.name.is_empty() {
            None
        } else {
            Some(&self.name)
        }
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}[{}]", self.type_name, name),
            None => f.write_str(self.type_name),
        }
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Greeter {}

    #[test]
    fn test_unnamed_equals_empty_name() {
        assert_eq!(ServiceKey::of::<u32>(), ServiceKey::named::<u32>(""));
    }

    #[test]
    fn test_names_distinguish_keys() {
        let mut keys = HashSet::new();
        keys.insert(ServiceKey::of::<String>());
        keys.insert(ServiceKey::named::<String>("a"));
        keys.insert(ServiceKey::named::<String>("b"));
        keys.insert(ServiceKey::named::<String>("a"));
        keys.insert(ServiceKey::of::<u64>());
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_unsized_keys_and_display() {
        let key = ServiceKey::named::<dyn Greeter>("console");
        assert!(key.to_string().ends_with("Greeter[console]"));
        assert_eq!(key.name(), Some("console"));
        assert_eq!(ServiceKey::of::<dyn Greeter>().name(), None);
    }
}
