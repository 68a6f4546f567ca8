//! In-memory structured document backing `DataAdaptor`.
//!
//! Serialized as nested TOML tables:
//!
//! ```toml
//! name = "xdxf"
//! [attributes]
//! system = "ring"
//! [[children]]
//! name = "sequence"
//! attributes = { id = "ARC1", len = "10" }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::infrastructure::traits::DataAdaptor;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTree {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DataTree>,
}

impl DataTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: impl ToString) -> Self {
        self.set_value(name, value);
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: DataTree) -> Self {
        self.children.push(child);
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl DataAdaptor for DataTree {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    fn string_value(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn child_adaptors(&self, tag: &str) -> Vec<&Self> {
        self.children.iter().filter(|c| c.name == tag).collect()
    }

    fn create_child(&mut self, tag: &str) -> &mut Self {
        self.children.push(DataTree::new(tag));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    fn set_value(&mut self, name: &str, value: impl ToString) {
        self.attributes.insert(name.to_string(), value.to_string());
    }
}
