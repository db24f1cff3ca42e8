//! Property tree values and the query-matching algorithm.
//!
//! Entities expose their properties as a [`PropTree`], an ordered
//! map from name to scalar or nested tree. This module converts such
//! trees to and from the wire-level [`PropertyElement`] lists and
//! implements getProperty query matching.

use std::collections::BTreeMap;

use crate::messages::{PropertyElement, PropertyValue};

/// An ordered property dictionary.
pub type PropTree = BTreeMap<String, PropValue>;

/// One property value: a scalar, explicit NULL, or a nested tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Dict(PropTree),
}

impl PropValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view; accepts Int, UInt and whole Doubles (setProperty
    /// peers are sloppy about numeric scalar kinds).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropValue::Int(v) => Some(*v),
            PropValue::UInt(v) => i64::try_from(*v).ok(),
            PropValue::Double(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Double(v) => Some(*v),
            PropValue::Int(v) => Some(*v as f64),
            PropValue::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&PropTree> {
        match self {
            PropValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    fn to_wire(&self) -> Option<PropertyValue> {
        let mut pv = PropertyValue::default();
        match self {
            PropValue::Null => {}
            PropValue::Bool(v) => pv.v_bool = Some(*v),
            PropValue::Int(v) => pv.v_int64 = Some(*v),
            PropValue::UInt(v) => pv.v_uint64 = Some(*v),
            PropValue::Double(v) => pv.v_double = Some(*v),
            PropValue::String(v) => pv.v_string = Some(v.clone()),
            PropValue::Bytes(v) => pv.v_bytes = Some(v.clone()),
            PropValue::Dict(_) => return None,
        }
        Some(pv)
    }

    fn from_wire(pv: &PropertyValue) -> PropValue {
        // bool is checked first so booleans never degrade to integers.
        if let Some(v) = pv.v_bool {
            PropValue::Bool(v)
        } else if let Some(v) = pv.v_uint64 {
            PropValue::UInt(v)
        } else if let Some(v) = pv.v_int64 {
            PropValue::Int(v)
        } else if let Some(v) = pv.v_double {
            PropValue::Double(v)
        } else if let Some(ref v) = pv.v_string {
            PropValue::String(v.clone())
        } else if let Some(ref v) = pv.v_bytes {
            PropValue::Bytes(v.clone())
        } else {
            PropValue::Null
        }
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<u64> for PropValue {
    fn from(v: u64) -> Self {
        PropValue::UInt(v)
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Double(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::String(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::String(v)
    }
}

impl From<Vec<u8>> for PropValue {
    fn from(v: Vec<u8>) -> Self {
        PropValue::Bytes(v)
    }
}

impl From<PropTree> for PropValue {
    fn from(v: PropTree) -> Self {
        PropValue::Dict(v)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => PropValue::Null,
        }
    }
}

/// Expand a full tree into wire elements. Nested dicts become
/// sub-elements; scalars become values.
pub fn tree_to_elements(tree: &PropTree) -> Vec<PropertyElement> {
    tree.iter()
        .map(|(name, value)| {
            let mut elem = PropertyElement {
                name: name.clone(),
                value: None,
                elements: vec![],
            };
            match value {
                PropValue::Dict(sub) => elem.elements = tree_to_elements(sub),
                scalar => elem.value = scalar.to_wire(),
            }
            elem
        })
        .collect()
}

/// Inverse of [`tree_to_elements`]. Elements with an empty name are
/// skipped; an element with neither value nor children becomes NULL.
pub fn elements_to_tree(elements: &[PropertyElement]) -> PropTree {
    let mut tree = PropTree::new();
    for elem in elements {
        if elem.name.is_empty() {
            continue;
        }
        let value = if !elem.elements.is_empty() {
            PropValue::Dict(elements_to_tree(&elem.elements))
        } else if let Some(ref pv) = elem.value {
            PropValue::from_wire(pv)
        } else {
            PropValue::Null
        };
        tree.insert(elem.name.clone(), value);
    }
    tree
}

/// Match a getProperty `query` against `properties`.
///
/// An empty element name is a wildcard returning every entry at that
/// level; a non-empty name selects one entry. Sub-queries recurse into
/// nested dicts; a selected dict without a sub-query expands fully.
/// Unknown names are silently omitted.
pub fn match_query(properties: &PropTree, query: &[PropertyElement]) -> Vec<PropertyElement> {
    let mut result = Vec::new();

    for q in query {
        if q.name.is_empty() {
            for (name, value) in properties {
                result.push(matched_element(name, value, &q.elements));
            }
        } else if let Some(value) = properties.get(&q.name) {
            result.push(matched_element(&q.name, value, &q.elements));
        }
        // Unknown names fall through silently.
    }

    result
}

fn matched_element(name: &str, value: &PropValue, sub_query: &[PropertyElement]) -> PropertyElement {
    let mut elem = PropertyElement {
        name: name.to_string(),
        value: None,
        elements: vec![],
    };
    match value {
        PropValue::Dict(sub) => {
            if sub_query.is_empty() {
                elem.elements = tree_to_elements(sub);
            } else {
                elem.elements = match_query(sub, sub_query);
            }
        }
        scalar => elem.value = scalar.to_wire(),
    }
    elem
}

/// Build a single-name query element (no sub-query).
pub fn query_name(name: &str) -> PropertyElement {
    PropertyElement {
        name: name.to_string(),
        value: None,
        elements: vec![],
    }
}

/// Build a query element with a sub-query.
pub fn query_path(name: &str, sub: Vec<PropertyElement>) -> PropertyElement {
    PropertyElement {
        name: name.to_string(),
        value: None,
        elements: sub,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> PropTree {
        let mut caps = PropTree::new();
        caps.insert("metering".into(), false.into());
        caps.insert("identification".into(), true.into());

        let mut tree = PropTree::new();
        tree.insert("name".into(), "Kitchen".into());
        tree.insert("zoneID".into(), PropValue::Int(4));
        tree.insert("active".into(), true.into());
        tree.insert("weight".into(), PropValue::Double(2.5));
        tree.insert("icon".into(), PropValue::Bytes(vec![1, 2, 3]));
        tree.insert("unset".into(), PropValue::Null);
        tree.insert("capabilities".into(), caps.into());
        tree
    }

    #[test]
    fn tree_round_trip() {
        let tree = sample_tree();
        let elements = tree_to_elements(&tree);
        assert_eq!(elements_to_tree(&elements), tree);
    }

    #[test]
    fn booleans_are_not_integers() {
        let mut tree = PropTree::new();
        tree.insert("flag".into(), true.into());
        tree.insert("count".into(), PropValue::Int(1));
        let back = elements_to_tree(&tree_to_elements(&tree));
        assert_eq!(back["flag"], PropValue::Bool(true));
        assert_eq!(back["count"], PropValue::Int(1));
    }

    #[test]
    fn named_query_selects_scalar() {
        let matched = match_query(&sample_tree(), &[query_name("name")]);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "name");
        assert_eq!(
            matched[0].value.as_ref().unwrap().v_string.as_deref(),
            Some("Kitchen")
        );
    }

    #[test]
    fn unknown_names_are_omitted() {
        let matched = match_query(
            &sample_tree(),
            &[query_name("name"), query_name("doesNotExist")],
        );
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn wildcard_expands_level() {
        let tree = sample_tree();
        let matched = match_query(&tree, &[query_name("")]);
        assert_eq!(matched.len(), tree.len());
        let names: Vec<_> = matched.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"capabilities"));
        assert!(names.contains(&"zoneID"));
    }

    #[test]
    fn wildcard_expands_whole_subtree_without_subquery() {
        let matched = match_query(&sample_tree(), &[query_name("capabilities")]);
        assert_eq!(matched[0].elements.len(), 2);
    }

    #[test]
    fn subquery_recurses_into_dict() {
        let matched = match_query(
            &sample_tree(),
            &[query_path("capabilities", vec![query_name("metering")])],
        );
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].elements.len(), 1);
        assert_eq!(matched[0].elements[0].name, "metering");
        assert_eq!(matched[0].elements[0].value.as_ref().unwrap().v_bool, Some(false));
    }

    #[test]
    fn null_values_survive() {
        let matched = match_query(&sample_tree(), &[query_name("unset")]);
        let pv = matched[0].value.as_ref().unwrap();
        assert!(pv.v_bool.is_none() && pv.v_int64.is_none() && pv.v_string.is_none());
    }
}
