//! Parameter collections, bound parameter values and the replacement rule.

use std::rc::Rc;

use ahash::AHashMap;

use crate::arena::ObjectId;
use crate::error::{ModelError, ModelResult};
use crate::object::{ConstantTable, Parameter, ParameterValue};

/// Materializes a value as a constant table when it denotes one.
pub type TableLookup<'t> = dyn FnMut(&ParameterValue) -> Option<Rc<ConstantTable>> + 't;

/// Lookup for callers with no corpus at hand: only materialized tables count.
pub fn no_tables(value: &ParameterValue) -> Option<Rc<ConstantTable>> {
    match value {
        ParameterValue::Table(table) => Some(Rc::clone(table)),
        _ => None,
    }
}

/// A parameter together with the trait definition that declared it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSlot {
    pub owner: ObjectId,
    pub parameter: Parameter,
}

/// Ordered parameters of a trait, inherited ones first. Names are unique.
#[derive(Debug, Clone, Default)]
pub struct ParameterCollection {
    sequence: Vec<ParameterSlot>,
    lookup: AHashMap<String, usize>,
}

impl PartialEq for ParameterCollection {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl ParameterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a base trait's collection.
    pub fn extending(base: &ParameterCollection) -> Self {
        base.clone()
    }

    pub fn add(&mut self, owner: ObjectId, parameter: Parameter) -> ModelResult<usize> {
        if self.lookup.contains_key(&parameter.name) {
            return Err(ModelError::DuplicateParameter(parameter.name));
        }
        let index = self.sequence.len();
        self.lookup.insert(parameter.name.clone(), index);
        self.sequence.push(ParameterSlot { owner, parameter });
        Ok(index)
    }

    /// By name when one is given, else by position.
    pub fn resolve_parameter(&self, ordinal: usize, name: Option<&str>) -> ModelResult<usize> {
        match name {
            Some(name) => self
                .lookup
                .get(name)
                .copied()
                .ok_or_else(|| ModelError::UnknownParameter(name.to_string())),
            None if ordinal < self.sequence.len() => Ok(ordinal),
            None => Err(ModelError::ParameterOrdinalOutOfRange {
                ordinal,
                count: self.sequence.len(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.sequence.get(index).map(|slot| &slot.parameter)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.sequence.iter().map(|slot| &slot.parameter)
    }
}

/// Values bound to a trait's parameters, indexed like its collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValueSet {
    parameters: Rc<ParameterCollection>,
    values: Vec<Option<ParameterValue>>,
    was_set: Vec<bool>,
}

impl ParameterValueSet {
    /// `values` shorter than the collection are padded with unset entries.
    pub fn new(parameters: Rc<ParameterCollection>, mut values: Vec<Option<ParameterValue>>) -> Self {
        let count = parameters.len();
        values.resize(count, None);
        Self {
            parameters,
            values,
            was_set: vec![false; count],
        }
    }

    pub fn parameters(&self) -> &Rc<ParameterCollection> {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&ParameterValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.index_of(name).and_then(|i| self.value(i))
    }

    pub fn text_by_name(&self, name: &str) -> Option<&str> {
        self.value_by_name(name).and_then(ParameterValue::as_text)
    }

    pub fn was_set(&self, index: usize) -> bool {
        self.was_set.get(index).copied().unwrap_or(false)
    }

    pub(crate) fn set(&mut self, index: usize, value: Option<ParameterValue>, explicitly: bool) {
        if index < self.values.len() {
            self.values[index] = value;
            self.was_set[index] = explicitly;
        }
    }

    /// Set a parameter by name; unknown names are an error.
    pub fn set_by_name(&mut self, name: &str, value: ParameterValue) -> ModelResult<()> {
        let index = self
            .parameters
            .index_of(name)
            .ok_or_else(|| ModelError::UnknownParameter(name.to_string()))?;
        self.set(index, Some(value), true);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Parameter, Option<&ParameterValue>, bool)> {
        self.parameters
            .iter()
            .zip(self.values.iter())
            .zip(self.was_set.iter())
            .map(|((p, v), set)| (p, v.as_ref(), *set))
    }
}

/// Decide the value that wins when `new` is layered over `old`.
///
/// An unset override never clobbers. Two lookup tables of the same shape are
/// unioned row by row. Everything else is plain replacement.
pub fn replacement_value(
    old: Option<&ParameterValue>,
    new: &ParameterValue,
    was_set: bool,
    table_of: &mut TableLookup<'_>,
) -> Option<ParameterValue> {
    let Some(old) = old else {
        return Some(new.clone());
    };
    if !was_set {
        return Some(old.clone());
    }
    if old == new {
        return Some(new.clone());
    }
    if let (Some(a), Some(b)) = (table_of(old), table_of(new)) {
        if let Some(union) = union_tables(&a, &b) {
            return Some(ParameterValue::Table(Rc::new(union)));
        }
    }
    Some(new.clone())
}

/// Row union of two tables with the same shape, old rows first.
pub fn union_tables(old: &ConstantTable, new: &ConstantTable) -> Option<ConstantTable> {
    if old.shape != new.shape {
        return None;
    }
    let mut rows = old.rows.clone();
    for row in &new.rows {
        if !rows.contains(row) {
            rows.push(row.clone());
        }
    }
    Some(ConstantTable {
        shape: old.shape,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    fn ids() -> (ObjectId, ObjectId) {
        let mut arena = Arena::new();
        (arena.insert(()), arena.insert(()))
    }

    #[test]
    fn duplicate_parameter_names_are_rejected() {
        let (owner, _) = ids();
        let mut pc = ParameterCollection::new();
        pc.add(owner, Parameter::new("a")).unwrap();
        assert_eq!(
            pc.add(owner, Parameter::new("a")),
            Err(ModelError::DuplicateParameter("a".into()))
        );
    }

    #[test]
    fn resolve_parameter_by_name_and_ordinal() {
        let (owner, _) = ids();
        let mut pc = ParameterCollection::new();
        pc.add(owner, Parameter::new("first")).unwrap();
        pc.add(owner, Parameter::new("second")).unwrap();

        assert_eq!(pc.resolve_parameter(0, Some("second")), Ok(1));
        assert_eq!(pc.resolve_parameter(1, None), Ok(1));
        assert!(matches!(
            pc.resolve_parameter(0, Some("third")),
            Err(ModelError::UnknownParameter(_))
        ));
        assert!(matches!(
            pc.resolve_parameter(2, None),
            Err(ModelError::ParameterOrdinalOutOfRange { ordinal: 2, count: 2 })
        ));
    }

    #[test]
    fn unset_override_keeps_old_value() {
        let old = ParameterValue::text("kept");
        let new = ParameterValue::text("ignored");
        let got = replacement_value(Some(&old), &new, false, &mut no_tables);
        assert_eq!(got, Some(old));
    }

    #[test]
    fn same_shape_tables_union_rows() {
        let (shape, other_shape) = ids();
        let a = ConstantTable {
            shape,
            rows: vec![vec!["x".into()], vec!["y".into()]],
        };
        let b = ConstantTable {
            shape,
            rows: vec![vec!["y".into()], vec!["z".into()]],
        };
        let old = ParameterValue::Table(Rc::new(a.clone()));
        let new = ParameterValue::Table(Rc::new(b));
        let got = replacement_value(Some(&old), &new, true, &mut no_tables);
        let Some(ParameterValue::Table(t)) = got else {
            panic!("expected a table");
        };
        assert_eq!(t.rows.len(), 3);

        let c = ConstantTable {
            shape: other_shape,
            rows: vec![],
        };
        assert!(union_tables(&a, &c).is_none());
    }
}
