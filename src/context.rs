use std::iter;

use crate::json_pointer::JsonPointer;
use crate::schema::{SchemaDocument, SchemaId};

/// Tracking that enclosing `unevaluated*` keywords ask of their siblings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationFlags {
    pub require_evaluated_properties: bool,
    pub require_evaluated_items: bool,
}

impl EvaluationFlags {
    pub fn union(self, other: EvaluationFlags) -> Self {
        Self {
            require_evaluated_properties: self.require_evaluated_properties
                || other.require_evaluated_properties,
            require_evaluated_items: self.require_evaluated_items || other.require_evaluated_items,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Segment<'a> {
    None,
    Key(&'a str),
    Index(usize),
}

/// Immutable, parent-linked evaluation scope.
///
/// Each link adds at most one evaluation-path segment. Links created by
/// [`EvaluationContext::enter_schema`] are frames of the dynamic scope; since the
/// chain lives on the call stack, a frame disappears when its validator returns.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    document: &'a SchemaDocument,
    parent: Option<&'a EvaluationContext<'a>>,
    segment: Segment<'a>,
    frame: Option<SchemaId>,
    flags: EvaluationFlags,
    depth: usize,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(document: &'a SchemaDocument) -> Self {
        Self {
            document,
            parent: None,
            segment: Segment::None,
            frame: None,
            flags: EvaluationFlags::default(),
            depth: 0,
        }
    }

    fn link(&'a self, segment: Segment<'a>, flags: EvaluationFlags) -> Self {
        Self {
            document: self.document,
            parent: Some(self),
            segment,
            frame: None,
            flags,
            depth: self.depth,
        }
    }

    /// Descends into a keyword of the current schema, same instance.
    pub fn keyword(&'a self, name: &'a str) -> Self {
        self.link(Segment::Key(name), self.flags)
    }

    /// A named branch of the current keyword (`dependentSchemas` entry), same instance.
    pub fn key(&'a self, name: &'a str) -> Self {
        self.link(Segment::Key(name), self.flags)
    }

    /// An indexed branch of the current keyword (`allOf/1`), same instance.
    pub fn index(&'a self, index: usize) -> Self {
        self.link(Segment::Index(index), self.flags)
    }

    /// A sub-schema applied to a property value (`properties/name`). Tracking resets.
    pub fn property(&'a self, name: &'a str) -> Self {
        self.link(Segment::Key(name), EvaluationFlags::default())
    }

    /// A positional sub-schema applied to an item (`prefixItems/0`). Tracking resets.
    pub fn item(&'a self, index: usize) -> Self {
        self.link(Segment::Index(index), EvaluationFlags::default())
    }

    /// A sub-schema applied to a child instance without its own path segment. Tracking resets.
    pub fn element(&'a self) -> Self {
        self.link(Segment::None, EvaluationFlags::default())
    }

    /// Pushes an object schema onto the dynamic scope, adding `flags` to the inherited ones.
    pub fn enter_schema(&'a self, schema: SchemaId, flags: EvaluationFlags) -> Self {
        Self {
            document: self.document,
            parent: Some(self),
            segment: Segment::None,
            frame: Some(schema),
            flags: self.flags.union(flags),
            depth: self.depth + 1,
        }
    }

    pub fn document(&self) -> &'a SchemaDocument {
        self.document
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn flags(&self) -> EvaluationFlags {
        self.flags
    }

    pub fn require_evaluated_properties(&self) -> bool {
        self.flags.require_evaluated_properties
    }

    pub fn require_evaluated_items(&self) -> bool {
        self.flags.require_evaluated_items
    }

    fn chain(&self) -> impl Iterator<Item = &EvaluationContext<'a>> {
        iter::successors(Some(self), |context| context.parent)
    }

    /// Enclosing object schemas, innermost first.
    pub fn dynamic_scope(&self) -> impl Iterator<Item = SchemaId> {
        self.chain().filter_map(|context| context.frame)
    }

    pub fn eval_path(&self) -> JsonPointer {
        let mut segments: Vec<Segment<'a>> = self.chain().map(|context| context.segment).collect();
        segments.reverse();

        let mut pointer = JsonPointer::root();
        for segment in segments {
            match segment {
                Segment::None => {}
                Segment::Key(key) => pointer.push_key(key),
                Segment::Index(index) => pointer.push_index(index),
            }
        }
        pointer
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::JsonSchema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn eval_path_follows_the_chain() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!(true))?;
        let root = EvaluationContext::new(schema.document());
        let all_of = root.keyword("allOf");
        let branch = all_of.index(1);
        let properties = branch.keyword("properties");
        let name = properties.property("name");

        assert_eq!(name.eval_path().to_string(), "/allOf/1/properties/name");
        Ok(())
    }

    #[test]
    fn flags_reset_on_instance_descent() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!(true))?;
        let root = EvaluationContext::new(schema.document());
        let flags = EvaluationFlags {
            require_evaluated_properties: true,
            require_evaluated_items: false,
        };
        let entered = root.enter_schema(schema.document().root(), flags);
        let branch = entered.keyword("anyOf");
        let property = branch.property("a");

        assert!(branch.require_evaluated_properties());
        assert!(!property.require_evaluated_properties());
        assert_eq!(entered.depth(), 1);
        Ok(())
    }

    #[test]
    fn dynamic_scope_lists_frames_innermost_first() -> Result<(), Box<dyn std::error::Error>> {
        let schema = JsonSchema::compile(&json!({"$defs": {"a": true}}))?;
        let document = schema.document();
        let outer = SchemaId::from_index(1);
        let inner = SchemaId::from_index(0);

        let root = EvaluationContext::new(document);
        let first = root.enter_schema(outer, EvaluationFlags::default());
        let keyword = first.keyword("$ref");
        let second = keyword.enter_schema(inner, EvaluationFlags::default());

        assert_eq!(
            second.dynamic_scope().collect::<Vec<_>>(),
            vec![inner, outer]
        );
        Ok(())
    }
}
