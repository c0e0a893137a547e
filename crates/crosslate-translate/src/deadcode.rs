//! Dead code stripping
//!
//! Consumes a strip-directive map (typically produced by an external usage
//! report) and removes the matched types and members before any other pass
//! observes the graph, so removed members never receive capture records,
//! boxing conversions, or release-set entries.
//!
//! Policy: removing a type removes all its members (and nested declarations)
//! transitively; removing a single member removes only that member. There is
//! no call-graph reachability pruning beyond the explicit map, and unmatched
//! patterns are silent no-ops since the map may be written against a superset
//! of compilation units.

use crate::error::{PipelineError, TranslateResult};
use crate::name_table::shape_of;
use crosslate_ast::{CompilationUnit, Member, Nesting, TypeDeclId};
use crosslate_types::TypeTable;
use serde::Deserialize;

/// A name pattern with optional `*` at one end (no mid-pattern wildcards)
#[derive(Debug, Clone, PartialEq, Eq)]
enum NamePattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Any,
}

impl NamePattern {
    fn parse(text: &str) -> Result<Self, String> {
        if text.is_empty() {
            return Err("empty name".to_string());
        }
        if text == "*" {
            return Ok(NamePattern::Any);
        }
        let inner_star = text.len() >= 2 && text[1..text.len() - 1].contains('*');
        if inner_star || (text.starts_with('*') && text.ends_with('*')) {
            return Err("`*` is only supported as a prefix or suffix".to_string());
        }
        if let Some(rest) = text.strip_suffix('*') {
            Ok(NamePattern::Prefix(rest.to_string()))
        } else if let Some(rest) = text.strip_prefix('*') {
            Ok(NamePattern::Suffix(rest.to_string()))
        } else {
            Ok(NamePattern::Exact(text.to_string()))
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Exact(t) => name == t,
            NamePattern::Prefix(t) => name.starts_with(t),
            NamePattern::Suffix(t) => name.ends_with(t),
            NamePattern::Any => true,
        }
    }
}

/// One strip directive
#[derive(Debug, Clone, PartialEq)]
enum StripDirective {
    /// Remove a whole type (members and nested declarations transitively)
    Type(NamePattern),
    /// Remove one member of a type; `params` of `None` matches every overload
    Member {
        ty: NamePattern,
        member: NamePattern,
        params: Option<Vec<String>>,
    },
}

/// Set of strip directives, validated before the pipeline starts and
/// immutable thereafter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeadCodeMap {
    directives: Vec<StripDirective>,
}

impl DeadCodeMap {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the line-oriented form: `Type`, `Type.member` or
    /// `Type.member(Shape,Shape)`, one directive per line; blank lines and
    /// `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, PipelineError> {
        let mut directives = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            directives.push(Self::parse_directive(line)?);
        }
        Ok(DeadCodeMap { directives })
    }

    /// Parse the JSON form: an array of directive strings
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let lines: Vec<String> =
            serde_json::from_str(json).map_err(|e| PipelineError::BadDeadCodeMap {
                pattern: json.chars().take(40).collect(),
                reason: e.to_string(),
            })?;
        let mut directives = Vec::new();
        for line in &lines {
            directives.push(Self::parse_directive(line.trim())?);
        }
        Ok(DeadCodeMap { directives })
    }

    fn parse_directive(text: &str) -> Result<StripDirective, PipelineError> {
        let bad = |reason: &str| PipelineError::BadDeadCodeMap {
            pattern: text.to_string(),
            reason: reason.to_string(),
        };

        match text.split_once('.') {
            None => {
                let pattern = NamePattern::parse(text).map_err(|r| bad(&r))?;
                Ok(StripDirective::Type(pattern))
            }
            Some((ty, member)) => {
                let ty = NamePattern::parse(ty).map_err(|r| bad(&r))?;
                let (member, params) = match member.split_once('(') {
                    None => (member, None),
                    Some((name, rest)) => {
                        let inner = rest
                            .strip_suffix(')')
                            .ok_or_else(|| bad("unterminated parameter list"))?;
                        let params = if inner.is_empty() {
                            Vec::new()
                        } else {
                            inner.split(',').map(|p| p.trim().to_string()).collect()
                        };
                        (name, Some(params))
                    }
                };
                let member = NamePattern::parse(member).map_err(|r| bad(&r))?;
                Ok(StripDirective::Member { ty, member, params })
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    fn matches_type(&self, name: &str) -> bool {
        self.directives.iter().any(|d| match d {
            StripDirective::Type(pattern) => pattern.matches(name),
            StripDirective::Member { .. } => false,
        })
    }

    fn matches_member(&self, type_name: &str, member_name: &str, shapes: &[String]) -> bool {
        self.directives.iter().any(|d| match d {
            StripDirective::Type(_) => false,
            StripDirective::Member { ty, member, params } => {
                ty.matches(type_name)
                    && member.matches(member_name)
                    && params
                        .as_ref()
                        .map(|p| p.iter().map(String::as_str).eq(shapes.iter().map(String::as_str)))
                        .unwrap_or(true)
            }
        })
    }
}

/// JSON deserialization accepts the array-of-strings form directly
impl<'de> Deserialize<'de> for DeadCodeMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let lines = Vec::<String>::deserialize(deserializer)?;
        let mut directives = Vec::new();
        for line in &lines {
            directives.push(
                DeadCodeMap::parse_directive(line.trim()).map_err(serde::de::Error::custom)?,
            );
        }
        Ok(DeadCodeMap { directives })
    }
}

/// The dead code eliminator pass
pub struct DeadCodeEliminator<'a> {
    map: &'a DeadCodeMap,
}

impl<'a> DeadCodeEliminator<'a> {
    pub fn new(map: &'a DeadCodeMap) -> Self {
        DeadCodeEliminator { map }
    }

    /// Strip matched declarations and members from one unit
    pub fn run(&self, unit: &mut CompilationUnit, types: &TypeTable) -> TranslateResult<()> {
        if self.map.is_empty() {
            return Ok(());
        }

        // Whole-type directives first.
        for id in unit.live_ids() {
            if self.map.matches_type(&unit.decl(id).name) {
                self.strip_type(unit, id);
            }
        }

        // A nested declaration whose owner chain hits a stripped type goes
        // with it.
        for id in unit.live_ids() {
            let mut owner = unit.decl(id).nesting.owner();
            while let Some(o) = owner {
                if unit.decl(o).stripped {
                    self.strip_type(unit, id);
                    break;
                }
                owner = unit.decl(o).nesting.owner();
            }
        }

        // Member directives against the survivors.
        for id in unit.live_ids() {
            let type_name = unit.decl(id).name.clone();
            let mut kept = Vec::new();
            for member in std::mem::take(&mut unit.decl_mut(id).members) {
                if self.member_matches(&type_name, &member, types)? {
                    continue;
                }
                kept.push(member);
            }
            unit.decl_mut(id).members = kept;
        }

        Ok(())
    }

    fn strip_type(&self, unit: &mut CompilationUnit, id: TypeDeclId) {
        let decl = unit.decl_mut(id);
        decl.stripped = true;
        decl.members.clear();
        let top = matches!(decl.nesting, Nesting::TopLevel);
        if top {
            unit.top_level.retain(|t| *t != id);
        }
    }

    fn member_matches(
        &self,
        type_name: &str,
        member: &Member,
        types: &TypeTable,
    ) -> TranslateResult<bool> {
        let (name, params) = match member {
            Member::Field(f) => (f.name.as_str(), &[][..]),
            Member::Method(m) => (m.name.as_str(), m.params.as_slice()),
            Member::Constructor(c) => ("init", c.params.as_slice()),
            // Initializer blocks have no name to match.
            Member::InitBlock(_) => return Ok(false),
        };
        let shapes = params
            .iter()
            .map(|p| shape_of(&p.ty, types).map(|s| s.mnemonic()))
            .collect::<TranslateResult<Vec<_>>>()?;
        Ok(self.map.matches_member(type_name, name, &shapes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslate_ast::{DeclKind, Field, Method, Param, TypeDecl, Block};
    use crosslate_types::{well_known, BindingId, PrimitiveKind, TypeRef};

    fn unit_with_foo() -> CompilationUnit {
        let mut unit = CompilationUnit::new("Foo.src");
        let mut foo = TypeDecl::new("Foo", BindingId(well_known::FIRST_USER), DeclKind::Class);
        foo.members.push(Member::Method(Method::new(
            "helper",
            vec![],
            TypeRef::Void,
            Block::default(),
        )));
        foo.members.push(Member::Method(Method::new(
            "helper",
            vec![Param::new("n", TypeRef::Primitive(PrimitiveKind::Int))],
            TypeRef::Void,
            Block::default(),
        )));
        foo.members
            .push(Member::Field(Field::new("count", TypeRef::Primitive(PrimitiveKind::Int))));
        unit.alloc(foo);
        unit
    }

    #[test]
    fn test_parse_rejects_mid_pattern_wildcard() {
        let err = DeadCodeMap::parse("Fo*o").unwrap_err();
        assert!(matches!(err, PipelineError::BadDeadCodeMap { .. }));
    }

    #[test]
    fn test_parse_rejects_unterminated_params() {
        let err = DeadCodeMap::parse("Foo.helper(Int").unwrap_err();
        assert!(matches!(err, PipelineError::BadDeadCodeMap { .. }));
    }

    #[test]
    fn test_strip_single_member_keeps_type() {
        // Scenario D: stripping Foo.helper() leaves Foo and its other
        // members; calls elsewhere are not this pass's concern.
        let map = DeadCodeMap::parse("Foo.helper()").unwrap();
        let mut unit = unit_with_foo();
        let types = TypeTable::new();
        DeadCodeEliminator::new(&map).run(&mut unit, &types).unwrap();

        let foo = unit.decl(crosslate_ast::TypeDeclId(0));
        assert!(!foo.stripped);
        // The zero-arg overload is gone, the one-arg overload and the field
        // survive.
        assert_eq!(foo.methods().count(), 1);
        assert_eq!(foo.methods().next().unwrap().params.len(), 1);
        assert!(foo.find_field("count").is_some());
    }

    #[test]
    fn test_strip_member_without_params_matches_all_overloads() {
        let map = DeadCodeMap::parse("Foo.helper").unwrap();
        let mut unit = unit_with_foo();
        let types = TypeTable::new();
        DeadCodeEliminator::new(&map).run(&mut unit, &types).unwrap();
        assert_eq!(unit.decl(crosslate_ast::TypeDeclId(0)).methods().count(), 0);
    }

    #[test]
    fn test_strip_whole_type() {
        let map = DeadCodeMap::parse("Foo").unwrap();
        let mut unit = unit_with_foo();
        let types = TypeTable::new();
        DeadCodeEliminator::new(&map).run(&mut unit, &types).unwrap();
        let foo = unit.decl(crosslate_ast::TypeDeclId(0));
        assert!(foo.stripped);
        assert!(foo.members.is_empty());
        assert!(unit.top_level.is_empty());
    }

    #[test]
    fn test_wildcards() {
        let map = DeadCodeMap::parse("*Test\nLegacy*").unwrap();
        assert!(map.matches_type("FooTest"));
        assert!(map.matches_type("LegacyAdapter"));
        assert!(!map.matches_type("Foo"));
    }

    #[test]
    fn test_unmatched_patterns_are_noops() {
        let map = DeadCodeMap::parse("NoSuchType\nNoSuchType.member").unwrap();
        let mut unit = unit_with_foo();
        let before = unit.decl(crosslate_ast::TypeDeclId(0)).clone();
        let types = TypeTable::new();
        DeadCodeEliminator::new(&map).run(&mut unit, &types).unwrap();
        assert_eq!(*unit.decl(crosslate_ast::TypeDeclId(0)), before);
    }

    #[test]
    fn test_json_form() {
        let map = DeadCodeMap::from_json(r#"["Foo.helper()", "Bar"]"#).unwrap();
        assert!(map.matches_type("Bar"));
        assert!(map.matches_member("Foo", "helper", &[]));
        assert!(!map.matches_member("Foo", "helper", &["Int".to_string()]));
    }
}
