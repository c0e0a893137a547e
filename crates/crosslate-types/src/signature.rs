//! Member signatures - the name table key
//!
//! The target's dispatch mechanism conflates overloads that the source
//! distinguishes only by parameter types, so a member's identity for naming
//! purposes is its declared name plus the shape of each parameter.

use crate::ty::PrimitiveKind;
use std::fmt;

/// Canonical shape of one parameter, as rendered into a selector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamShape {
    Primitive(PrimitiveKind),
    /// Reference type, identified by its emitted class name
    Reference(String),
    Array(Box<ParamShape>),
}

impl ParamShape {
    /// Mnemonic used when encoding this shape into an identifier
    pub fn mnemonic(&self) -> String {
        match self {
            ParamShape::Primitive(p) => {
                let kw = p.keyword();
                let mut s = String::with_capacity(kw.len());
                let mut chars = kw.chars();
                if let Some(first) = chars.next() {
                    s.extend(first.to_uppercase());
                    s.extend(chars);
                }
                s
            }
            ParamShape::Reference(name) => name.clone(),
            ParamShape::Array(inner) => format!("{}Array", inner.mnemonic()),
        }
    }
}

impl fmt::Display for ParamShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic())
    }
}

/// Identity of a member within one type, for selector assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberSignature {
    pub name: String,
    pub params: Vec<ParamShape>,
    pub is_static: bool,
}

impl MemberSignature {
    pub fn new(name: impl Into<String>, params: Vec<ParamShape>) -> Self {
        MemberSignature {
            name: name.into(),
            params,
            is_static: false,
        }
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// A field has no parameter list
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

impl fmt::Display for MemberSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonics() {
        assert_eq!(ParamShape::Primitive(PrimitiveKind::Int).mnemonic(), "Int");
        assert_eq!(
            ParamShape::Reference("String".to_string()).mnemonic(),
            "String"
        );
        assert_eq!(
            ParamShape::Array(Box::new(ParamShape::Primitive(PrimitiveKind::Byte))).mnemonic(),
            "ByteArray"
        );
    }

    #[test]
    fn test_signature_display() {
        let sig = MemberSignature::new(
            "max",
            vec![
                ParamShape::Primitive(PrimitiveKind::Int),
                ParamShape::Primitive(PrimitiveKind::Int),
            ],
        );
        assert_eq!(sig.to_string(), "max(Int,Int)");
    }

    #[test]
    fn test_overloads_differ() {
        let a = MemberSignature::new("run", vec![ParamShape::Primitive(PrimitiveKind::Int)]);
        let b = MemberSignature::new("run", vec![ParamShape::Primitive(PrimitiveKind::Long)]);
        assert_ne!(a, b);
    }
}
