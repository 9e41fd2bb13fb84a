//! # Interface Descriptions
//!
//! A parsed `.did` file: named type definitions plus an optional service.

use std::fmt;

use didlpack::is_plain_ident;
use didlpack::FuncType;
use didlpack::Type;
use didlpack::TypeEnv;

/// The actor a `.did` file describes.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    /// Documentation only.
    pub name: Option<String>,
    /// Installation arguments for `service : (init) -> { ... }`.
    pub init: Vec<Type>,
    /// A `Type::Service`, or a `Type::Var` naming one.
    pub ty: Type,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Did {
    pub env: TypeEnv,
    pub service: Option<Service>,
}

impl Did {
    /// Looks up a service method signature by name.
    pub fn method(&self, name: &str) -> Option<&FuncType> {
        let service = self.service.as_ref()?;
        self.env.method(&service.ty, name).ok().flatten()
    }

    /// Method names with their resolved signatures, in declaration order.
    pub fn methods(&self) -> Vec<(&str, &FuncType)> {
        let Some(service) = &self.service else {
            return Vec::new();
        };
        let Ok(Type::Service(methods)) = self.env.resolve(&service.ty) else {
            return Vec::new();
        };
        methods
            .iter()
            .filter_map(|m| self.env.as_func(&m.ty).ok().map(|func| (m.name.as_str(), func)))
            .collect()
    }

    /// The service must resolve to a service type whose methods all resolve to functions.
    pub(crate) fn validate(&self) -> didlpack::Result<()> {
        let Some(service) = &self.service else {
            return Ok(());
        };
        let Type::Service(methods) = self.env.resolve(&service.ty)? else {
            return Err(didlpack::Error::TypeMismatch {
                expected: "service".to_string(),
                found: service.ty.to_string(),
            });
        };
        for method in methods {
            self.env.as_func(&method.ty)?;
        }
        Ok(())
    }
}

fn write_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_ident(name) { f.write_str(name) } else { write!(f, "{:?}", name) }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.env)?;
        let Some(service) = &self.service else {
            return Ok(());
        };
        f.write_str("service ")?;
        if let Some(name) = &service.name {
            write!(f, "{} ", name)?;
        }
        f.write_str(": ")?;
        if !service.init.is_empty() {
            f.write_str("(")?;
            for (i, ty) in service.init.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", ty)?;
            }
            f.write_str(") -> ")?;
        }
        let Type::Service(methods) = &service.ty else {
            return write!(f, "{}", service.ty);
        };
        f.write_str("{\n")?;
        for method in methods {
            f.write_str("  ")?;
            write_name(f, &method.name)?;
            match &method.ty {
                Type::Func(func) => writeln!(f, " : {};", func)?,
                other => writeln!(f, " : {};", other)?,
            }
        }
        f.write_str("}")
    }
}
