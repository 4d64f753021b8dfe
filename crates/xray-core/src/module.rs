//! Namespace tree for hierarchical target programs.
//!
//! [`Module`] is one namespace: child modules, functions, and an optional
//! top-level statement body (the target of module execution). [`Program`]
//! wraps the root module and resolves dot-delimited qualified names -- the
//! namespace-resolver collaborator every observed run starts with.
//!
//! Qualified names are dotted paths from the root: a function `add` in module
//! `util` under root `app` is `app.util.add`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::Stmt;
use crate::error::CoreError;
use crate::function::Function;

/// One namespace in the module tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Top-level statements executed by module execution.
    pub body: Vec<Stmt>,
    functions: IndexMap<String, Function>,
    children: IndexMap<String, Module>,
}

impl Module {
    /// Creates an empty module with no body.
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            body: Vec::new(),
            functions: IndexMap::new(),
            children: IndexMap::new(),
        }
    }

    /// Sets the module's top-level body.
    pub fn set_body(&mut self, body: Vec<Stmt>) {
        self.body = body;
    }

    /// Registers a function in this module.
    ///
    /// Returns [`CoreError::DuplicateFunction`] if the name is taken.
    pub fn add_function(&mut self, function: Function) -> Result<(), CoreError> {
        if self.functions.contains_key(&function.name) {
            return Err(CoreError::DuplicateFunction {
                name: function.name,
            });
        }
        self.functions.insert(function.name.clone(), function);
        Ok(())
    }

    /// Registers a child module.
    ///
    /// Returns [`CoreError::DuplicateModule`] if the name is taken.
    pub fn add_child(&mut self, child: Module) -> Result<(), CoreError> {
        if self.children.contains_key(&child.name) {
            return Err(CoreError::DuplicateModule { name: child.name });
        }
        self.children.insert(child.name.clone(), child);
        Ok(())
    }

    /// Looks up a function by unqualified name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Looks up a child module by name.
    pub fn child(&self, name: &str) -> Option<&Module> {
        self.children.get(name)
    }

    /// Functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Child modules in declaration order.
    pub fn children(&self) -> impl Iterator<Item = &Module> {
        self.children.values()
    }
}

/// What a qualified name resolved to.
#[derive(Debug)]
pub enum Resolved<'p> {
    /// A function, with the qualified path of its owning module.
    Function {
        module_path: String,
        function: &'p Function,
    },
    /// A module, with its own qualified path.
    Module { path: String, module: &'p Module },
}

/// A complete target program: the root module plus name resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    root: Module,
}

impl Program {
    pub fn new(root: Module) -> Self {
        Program { root }
    }

    pub fn root(&self) -> &Module {
        &self.root
    }

    /// Resolves a dot-delimited qualified name to a function or module.
    ///
    /// The first segment must be the root module's name. Intermediate
    /// segments must be modules; the final segment may be a function or a
    /// module. Unknown names surface [`CoreError::FunctionNotFound`] or
    /// [`CoreError::ModuleNotFound`].
    pub fn resolve(&self, qualified: &str) -> Result<Resolved<'_>, CoreError> {
        let mut segments = qualified.split('.');
        let first = segments.next().filter(|s| !s.is_empty()).ok_or_else(|| {
            CoreError::InvalidPath {
                path: qualified.to_string(),
            }
        })?;
        if first != self.root.name {
            return Err(CoreError::InvalidPath {
                path: qualified.to_string(),
            });
        }

        let mut current = &self.root;
        let mut path = first.to_string();
        let rest: Vec<&str> = segments.collect();

        for (i, segment) in rest.iter().enumerate() {
            if segment.is_empty() {
                return Err(CoreError::InvalidPath {
                    path: qualified.to_string(),
                });
            }
            let last = i == rest.len() - 1;
            if let Some(child) = current.child(segment) {
                current = child;
                path = format!("{path}.{segment}");
                continue;
            }
            if last {
                if let Some(function) = current.function(segment) {
                    return Ok(Resolved::Function {
                        module_path: path,
                        function,
                    });
                }
                return Err(CoreError::FunctionNotFound {
                    name: qualified.to_string(),
                });
            }
            return Err(CoreError::ModuleNotFound {
                name: format!("{path}.{segment}"),
            });
        }

        Ok(Resolved::Module {
            path,
            module: current,
        })
    }
}
