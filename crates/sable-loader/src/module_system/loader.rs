// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loader - resolves, evaluates and caches modules

use super::cache::{ModuleCache, ModuleRecord};
use super::require::make_require;
use crate::error::{LoaderError, Result};
use crate::fs::{CanonicalPath, CompositeFileSystem, FileSystem, LocalFileSystem, SourceFile};
use crate::unload::UnloadRegistry;
use sable_script::sandbox::{ContextOptions, DefaultSandboxFactory, ExecutionContext, SandboxFactory};
use sable_script::{ObjectRef, Principal, Value, native_function};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Supplies exports for `(base, identifier)` without touching the filesystem.
pub type GetModuleExports = Box<dyn Fn(Option<&str>, &str) -> Option<Value>>;

/// Adjusts a module's context after the standard bindings are injected and
/// before its source runs.
pub type ModifyModuleContext = Box<dyn Fn(&ExecutionContext, &SourceFile) -> Result<()>>;

/// Decides whether a module may be evaluated and whether its exports may be
/// handed to the requester. Both checks allow by default.
pub trait SecurityPolicy {
    /// Called once per fresh module, before its context is created.
    fn allow_eval(&self, base: Option<&str>, identifier: &str, file: &SourceFile) -> bool {
        let _ = (base, identifier, file);
        true
    }

    /// Called on every `require()`, cached or not. `file` is `None` for
    /// exports supplied by the [`GetModuleExports`] hook.
    fn allow_import(
        &self,
        base: Option<&str>,
        identifier: &str,
        file: Option<&SourceFile>,
        exports: &Value,
    ) -> bool {
        let _ = (base, identifier, file, exports);
        true
    }
}

/// Source for [`Loader::run_script`].
#[derive(Debug, Clone)]
pub struct ScriptSource {
    /// Source text
    pub contents: String,
    /// File name for stack traces; `<string>` when `None`
    pub filename: Option<String>,
}

impl From<&str> for ScriptSource {
    fn from(contents: &str) -> Self {
        Self {
            contents: contents.to_string(),
            filename: None,
        }
    }
}

impl From<String> for ScriptSource {
    fn from(contents: String) -> Self {
        Self {
            contents,
            filename: None,
        }
    }
}

impl From<SourceFile> for ScriptSource {
    fn from(file: SourceFile) -> Self {
        Self {
            contents: file.contents,
            filename: Some(file.filename),
        }
    }
}

/// Builder for [`Loader`].
#[derive(Default)]
pub struct LoaderOptions {
    root_paths: Vec<PathBuf>,
    fs: Option<Box<dyn FileSystem>>,
    sandbox_factory: Option<Box<dyn SandboxFactory>>,
    default_principal: Principal,
    globals: Vec<(String, Value)>,
    modules: Vec<(CanonicalPath, Value)>,
    get_module_exports: Option<GetModuleExports>,
    modify_module_context: Option<ModifyModuleContext>,
    security_policy: Option<Box<dyn SecurityPolicy>>,
}

impl LoaderOptions {
    /// Start with no filesystem and a restricted default principal
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve modules from one directory (or the directory holding a file).
    pub fn root_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_paths = vec![path.into()];
        self
    }

    /// Serve modules from several directories, searched in order.
    pub fn root_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.root_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Use an explicit filesystem; overrides the root paths.
    pub fn fs(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Some(Box::new(fs));
        self
    }

    /// Use an explicit sandbox factory; overrides the default principal.
    pub fn sandbox_factory(mut self, factory: impl SandboxFactory + 'static) -> Self {
        self.sandbox_factory = Some(Box::new(factory));
        self
    }

    /// Principal for module contexts when no factory is given.
    pub fn default_principal(mut self, principal: Principal) -> Self {
        self.default_principal = principal;
        self
    }

    /// Inject a global into every context.
    pub fn global(mut self, name: &str, value: Value) -> Self {
        self.globals.retain(|(existing, _)| existing != name);
        self.globals.push((name.to_string(), value));
        self
    }

    /// Preseed the cache with a finished module.
    pub fn module(mut self, path: impl Into<CanonicalPath>, exports: Value) -> Self {
        self.modules.push((path.into(), exports));
        self
    }

    /// Install a [`GetModuleExports`] hook.
    pub fn get_module_exports(
        mut self,
        hook: impl Fn(Option<&str>, &str) -> Option<Value> + 'static,
    ) -> Self {
        self.get_module_exports = Some(Box::new(hook));
        self
    }

    /// Install a [`ModifyModuleContext`] hook.
    pub fn modify_module_context(
        mut self,
        hook: impl Fn(&ExecutionContext, &SourceFile) -> Result<()> + 'static,
    ) -> Self {
        self.modify_module_context = Some(Box::new(hook));
        self
    }

    /// Install a security policy.
    pub fn security_policy(mut self, policy: impl SecurityPolicy + 'static) -> Self {
        self.security_policy = Some(Box::new(policy));
        self
    }

    /// Build the loader
    pub fn build(self) -> Result<Loader> {
        let fs: Box<dyn FileSystem> = match self.fs {
            Some(fs) => fs,
            None => match self.root_paths.as_slice() {
                [] => {
                    return Err(LoaderError::Config(
                        "Need a root path for module filesystem".to_string(),
                    ));
                }
                [root] => Box::new(LocalFileSystem::new(root)?),
                roots => {
                    let mut members: Vec<Box<dyn FileSystem>> = Vec::with_capacity(roots.len());
                    for root in roots {
                        members.push(Box::new(LocalFileSystem::new(root)?));
                    }
                    Box::new(CompositeFileSystem::new(members))
                }
            },
        };
        let sandbox_factory = self
            .sandbox_factory
            .unwrap_or_else(|| Box::new(DefaultSandboxFactory::new(self.default_principal)));

        let cache = ModuleCache::new();
        for (path, exports) in self.modules {
            cache.preseed(path, exports);
        }

        tracing::debug!(
            principal = %sandbox_factory.default_principal(),
            globals = self.globals.len(),
            "module loader created"
        );
        Ok(Loader {
            inner: Rc::new(LoaderInner {
                fs,
                sandbox_factory,
                cache,
                globals: RefCell::new(self.globals),
                contexts: RefCell::default(),
                files: RefCell::default(),
                get_module_exports: self.get_module_exports,
                modify_module_context: self.modify_module_context,
                security_policy: self.security_policy,
                unload: UnloadRegistry::new(),
            }),
        })
    }
}

/// A CommonJS module loader. Clones share the same cache.
#[derive(Clone)]
pub struct Loader {
    inner: Rc<LoaderInner>,
}

pub(crate) struct LoaderInner {
    fs: Box<dyn FileSystem>,
    sandbox_factory: Box<dyn SandboxFactory>,
    cache: ModuleCache,
    globals: RefCell<Vec<(String, Value)>>,
    contexts: RefCell<HashMap<CanonicalPath, ExecutionContext>>,
    files: RefCell<HashMap<CanonicalPath, SourceFile>>,
    get_module_exports: Option<GetModuleExports>,
    modify_module_context: Option<ModifyModuleContext>,
    security_policy: Option<Box<dyn SecurityPolicy>>,
    unload: UnloadRegistry,
}

impl Loader {
    /// Start building a loader
    pub fn builder() -> LoaderOptions {
        LoaderOptions::new()
    }

    /// Requires a module from the top level (no requesting module).
    pub fn require(&self, identifier: &str) -> Result<Value> {
        self.inner.require(None, identifier)
    }

    /// Requires a module as if from the module at `base`.
    pub fn require_from(&self, base: Option<&str>, identifier: &str) -> Result<Value> {
        self.inner.require(base, identifier)
    }

    /// Loads the module at an already resolved `path` from the top level,
    /// skipping the import check. For embedders that vetted the module
    /// themselves.
    pub fn require_path(&self, path: &str, identifier: &str) -> Result<Value> {
        self.inner.require_path(path, identifier)
    }

    /// Resolves without loading.
    pub fn resolve(&self, base: Option<&str>, identifier: &str) -> Result<Option<CanonicalPath>> {
        self.inner.fs.resolve_module(base, identifier)
    }

    /// Fetches the source of a resolved module without evaluating it.
    pub fn fetch(&self, path: &str) -> Result<SourceFile> {
        self.inner.fs.get_file(path)
    }

    /// Evaluates a script in a fresh context with a top-level `require`.
    /// Nothing is cached.
    pub fn run_script(&self, source: impl Into<ScriptSource>) -> Result<Value> {
        let source = source.into();
        self.script_context(source.filename.clone())
            .evaluate(&source.contents, source.filename.as_deref())
            .map_err(LoaderError::from_script)
    }

    /// A context like the one [`run_script`](Self::run_script) uses, for
    /// callers that evaluate several scripts against the same globals.
    pub fn script_context(&self, filename: Option<String>) -> ExecutionContext {
        let context = self.inner.create_context(ContextOptions {
            principal: None,
            filename,
        });
        self.inner.inject_globals(&context, None);
        context
    }

    /// The context a module was evaluated in, loading the module first if
    /// needed.
    pub fn find_context_for_module(&self, identifier: &str) -> Result<ExecutionContext> {
        let path = self
            .resolve(None, identifier)?
            .ok_or_else(|| LoaderError::module_not_found(identifier))?;
        if !self.inner.contexts.borrow().contains_key(&path) {
            self.require(identifier)?;
        }
        self.inner
            .contexts
            .borrow()
            .get(&path)
            .cloned()
            .ok_or_else(|| LoaderError::module_not_found(identifier))
    }

    /// Drops a module from the cache so the next `require()` evaluates it
    /// again. Returns false when it was not loaded.
    pub fn forget(&self, identifier: &str) -> Result<bool> {
        let Some(path) = self.resolve(None, identifier)? else {
            return Ok(false);
        };
        tracing::debug!(%path, "forgetting module");
        Ok(self.inner.discard(&path))
    }

    /// Runs the unload callbacks, newest first, then empties the cache.
    pub fn unload(&self, reason: &str) {
        tracing::info!(%reason, modules = self.inner.cache.len(), "unloading");
        self.inner.unload.run(reason);
        self.inner.cache.clear();
        self.inner.contexts.borrow_mut().clear();
        self.inner.files.borrow_mut().clear();
    }

    /// Registers a callback for [`unload`](Self::unload).
    pub fn on_unload(&self, callback: impl FnOnce(&str) + 'static) {
        self.inner.unload.when(callback);
    }

    /// Adds a global for contexts created from now on.
    pub fn define_global(&self, name: &str, value: Value) {
        let mut globals = self.inner.globals.borrow_mut();
        globals.retain(|(existing, _)| existing != name);
        globals.push((name.to_string(), value));
    }

    /// The module cache.
    pub fn cache(&self) -> &ModuleCache {
        &self.inner.cache
    }

    /// Source of a loaded module.
    pub fn source_of(&self, path: &str) -> Option<SourceFile> {
        self.inner.files.borrow().get(path).cloned()
    }

    /// Principal given to module contexts.
    pub fn default_principal(&self) -> Principal {
        self.inner.sandbox_factory.default_principal()
    }
}

impl LoaderInner {
    pub(crate) fn fs(&self) -> &dyn FileSystem {
        &*self.fs
    }

    pub(crate) fn require(self: &Rc<Self>, base: Option<&str>, identifier: &str) -> Result<Value> {
        if let Some(hook) = &self.get_module_exports {
            if let Some(exports) = hook(base, identifier) {
                self.check_import(base, identifier, None, &exports)?;
                return Ok(exports);
            }
        }

        let path = self
            .fs
            .resolve_module(base, identifier)?
            .ok_or_else(|| LoaderError::module_not_found(identifier))?;

        let exports = match self.cache.exports(&path) {
            Some(exports) => {
                tracing::trace!(%path, "module cache hit");
                exports
            }
            None => match self.load(base, identifier, &path) {
                Ok(exports) => exports,
                Err(e) => {
                    tracing::debug!(%path, error = %e, "module failed to load");
                    self.discard(&path);
                    return Err(e);
                }
            },
        };

        let file = self.files.borrow().get(&path).cloned();
        self.check_import(base, identifier, file.as_ref(), &exports)?;
        Ok(exports)
    }

    fn require_path(self: &Rc<Self>, path: &str, identifier: &str) -> Result<Value> {
        if let Some(exports) = self.cache.exports(path) {
            return Ok(exports);
        }
        self.load(None, identifier, path).inspect_err(|e| {
            tracing::debug!(%path, error = %e, "module failed to load");
            self.discard(path);
        })
    }

    fn load(self: &Rc<Self>, base: Option<&str>, identifier: &str, path: &str) -> Result<Value> {
        let file = self.fs.get_file(path)?;
        if let Some(policy) = &self.security_policy {
            if !policy.allow_eval(base, identifier, &file) {
                return Err(LoaderError::AccessDenied {
                    action: "execute".to_string(),
                    module: identifier.to_string(),
                });
            }
        }
        tracing::debug!(%path, %identifier, "evaluating module");

        let exports = Value::Object(ObjectRef::ordinary());
        let module = ObjectRef::ordinary();
        module.set("id", Value::from(identifier));
        module.set("exports", exports.clone());
        module.set("uri", Value::from(path));
        module.set(
            "setExports",
            native_function("setExports", |this, args| {
                let exports = sable_script::runtime::arg(args, 0);
                if let Value::Object(module) = this {
                    module.set("exports", exports.clone());
                }
                Ok(exports)
            }),
        );

        self.cache.insert(ModuleRecord {
            canonical_path: path.to_string(),
            id: identifier.to_string(),
            exports: exports.clone(),
            loaded: false,
        });

        let context = self.create_context(ContextOptions::for_file(&file.filename));
        self.contexts
            .borrow_mut()
            .insert(path.to_string(), context.clone());
        self.files
            .borrow_mut()
            .insert(path.to_string(), file.clone());

        self.inject_globals(&context, Some(path));
        context.define_global("exports", exports.clone());
        context.define_global("module", Value::Object(module.clone()));
        context.define_global("__url__", Value::from(file.filename.as_str()));
        if let Some(hook) = &self.modify_module_context {
            hook(&context, &file)?;
        }

        context
            .evaluate(&file.contents, Some(&file.filename))
            .map_err(LoaderError::from_script)?;

        let exports = match module.get("exports") {
            after if after.strict_equals(&exports) => exports,
            after => {
                self.cache.set_exports(path, after.clone());
                after
            }
        };
        self.cache.mark_loaded(path);
        Ok(exports)
    }

    fn create_context(&self, options: ContextOptions) -> ExecutionContext {
        self.sandbox_factory.create_context(options)
    }

    fn inject_globals(self: &Rc<Self>, context: &ExecutionContext, base: Option<&str>) {
        for (name, value) in self.globals.borrow().iter() {
            context.define_global(name, value.clone());
        }
        context.define_global("require", make_require(self, base.map(str::to_string)));
    }

    fn check_import(
        &self,
        base: Option<&str>,
        identifier: &str,
        file: Option<&SourceFile>,
        exports: &Value,
    ) -> Result<()> {
        match &self.security_policy {
            Some(policy) if !policy.allow_import(base, identifier, file, exports) => {
                Err(LoaderError::AccessDenied {
                    action: "import".to_string(),
                    module: identifier.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn discard(&self, path: &str) -> bool {
        self.contexts.borrow_mut().remove(path);
        self.files.borrow_mut().remove(path);
        self.cache.remove(path).is_some()
    }
}
