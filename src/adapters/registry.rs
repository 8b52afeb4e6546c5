use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    adapters::{
        c::C, cpp::Cpp, java::Java, javascript::JavaScript, python::Python,
        toolchain::NativeAdapter,
    },
    core::{
        domain::Language,
        errors::SystemError,
        traits::{adapter::LanguageAdapter, limiter::Limiter},
    },
};

/// Language id to adapter. Built once at startup, read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<Language, Arc<dyn LanguageAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every supported language, all sharing one limiter.
    pub fn native(limiter: Arc<dyn Limiter>) -> Self {
        Self::new()
            .with(Arc::new(NativeAdapter::new(C, limiter.clone())))
            .with(Arc::new(NativeAdapter::new(Cpp, limiter.clone())))
            .with(Arc::new(NativeAdapter::new(Python, limiter.clone())))
            .with(Arc::new(NativeAdapter::new(JavaScript, limiter.clone())))
            .with(Arc::new(NativeAdapter::new(Java, limiter)))
    }

    pub fn with(mut self, adapter: Arc<dyn LanguageAdapter>) -> Self {
        self.adapters.insert(adapter.language(), adapter);
        self
    }

    pub fn get(&self, language: Language) -> Result<Arc<dyn LanguageAdapter>, SystemError> {
        self.adapters
            .get(&language)
            .cloned()
            .ok_or_else(|| SystemError::UnsupportedLanguage(language.to_string()))
    }

    /// Accepts aliases such as `py`, `c++` or `node`.
    pub fn adapter_for(&self, id: &str) -> Result<Arc<dyn LanguageAdapter>, SystemError> {
        let language = id
            .parse::<Language>()
            .map_err(SystemError::UnsupportedLanguage)?;
        self.get(language)
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn LanguageAdapter>> {
        self.adapters.values()
    }
}
