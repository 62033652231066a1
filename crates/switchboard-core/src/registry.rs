//! Specialist definitions and cached agent/provider instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use switchboard_tools::{RoleDirectory, ToolRegistry};
use switchboard_types::ApiError;
use switchboard_types::provider::{Provider, ProviderFactory};
use thiserror::Error;

use crate::agent::Agent;
use crate::loop_state::LoopLimits;

/// An agent shared between callers; the lock serializes its turns.
pub type SharedAgent = Arc<tokio::sync::Mutex<Agent>>;

/// How to build a specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistDefinition {
    pub role: String,
    pub objective: String,
    #[serde(default)]
    pub context: String,
    /// Model id; the registry's default model when absent.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub enable_google_search: bool,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown specialist role '{role}'. Available roles: {available}")]
    UnknownRole { role: String, available: String },

    #[error("Failed to create model client for '{model}': {source}")]
    Provider {
        model: String,
        #[source]
        source: ApiError,
    },
}

/// Builds specialist agents on demand and caches them.
///
/// Providers are cached per model id and agents per role. Reconfiguring
/// clears both caches entirely and bumps [`AgentRegistry::generation`].
/// Per-role tool sets outlive reconfiguration.
pub struct AgentRegistry {
    factory: Arc<dyn ProviderFactory>,
    default_model: String,
    limits: LoopLimits,
    generation: AtomicU64,
    inner: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    definitions: Vec<SpecialistDefinition>,
    tools: HashMap<String, ToolRegistry>,
    providers: HashMap<String, Arc<dyn Provider>>,
    agents: HashMap<String, SharedAgent>,
}

impl AgentRegistry {
    pub fn new(factory: Arc<dyn ProviderFactory>, default_model: impl Into<String>) -> Self {
        Self {
            factory,
            default_model: default_model.into(),
            limits: LoopLimits::default(),
            generation: AtomicU64::new(0),
            inner: Mutex::new(RegistryState::default()),
        }
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_definitions(self, definitions: Vec<SpecialistDefinition>) -> Self {
        self.configure(definitions);
        self
    }

    /// Give `role` its own function tools.
    pub fn with_tools(self, role: impl Into<String>, tools: ToolRegistry) -> Self {
        self.set_tools(role, tools);
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn limits(&self) -> &LoopLimits {
        &self.limits
    }

    /// Replace all specialist definitions and drop every cached instance.
    pub fn configure(&self, definitions: Vec<SpecialistDefinition>) {
        let mut state = self.inner.lock().unwrap();
        let mut unique: Vec<SpecialistDefinition> = Vec::with_capacity(definitions.len());
        for def in definitions {
            match unique.iter_mut().find(|d| d.role == def.role) {
                Some(existing) => {
                    tracing::warn!(role = %def.role, "duplicate specialist definition, keeping the last");
                    *existing = def;
                }
                None => unique.push(def),
            }
        }
        tracing::debug!(specialists = unique.len(), "agent registry configured");
        let tools = std::mem::take(&mut state.tools);
        *state = RegistryState {
            definitions: unique,
            tools,
            ..RegistryState::default()
        };
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Replace the tools of `role`, dropping its cached agent.
    pub fn set_tools(&self, role: impl Into<String>, tools: ToolRegistry) {
        let role = role.into();
        let mut state = self.inner.lock().unwrap();
        tracing::debug!(%role, tools = tools.len(), "specialist tools set");
        state.agents.remove(&role);
        state.tools.insert(role, tools);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Tools registered for `role`; empty when none were set.
    pub fn tools_for(&self, role: &str) -> ToolRegistry {
        let state = self.inner.lock().unwrap();
        state.tools.get(role).cloned().unwrap_or_default()
    }

    /// Counter bumped whenever definitions or tools change.
    ///
    /// Holders of specialists built from an older generation should rebuild them.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Roles in definition order.
    pub fn known_roles(&self) -> Vec<String> {
        let state = self.inner.lock().unwrap();
        state.definitions.iter().map(|d| d.role.clone()).collect()
    }

    pub fn definition(&self, role: &str) -> Option<SpecialistDefinition> {
        let state = self.inner.lock().unwrap();
        state.definitions.iter().find(|d| d.role == role).cloned()
    }

    /// Check that `role` is defined.
    pub fn validate_role(&self, role: &str) -> Result<SpecialistDefinition, RegistryError> {
        self.definition(role).ok_or_else(|| RegistryError::UnknownRole {
            role: role.to_string(),
            available: self.known_roles().join(", "),
        })
    }

    /// Provider for `model`, created once and reused.
    pub fn provider_for(&self, model: &str) -> Result<Arc<dyn Provider>, RegistryError> {
        let mut state = self.inner.lock().unwrap();
        if let Some(provider) = state.providers.get(model) {
            return Ok(Arc::clone(provider));
        }
        let provider = self
            .factory
            .create(model)
            .map_err(|source| RegistryError::Provider {
                model: model.to_string(),
                source,
            })?;
        tracing::debug!(%model, "created model client");
        state.providers.insert(model.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    /// Model id a specialist runs on.
    pub fn model_for(&self, definition: &SpecialistDefinition) -> String {
        definition
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// The cached agent for `role`, built on first use.
    pub fn get_agent(&self, role: &str) -> Result<SharedAgent, RegistryError> {
        if let Some(agent) = self.inner.lock().unwrap().agents.get(role) {
            return Ok(Arc::clone(agent));
        }

        let definition = self.validate_role(role)?;
        let provider = self.provider_for(&self.model_for(&definition))?;
        let agent = Agent::new(
            definition.role.clone(),
            definition.objective.clone(),
            definition.context.clone(),
            provider,
        )
        .with_tools(self.tools_for(role))
        .with_google_search(definition.enable_google_search)
        .with_limits(self.limits.clone());

        let mut state = self.inner.lock().unwrap();
        // A concurrent caller may have built it meanwhile; keep theirs.
        let shared = state
            .agents
            .entry(role.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(agent)));
        Ok(Arc::clone(shared))
    }

    pub fn cached_agents(&self) -> usize {
        self.inner.lock().unwrap().agents.len()
    }

    pub fn cached_providers(&self) -> usize {
        self.inner.lock().unwrap().providers.len()
    }
}

impl RoleDirectory for AgentRegistry {
    fn known_roles(&self) -> Vec<String> {
        AgentRegistry::known_roles(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use switchboard_tools::FunctionTool;
    use switchboard_types::{BoxFuture, GenerateRequest, GenerateResponse};

    struct EchoProvider;

    impl Provider for EchoProvider {
        fn generate_content<'a>(
            &'a self,
            request: &'a GenerateRequest,
        ) -> BoxFuture<'a, Result<GenerateResponse, ApiError>> {
            let text = request.prompt_text();
            Box::pin(async move { Ok(GenerateResponse::text(text)) })
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    impl ProviderFactory for CountingFactory {
        fn create(&self, model: &str) -> Result<Arc<dyn Provider>, ApiError> {
            if model.is_empty() {
                return Err(ApiError::BadRequest {
                    message: "empty model".into(),
                });
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(EchoProvider))
        }
    }

    fn def(role: &str, model: Option<&str>) -> SpecialistDefinition {
        SpecialistDefinition {
            role: role.into(),
            objective: format!("Handle {role}"),
            context: String::new(),
            model: model.map(str::to_string),
            enable_google_search: false,
        }
    }

    fn lookup_tools() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(FunctionTool::from_fn(
            "lookup_invoice",
            "Find an invoice",
            json!({"type": "object", "properties": {}}),
            |_| Ok(json!({"status": "paid"})),
        )));
        tools
    }

    fn registry(factory: Arc<CountingFactory>) -> AgentRegistry {
        AgentRegistry::new(factory, "base-model").with_definitions(vec![
            def("billing", None),
            def("travel", None),
            def("legal", Some("big-model")),
        ])
    }

    #[test]
    fn known_roles_keep_definition_order() {
        let registry = registry(Arc::default());
        assert_eq!(registry.known_roles(), vec!["billing", "travel", "legal"]);
    }

    #[test]
    fn unknown_role_lists_available() {
        let registry = registry(Arc::default());
        let err = registry.get_agent("astrology").err().unwrap();
        assert_eq!(
            err.to_string(),
            "Unknown specialist role 'astrology'. Available roles: billing, travel, legal"
        );
    }

    #[test]
    fn agents_and_providers_are_cached() {
        let factory = Arc::new(CountingFactory::default());
        let registry = registry(Arc::clone(&factory));

        let a = registry.get_agent("billing").unwrap();
        let b = registry.get_agent("billing").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        registry.get_agent("travel").unwrap();
        registry.get_agent("legal").unwrap();
        assert_eq!(registry.cached_agents(), 3);
        // billing and travel share the default model.
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert_eq!(registry.cached_providers(), 2);
    }

    #[test]
    fn configure_clears_both_caches() {
        let factory = Arc::new(CountingFactory::default());
        let registry = registry(Arc::clone(&factory));
        let before = registry.get_agent("billing").unwrap();

        registry.configure(vec![def("billing", None)]);
        assert_eq!(registry.cached_agents(), 0);
        assert_eq!(registry.cached_providers(), 0);
        assert_eq!(registry.known_roles(), vec!["billing"]);

        let after = registry.get_agent("billing").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn duplicate_definitions_keep_the_last() {
        let registry = AgentRegistry::new(Arc::new(CountingFactory::default()), "m")
            .with_definitions(vec![def("a", None), def("a", Some("other"))]);
        assert_eq!(registry.known_roles(), vec!["a"]);
        assert_eq!(registry.definition("a").unwrap().model.as_deref(), Some("other"));
    }

    #[test]
    fn factory_failure_is_reported() {
        let registry = AgentRegistry::new(Arc::new(CountingFactory::default()), "")
            .with_definitions(vec![def("a", None)]);
        assert!(matches!(
            registry.get_agent("a"),
            Err(RegistryError::Provider { .. })
        ));
    }

    #[test]
    fn specialist_agents_get_their_tools_and_search_flag() {
        let mut searcher = def("travel", None);
        searcher.enable_google_search = true;
        let registry = AgentRegistry::new(Arc::new(CountingFactory::default()), "m")
            .with_definitions(vec![def("billing", None), searcher])
            .with_tools("billing", lookup_tools());

        let billing = registry.get_agent("billing").unwrap();
        let billing = billing.try_lock().unwrap();
        assert!(billing.tools().has_tool("lookup_invoice"));
        assert!(!billing.google_search_enabled());

        let travel = registry.get_agent("travel").unwrap();
        let travel = travel.try_lock().unwrap();
        assert!(travel.tools().is_empty());
        assert!(travel.google_search_enabled());
    }

    #[test]
    fn set_tools_rebuilds_the_agent_and_bumps_generation() {
        let registry = registry(Arc::default());
        let before = registry.get_agent("billing").unwrap();
        let generation = registry.generation();

        registry.set_tools("billing", lookup_tools());
        assert!(registry.generation() > generation);
        let after = registry.get_agent("billing").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(after.try_lock().unwrap().tools().has_tool("lookup_invoice"));
    }

    #[test]
    fn tools_survive_reconfiguration() {
        let registry = registry(Arc::default()).with_tools("billing", lookup_tools());
        let generation = registry.generation();
        registry.configure(vec![def("billing", None)]);
        assert!(registry.generation() > generation);
        assert!(registry.tools_for("billing").has_tool("lookup_invoice"));
        assert!(registry.tools_for("travel").is_empty());
    }

    #[tokio::test]
    async fn cached_agent_runs_tasks() {
        let registry = registry(Arc::default());
        let agent = registry.get_agent("travel").unwrap();
        let text = agent.lock().await.execute("book a train").await;
        assert_eq!(text, "book a train");
    }
}
