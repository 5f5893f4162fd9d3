use std::collections::{HashMap, HashSet};

/// Process-wide, read-mostly scope declarations: the default scope name,
/// the set of declared scopes, and the agent→accessible-scopes mapping.
/// An agent absent from `agent_access` can only reach `default`.
#[derive(Debug, Clone)]
pub struct ScopeConfig {
    pub default: String,
    pub definitions: HashSet<String>,
    pub agent_access: HashMap<String, HashSet<String>>,
}

impl ScopeConfig {
    #[must_use]
    pub fn new(default: impl Into<String>) -> Self {
        let default = default.into();
        let mut definitions = HashSet::new();
        definitions.insert(default.clone());
        Self {
            default,
            definitions,
            agent_access: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.definitions.insert(scope.into());
        self
    }

    #[must_use]
    pub fn with_agent_access(
        mut self,
        agent_id: impl Into<String>,
        scopes: impl IntoIterator<Item = String>,
    ) -> Self {
        self.agent_access
            .insert(agent_id.into(), scopes.into_iter().collect());
        self
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self::new(crate::record::DEFAULT_SCOPE)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeStats {
    pub total_scopes: usize,
    pub total_agents: usize,
}

/// Pure, immutable-after-construction policy engine resolving an agent
/// identity to its accessible scopes. Denial is the default: an agent with
/// no declared access set may only reach the configured default scope.
#[derive(Debug, Clone)]
pub struct ScopeManager {
    config: ScopeConfig,
}

impl ScopeManager {
    #[must_use]
    pub fn new(config: ScopeConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn default_scope(&self) -> &str {
        &self.config.default
    }

    /// The set of scopes `agent_id` may read or write. Absent agents get
    /// only the default scope.
    #[must_use]
    pub fn get_accessible_scopes(&self, agent_id: &str) -> HashSet<String> {
        self.config
            .agent_access
            .get(agent_id)
            .cloned()
            .unwrap_or_else(|| {
                let mut fallback = HashSet::new();
                fallback.insert(self.config.default.clone());
                fallback
            })
    }

    #[must_use]
    pub fn is_accessible(&self, scope: &str, agent_id: &str) -> bool {
        self.get_accessible_scopes(agent_id)
            .iter()
            .any(|rule| Self::rule_matches(rule, scope))
    }

    /// The scope a `store`/`recall` call should use when the caller
    /// supplies none: the configured default if the agent can reach it,
    /// otherwise whichever accessible scope sorts first.
    #[must_use]
    pub fn get_default_scope(&self, agent_id: &str) -> String {
        if self.is_accessible(&self.config.default, agent_id) {
            return self.config.default.clone();
        }
        let mut accessible: Vec<String> = self
            .get_accessible_scopes(agent_id)
            .into_iter()
            .collect();
        accessible.sort();
        accessible
            .into_iter()
            .next()
            .unwrap_or_else(|| self.config.default.clone())
    }

    #[must_use]
    pub fn get_stats(&self) -> ScopeStats {
        ScopeStats {
            total_scopes: self.config.definitions.len(),
            total_agents: self.config.agent_access.len(),
        }
    }

    /// Supports trailing-`*` wildcard rules (e.g. `project:*`) in addition
    /// to exact matches, matching the rule-matching behavior of the
    /// environment-driven scope policy this engine generalizes.
    fn rule_matches(rule: &str, scope: &str) -> bool {
        if rule == "*" {
            return true;
        }
        match rule.strip_suffix('*') {
            Some(prefix) => scope.starts_with(prefix),
            None => rule == scope,
        }
    }
}
