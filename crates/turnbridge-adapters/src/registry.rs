use turnbridge_protocol::ThreadId;

use crate::adapter::EngineAdapter;
use crate::claude::ClaudeCodeAdapter;
use crate::codex::CodexAdapter;
use crate::engine::EngineKind;
use crate::gemini::GeminiAdapter;
use crate::opencode::OpenCodeAdapter;

/// Holds one adapter per engine family and selects by inspecting the
/// thread identifier's prefix; unknown prefixes fall back to the primary
/// engine's adapter.
pub struct AdapterRegistry {
    codex: CodexAdapter,
    claude: ClaudeCodeAdapter,
    gemini: GeminiAdapter,
    opencode: OpenCodeAdapter,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            codex: CodexAdapter,
            claude: ClaudeCodeAdapter,
            gemini: GeminiAdapter,
            opencode: OpenCodeAdapter,
        }
    }

    pub fn select_adapter(&self, thread_id: &ThreadId) -> &dyn EngineAdapter {
        match EngineKind::from_thread_id(thread_id) {
            EngineKind::Codex => &self.codex,
            EngineKind::ClaudeCode => &self.claude,
            EngineKind::Gemini => &self.gemini,
            EngineKind::OpenCode => &self.opencode,
        }
    }
}

#[cfg(test)]
mod tests {
    use turnbridge_protocol::ThreadId;

    use super::AdapterRegistry;
    use crate::engine::EngineKind;

    #[test]
    fn selection_follows_thread_id_prefixes() {
        let registry = AdapterRegistry::new();
        assert_eq!(
            registry
                .select_adapter(&ThreadId::pending("opencode", "1"))
                .engine(),
            EngineKind::OpenCode
        );
        assert_eq!(
            registry.select_adapter(&ThreadId::new("claude_abc")).engine(),
            EngineKind::ClaudeCode
        );
    }

    #[test]
    fn unknown_prefixes_use_the_primary_adapter() {
        let registry = AdapterRegistry::new();
        assert_eq!(
            registry
                .select_adapter(&ThreadId::new("mystery-thread"))
                .engine(),
            EngineKind::PRIMARY
        );
    }
}
