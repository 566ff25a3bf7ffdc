use turnbridge_protocol::ThreadId;

/// The four backend engine families. Each mints pending and canonical
/// thread ids with a recognizable prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Codex,
    ClaudeCode,
    Gemini,
    OpenCode,
}

impl EngineKind {
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Codex,
        EngineKind::ClaudeCode,
        EngineKind::Gemini,
        EngineKind::OpenCode,
    ];

    /// The primary engine, used when a thread id carries no recognizable
    /// engine prefix.
    pub const PRIMARY: EngineKind = EngineKind::Codex;

    pub fn pending_prefix(self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::ClaudeCode => "claude",
            Self::Gemini => "gemini",
            Self::OpenCode => "opencode",
        }
    }

    fn canonical_prefix(self) -> &'static str {
        match self {
            Self::Codex => "thr_",
            Self::ClaudeCode => "claude_",
            Self::Gemini => "gem_",
            Self::OpenCode => "oc_",
        }
    }

    pub fn from_thread_id(thread_id: &ThreadId) -> Self {
        if let Some(prefix) = thread_id.pending_engine_prefix() {
            for engine in Self::ALL {
                if engine.pending_prefix() == prefix {
                    return engine;
                }
            }
            return Self::PRIMARY;
        }
        for engine in Self::ALL {
            if thread_id.as_str().starts_with(engine.canonical_prefix()) {
                return engine;
            }
        }
        Self::PRIMARY
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.pending_prefix())
    }
}
