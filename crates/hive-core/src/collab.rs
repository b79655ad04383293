//! Interfaces for the embedded collaborators consulted when spawning or
//! restarting an agent: the cwd/allowlist policy validator and the
//! archetype prompt registry. The core depends only on these traits;
//! concrete implementations (a real skill-content package, a directory
//! picker) live outside this workspace.

use crate::errors::ValidationError;

/// Validates a candidate working directory against an allowlisted root.
pub trait CwdPolicy: Send + Sync {
    /// Canonicalize and validate `candidate`. Returns the canonical
    /// absolute path on success.
    fn validate(&self, candidate: &str) -> Result<String, ValidationError>;
}

/// Resolves an archetype id to its system prompt text.
pub trait ArchetypePromptRegistry: Send + Sync {
    /// Look up the prompt for `archetype_id`.
    fn prompt_for(&self, archetype_id: &str) -> Result<String, ValidationError>;
}

/// An allowlist rooted at a single absolute directory: any candidate whose
/// canonical form is the root or a descendant of it is accepted.
pub struct AllowlistCwdPolicy {
    root: std::path::PathBuf,
}

impl AllowlistCwdPolicy {
    #[must_use]
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CwdPolicy for AllowlistCwdPolicy {
    fn validate(&self, candidate: &str) -> Result<String, ValidationError> {
        let path = std::path::Path::new(candidate);
        if !path.is_absolute() {
            return Err(ValidationError::CwdNotAllowed(candidate.to_owned()));
        }
        // Lexical containment check; avoids requiring the directory to
        // exist yet (spawnAgent may create it).
        if path.starts_with(&self.root) {
            Ok(path.to_string_lossy().into_owned())
        } else {
            Err(ValidationError::CwdNotAllowed(candidate.to_owned()))
        }
    }
}

/// A static in-memory archetype registry seeded with the built-in
/// archetypes (`manager`, plus whatever callers add).
#[derive(Default)]
pub struct StaticArchetypeRegistry {
    prompts: std::collections::HashMap<String, String>,
}

impl StaticArchetypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut prompts = std::collections::HashMap::new();
        let _ = prompts.insert(
            "manager".to_owned(),
            "You are the manager of a swarm of worker agents.".to_owned(),
        );
        Self { prompts }
    }

    pub fn register(&mut self, archetype_id: impl Into<String>, prompt: impl Into<String>) {
        let _ = self.prompts.insert(archetype_id.into(), prompt.into());
    }
}

impl ArchetypePromptRegistry for StaticArchetypeRegistry {
    fn prompt_for(&self, archetype_id: &str) -> Result<String, ValidationError> {
        self.prompts
            .get(archetype_id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownArchetype(archetype_id.to_owned()))
    }
}
