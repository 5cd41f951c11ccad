//! Prompt patterns for one platform.

use crate::channel::{CompletionPattern, combine_prompt_patterns};
use crate::error::PlatformError;

/// The prompts a platform's CLI shows in each mode.
///
/// Every pattern is anchored to the end of the output when compiled, so a
/// prompt-looking line in the middle of command output never completes a
/// read.
#[derive(Debug, Clone)]
pub struct PromptSet {
    user_source: String,
    privileged_source: String,

    /// Unprivileged (exec) prompt, e.g. `router>`.
    pub user: CompletionPattern,

    /// Privileged prompt, e.g. `router#`. Commands complete on this.
    pub privileged: CompletionPattern,

    /// Configuration-mode prompt, when the platform has one.
    pub config: Option<CompletionPattern>,

    /// Either the user or the privileged prompt.
    pub any: CompletionPattern,
}

impl PromptSet {
    /// Compile a prompt set from pattern strings.
    pub fn new(
        user: &str,
        privileged: &str,
        config: Option<&str>,
    ) -> Result<Self, PlatformError> {
        Ok(Self {
            user_source: user.to_string(),
            privileged_source: privileged.to_string(),
            user: CompletionPattern::new(user)?,
            privileged: CompletionPattern::new(privileged)?,
            config: config.map(CompletionPattern::new).transpose()?,
            any: CompletionPattern::from(combine_prompt_patterns([user, privileged])?),
        })
    }

    /// Prompt set where the user and privileged prompts are the same
    /// (platforms without an enable step).
    pub fn single(prompt: &str, config: Option<&str>) -> Result<Self, PlatformError> {
        Self::new(prompt, prompt, config)
    }

    /// Source patterns of the user and privileged prompts.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        [self.user_source.as_str(), self.privileged_source.as_str()].into_iter()
    }

    /// Source pattern of the privileged prompt.
    pub fn privileged_source(&self) -> &str {
        &self.privileged_source
    }

    /// Whether the user and privileged prompts are distinct.
    pub fn has_privilege_levels(&self) -> bool {
        self.user_source != self.privileged_source
    }

    /// Whether `output` ends at the privileged prompt.
    pub fn at_privileged(&self, output: &str) -> bool {
        self.privileged.is_match(output.as_bytes())
    }
}
