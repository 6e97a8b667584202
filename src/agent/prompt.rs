//! System prompt assembly.
//!
//! The base template is fixed and section-independent; grounding mode
//! prepends the strict Indonesian accuracy rules, and the repair retry
//! appends a one-shot addendum forbidding textual tool-call syntax.

use crate::context;
use crate::profile::ProfileRecord;

/// Strict accuracy rules for identity/portfolio mode. The refusal sentence
/// is exact — the model is told to emit it verbatim for unlisted tech.
pub const STRICT_GROUNDING_BLOCK: &str = "MODE: PORTOFOLIO / IDENTITAS (Bahasa Indonesia)

ATURAN KEAKURATAN (WAJIB):
- Kamu HANYA boleh memakai fakta yang tertulis di blok \"SOURCE OF TRUTH (content.ts)\" di bawah.
- DILARANG menambahkan teknologi, tools, role, company, periode kerja, atau detail project yang tidak tertulis.
- Jika user menanyakan teknologi yang tidak tercantum, jawab persis: \"Tidak tercantum di portfolio content.ts\".

ATURAN BAHASA:
- Jawab dalam Bahasa Indonesia (kecuali user minta bahasa lain).";

/// One-shot addendum for the repair retry after the model "talked" a tool
/// call as text instead of using the structured field.
pub const REPAIR_ADDENDUM: &str = "PERBAIKAN FORMAT (WAJIB):
- JANGAN menulis tool call sebagai teks XML seperti <function=...>.
- Jika perlu mencari web, gunakan mekanisme tool call resmi.
- Jika tidak perlu mencari, jawab langsung dalam Bahasa Indonesia.";

pub struct SystemPromptBuilder<'a> {
    profile: &'a ProfileRecord,
    facts: Option<&'a str>,
    grounded: bool,
    repair: bool,
}

impl<'a> SystemPromptBuilder<'a> {
    pub fn new(profile: &'a ProfileRecord) -> Self {
        Self {
            profile,
            facts: None,
            grounded: false,
            repair: false,
        }
    }

    /// Attach the routed facts block as the source-of-truth section.
    pub fn facts(mut self, facts: &'a str) -> Self {
        self.facts = Some(facts);
        self
    }

    /// Identity/portfolio mode: strict rules, tool use forbidden.
    pub fn grounded(mut self, grounded: bool) -> Self {
        self.grounded = grounded;
        self
    }

    /// Append the textual-tool-call repair addendum.
    pub fn repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }

    pub fn build(self) -> String {
        let mut prompt = context::system_prompt(self.profile);

        if self.grounded {
            prompt.push_str("\n\n");
            prompt.push_str(STRICT_GROUNDING_BLOCK);
        }

        if let Some(facts) = self.facts {
            prompt.push_str("\n\nSOURCE OF TRUTH (content.ts):\n");
            prompt.push_str(facts);
        }

        if self.repair {
            prompt.push_str("\n\n");
            prompt.push_str(REPAIR_ADDENDUM);
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> &'static ProfileRecord {
        ProfileRecord::embedded()
    }

    #[test]
    fn base_prompt_has_no_mode_blocks() {
        let prompt = SystemPromptBuilder::new(profile()).build();
        assert!(prompt.contains("Luna"));
        assert!(!prompt.contains("ATURAN KEAKURATAN"));
        assert!(!prompt.contains("PERBAIKAN FORMAT"));
    }

    #[test]
    fn grounded_prompt_carries_strict_rules_and_exact_refusal() {
        let prompt = SystemPromptBuilder::new(profile())
            .grounded(true)
            .facts("Name: Evi")
            .build();
        assert!(prompt.contains("ATURAN KEAKURATAN"));
        assert!(prompt.contains("Tidak tercantum di portfolio content.ts"));
        assert!(prompt.contains("SOURCE OF TRUTH (content.ts):\nName: Evi"));
        assert!(prompt.contains("Bahasa Indonesia"));
    }

    #[test]
    fn repair_addendum_is_appended_last() {
        let prompt = SystemPromptBuilder::new(profile()).repair(true).build();
        assert!(prompt.ends_with(REPAIR_ADDENDUM));
        assert!(prompt.contains("<function=...>"));
    }
}
