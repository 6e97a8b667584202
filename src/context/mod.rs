//! Token-budgeted context assembly.
//!
//! Builds the variable "user context" sent alongside the fixed system
//! prompt: an ordered set of profile sections, each truncated to its own
//! sub-budget, appended greedily while the running total stays within
//! `max_tokens`. A section that would overflow is skipped whole — partial
//! sections confuse the model more than missing ones.

use crate::profile::ProfileRecord;
use crate::search::SearchResult;
use std::fmt::Write;

/// Default overall budget for the assembled context.
pub const DEFAULT_MAX_TOKENS: usize = 1500;

// Per-section sub-budgets (tokens).
const STORY_BUDGET: usize = 260;
const EXPERIENCE_BUDGET: usize = 240;
const TECH_STACK_BUDGET: usize = 240;
const PROJECTS_BUDGET: usize = 520;
const TIMELINE_BUDGET: usize = 160;
const FOOTER_BUDGET: usize = 80;
const SNIPPET_CHARS: usize = 150;

#[derive(Debug, Clone)]
pub struct OptimizedContext {
    pub system_prompt: String,
    pub user_context: String,
    pub estimated_tokens: usize,
}

/// Rough token estimate: 1 token ≈ 4 characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Keep ~40% of characters from the start and ~40% from the end, replacing
/// the middle with an elision marker that names the omitted token count.
pub fn smart_truncate(text: &str, max_tokens: usize) -> String {
    let tokens = estimate_tokens(text);
    if tokens <= max_tokens {
        return text.to_string();
    }

    let target_chars = max_tokens * 4;
    let keep = (target_chars * 2) / 5;

    let chars: Vec<char> = text.chars().collect();
    let start: String = chars[..keep.min(chars.len())].iter().collect();
    let end: String = chars[chars.len().saturating_sub(keep)..].iter().collect();

    format!(
        "{start}\n\n[... {} tokens diringkas ...]\n\n{end}",
        tokens - max_tokens
    )
}

/// Condense search results for prompt use: top `max_results`, snippet capped.
pub fn summarize_search_results(results: &[SearchResult], max_results: usize) -> String {
    results
        .iter()
        .take(max_results)
        .enumerate()
        .map(|(i, r)| {
            let snippet: String = r.snippet.chars().take(SNIPPET_CHARS).collect();
            format!("[{}] {}\n{snippet}...", i + 1, r.title)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fixed, section-independent system prompt. Deliberately free of any
/// technology enumeration — tech claims come only from the facts blocks.
pub fn system_prompt(profile: &ProfileRecord) -> String {
    format!(
        "Luna - AI Assistant Portfolio {name}\n\n\
         {name} = {role}.\n\n\
         PERSONALITY:\n\
         - Jelaskan portfolio {name}\n\
         - Cari info dari web jika perlu\n\
         - Jawab 100-150 kata\n\n\
         RULES:\n\
         - NEVER use web search for personal info about {first} (who/job/bio). Use the provided portfolio data.\n\
         - Use web search ONLY for general tech topics, trends, best practices, or definitions.\n\
         - If info is in portfolio → answer directly (no search).\n\n\
         MARKDOWN: Use **bold**, lists",
        name = profile.hero.name,
        role = profile.hero.role,
        first = profile.hero.name.split_whitespace().next().unwrap_or(""),
    )
}

/// Assemble the bounded context block.
pub fn build_optimized_context(
    profile: &ProfileRecord,
    search_results: Option<&[SearchResult]>,
    max_tokens: usize,
) -> OptimizedContext {
    let mut context = String::new();
    let mut tokens = 0usize;

    let mut try_append = |block: String, section_budget: Option<usize>| {
        let trimmed = block.trim();
        if trimmed.is_empty() {
            return;
        }
        let limited = match section_budget {
            Some(budget) => smart_truncate(trimmed, budget),
            None => trimmed.to_string(),
        };
        let t = estimate_tokens(&limited);
        if tokens + t > max_tokens {
            return;
        }
        if !context.is_empty() {
            context.push_str("\n\n");
        }
        context.push_str(&limited);
        tokens += t;
    };

    // --- Identity header ---
    {
        let mut block = String::new();
        let _ = writeln!(
            block,
            "**{} PORTFOLIO DATA (SOURCE OF TRUTH):**",
            profile.hero.name.to_uppercase()
        );
        let _ = writeln!(block, "Name: {}", profile.hero.name);
        let _ = writeln!(block, "Primary Role: {}", profile.hero.role);
        let _ = writeln!(block, "Tagline: {}", profile.hero.tagline);
        let _ = writeln!(
            block,
            "\nIMPORTANT: {} is a {} in SOFTWARE/TECH industry, NOT Electric Vehicle industry!",
            profile.hero.name.split_whitespace().next().unwrap_or(""),
            profile.hero.role
        );
        try_append(block, None);
    }

    // --- About / story ---
    {
        let mut block = String::new();
        let _ = writeln!(block, "**ABOUT / STORY:**");
        let _ = writeln!(block, "{}", profile.about.story_title);
        for line in &profile.about.story {
            let _ = writeln!(block, "- {line}");
        }
        try_append(block, Some(STORY_BUDGET));
    }

    // --- Experience (full list) ---
    {
        let mut block = String::new();
        let _ = writeln!(block, "**WORK EXPERIENCE:**");
        for e in &profile.about.experience {
            let _ = writeln!(
                block,
                "- {} — {} ({}) — {}",
                e.role, e.company, e.period, e.description
            );
        }
        try_append(block, Some(EXPERIENCE_BUDGET));
    }

    // --- Tech stack (structured) ---
    {
        let mut block = String::new();
        let _ = writeln!(block, "**TECH STACK:**");
        for cat in profile.about.tech_stack.categories() {
            let _ = writeln!(block, "{}: {}", cat.title, cat.skills.join(", "));
        }
        try_append(block, Some(TECH_STACK_BUDGET));
    }

    // --- Projects (summary with key fields) ---
    {
        let mut block = String::new();
        let _ = writeln!(block, "**PROJECTS (CASE STUDIES):**");
        for p in &profile.projects.items {
            let _ = writeln!(block, "\n### {} — {}", p.title, p.role);
            let _ = writeln!(block, "- Ringkas: {}", p.description);
            let _ = writeln!(block, "- Tech: {}", p.technologies.join(", "));
            let _ = writeln!(block, "- Challenge: {}", p.challenge);
            let _ = writeln!(block, "- Solution: {}", p.solution);
            let results: Vec<&str> = p.results.iter().take(3).map(String::as_str).collect();
            let _ = writeln!(block, "- Results: {}", results.join(" | "));
        }
        try_append(block, Some(PROJECTS_BUDGET));
    }

    // --- Timeline / process ---
    {
        let mut block = String::new();
        let _ = writeln!(block, "**PROCESS / TIMELINE:**");
        for step in &profile.timeline.steps {
            let _ = writeln!(block, "- {}: {}", step.title, step.description);
        }
        try_append(block, Some(TIMELINE_BUDGET));
    }

    // --- Footer / links ---
    {
        let mut block = String::new();
        let _ = writeln!(block, "**FOOTER:**");
        let _ = writeln!(block, "Mission: {}", profile.footer.mission);
        let labels: Vec<&str> = profile
            .footer
            .coordinates
            .iter()
            .map(|c| c.label.as_str())
            .collect();
        let _ = writeln!(block, "Sections: {}", labels.join(", "));
        try_append(block, Some(FOOTER_BUDGET));
    }

    // --- Search results, if any fit ---
    if let Some(results) = search_results {
        if !results.is_empty() {
            let block = format!(
                "Web Search Results:\n{}",
                summarize_search_results(results, 3)
            );
            try_append(block, None);
        }
    }

    OptimizedContext {
        system_prompt: system_prompt(profile),
        user_context: context,
        estimated_tokens: tokens,
    }
}

// ── Context validation ──────────────────────────────────────────

const REQUIRED_SECTION_HEADERS: &[&str] = &[
    "**WORK EXPERIENCE:**",
    "**TECH STACK:**",
    "**PROJECTS (CASE STUDIES):**",
    "**PROCESS / TIMELINE:**",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextIssue {
    EmptyContext,
    TooShort,
    MissingSection(String),
    MissingExperienceCompany,
    MissingFlagshipProject,
}

#[derive(Debug, Clone)]
pub struct ContextValidation {
    pub ok: bool,
    pub issues: Vec<ContextIssue>,
}

/// Sanity report: did the important sections survive assembly?
/// Purely diagnostic — assembly under a tight budget may legitimately
/// drop sections, which callers surface rather than treat as fatal.
pub fn validate_context(profile: &ProfileRecord, ctx: &OptimizedContext) -> ContextValidation {
    let mut issues = Vec::new();
    let user_context = ctx.user_context.trim();

    if user_context.is_empty() {
        return ContextValidation {
            ok: false,
            issues: vec![ContextIssue::EmptyContext],
        };
    }

    if user_context.len() < 200 {
        issues.push(ContextIssue::TooShort);
    }

    for header in REQUIRED_SECTION_HEADERS {
        if !user_context.contains(header) {
            issues.push(ContextIssue::MissingSection((*header).to_string()));
        }
    }

    if !profile
        .about
        .experience
        .iter()
        .any(|e| user_context.contains(&e.company))
    {
        issues.push(ContextIssue::MissingExperienceCompany);
    }

    if let Some(flagship) = profile.projects.items.first() {
        if !user_context.contains(&flagship.title) {
            issues.push(ContextIssue::MissingFlagshipProject);
        }
    }

    ContextValidation {
        ok: issues.is_empty(),
        issues,
    }
}
