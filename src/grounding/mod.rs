//! Deterministic portfolio grounding.
//!
//! Two operations over the Profile Record: `build_facts_summary` renders the
//! whole record into a compact facts block plus the allow-list of technology
//! terms the model may mention, and `route_facts` picks the smallest block
//! that answers the user's message (base / single project / all projects).
//! Both are pure: no clock, no randomness, no network.

use crate::profile::{ProfileRecord, Project};
use std::fmt::Write;

/// Fixed refusal instruction for technology absent from the record.
pub const REFUSAL_RULE: &str =
    "Jika user menanyakan teknologi yang tidak tercantum, jawab persis: \"Tidak tercantum di portfolio content.ts\".";

#[derive(Debug, Clone)]
pub struct FactsSummary {
    pub facts_block: String,
    pub allowed_tech: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactsMode {
    Base,
    Project,
    AllProjects,
}

impl FactsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Project => "project",
            Self::AllProjects => "all-projects",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutedFacts {
    pub mode: FactsMode,
    pub facts_block: String,
}

/// Render every profile section into one deterministic facts block and
/// derive the allowed-tech set from the record's technology-bearing fields.
pub fn build_facts_summary(profile: &ProfileRecord) -> FactsSummary {
    let mut out = String::new();

    let _ = writeln!(out, "**SOURCE OF TRUTH (content profil):**");
    let _ = writeln!(out, "Name: {}", profile.hero.name);
    let _ = writeln!(out, "Role: {}", profile.hero.role);
    let _ = writeln!(out, "Tagline: {}", profile.hero.tagline);

    let _ = writeln!(out, "\n**ABOUT — {}:**", profile.about.story_title);
    for line in &profile.about.story {
        let _ = writeln!(out, "- {line}");
    }

    let _ = writeln!(out, "\n**EXPERIENCE:**");
    for e in &profile.about.experience {
        let _ = writeln!(
            out,
            "- {} — {} ({}): {}",
            e.role, e.company, e.period, e.description
        );
    }

    let _ = writeln!(out, "\n**SOFT SKILLS:**");
    for s in &profile.about.soft_skills {
        let _ = writeln!(out, "- {}: {}", s.title, s.desc);
    }

    let _ = writeln!(out, "\n**EDUCATION:**");
    for e in &profile.about.education {
        let _ = writeln!(out, "- {} — {} ({})", e.degree, e.school, e.year);
    }

    let _ = writeln!(out, "\n**TECH STACK:**");
    for cat in profile.about.tech_stack.categories() {
        let _ = writeln!(out, "{}: {}", cat.title, cat.skills.join(", "));
    }

    let _ = writeln!(out, "\n**PROJECTS (titles only):**");
    for p in &profile.projects.items {
        let _ = writeln!(out, "- {} ({})", p.title, p.role);
    }

    let _ = writeln!(out, "\n**TIMELINE ({}):**", profile.timeline.title);
    for step in &profile.timeline.steps {
        let _ = writeln!(out, "- {}: {}", step.title, step.description);
    }

    let _ = writeln!(out, "\n**FOOTER:**");
    let _ = writeln!(out, "Mission: {}", profile.footer.mission);
    let labels: Vec<&str> = profile
        .footer
        .coordinates
        .iter()
        .map(|c| c.label.as_str())
        .collect();
    let _ = writeln!(out, "Sections: {}", labels.join(", "));

    let _ = writeln!(out, "\n**CV:** {}", profile.cv.filename);

    FactsSummary {
        facts_block: out,
        allowed_tech: collect_allowed_tech(profile),
    }
}

/// Allow-list of technology terms: tech-stack skills plus per-project
/// technologies, de-duplicated case-insensitively, sorted for determinism.
fn collect_allowed_tech(profile: &ProfileRecord) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<String> = Vec::new();

    let mut push = |term: &str| {
        let key = term.to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            return;
        }
        seen.push(key);
        out.push(term.to_string());
    };

    for cat in profile.about.tech_stack.categories() {
        for skill in &cat.skills {
            push(skill);
        }
    }
    for p in &profile.projects.items {
        for tech in &p.technologies {
            push(tech);
        }
    }

    out.sort_by_key(|t| t.to_lowercase());
    out
}

/// Select the facts block for one user message.
///
/// List intent wins over a specific title mention: when a message both
/// names a project and asks for the whole list, the enumeration is the
/// more inclusive answer.
pub fn route_facts(profile: &ProfileRecord, user_message: &str) -> RoutedFacts {
    let msg = user_message.to_lowercase();

    if has_list_intent(&msg) {
        return RoutedFacts {
            mode: FactsMode::AllProjects,
            facts_block: render_all_projects(profile),
        };
    }

    if let Some(project) = match_project(profile, &msg) {
        return RoutedFacts {
            mode: FactsMode::Project,
            facts_block: render_project(profile, project),
        };
    }

    RoutedFacts {
        mode: FactsMode::Base,
        facts_block: render_base(profile),
    }
}

const LIST_INTENT_PHRASES: &[&str] = &[
    "semua proyek",
    "semua project",
    "proyek apa saja",
    "project apa saja",
    "apa saja proyek",
    "apa saja project",
    "daftar proyek",
    "daftar project",
    "all projects",
    "list project",
];

fn has_list_intent(lower_msg: &str) -> bool {
    LIST_INTENT_PHRASES.iter().any(|p| lower_msg.contains(p))
}

/// Case-insensitive title match. Single-word titles must match a whole
/// word ("TING" must not fire inside "penting"); multi-word titles match
/// by substring. No fuzzy scoring.
fn match_project<'a>(profile: &'a ProfileRecord, lower_msg: &str) -> Option<&'a Project> {
    let words: Vec<&str> = lower_msg
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    profile.projects.items.iter().find(|p| {
        let title = p.title.to_lowercase();
        if title.contains(' ') {
            lower_msg.contains(&title)
        } else {
            words.iter().any(|w| *w == title)
        }
    })
}

fn render_base(profile: &ProfileRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "**MODE DATA: BASE (ringkas)**");
    let _ = writeln!(out, "Name: {}", profile.hero.name);
    let _ = writeln!(out, "Role: {}", profile.hero.role);
    let _ = writeln!(out, "Tagline: {}", profile.hero.tagline);

    let _ = writeln!(out, "\nExperience:");
    for e in &profile.about.experience {
        let _ = writeln!(out, "- {} — {} ({})", e.role, e.company, e.period);
    }

    let _ = writeln!(out, "\nTech stack:");
    for cat in profile.about.tech_stack.categories() {
        let _ = writeln!(out, "- {}: {}", cat.title, cat.skills.join(", "));
    }

    let titles: Vec<&str> = profile
        .projects
        .items
        .iter()
        .map(|p| p.title.as_str())
        .collect();
    let _ = writeln!(out, "\nProject titles: {}", titles.join(", "));

    let _ = writeln!(out, "\nEducation:");
    for e in &profile.about.education {
        let _ = writeln!(out, "- {} — {} ({})", e.degree, e.school, e.year);
    }

    let _ = writeln!(out, "\n{REFUSAL_RULE}");
    out
}

fn render_project(profile: &ProfileRecord, project: &Project) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "**MODE DATA: PROJECT DETAIL**");
    let _ = writeln!(out, "Project: {}", project.title);
    let _ = writeln!(out, "Role: {}", project.role);
    let _ = writeln!(out, "Ringkas: {}", project.description);
    let _ = writeln!(out, "Challenge: {}", project.challenge);
    let _ = writeln!(out, "Solution: {}", project.solution);
    let _ = writeln!(out, "Tech: {}", project.technologies.join(", "));
    let _ = writeln!(out, "Results:");
    for r in &project.results {
        let _ = writeln!(out, "- {r}");
    }
    let _ = writeln!(
        out,
        "\nSubject: {} ({}).",
        profile.hero.name, profile.hero.role
    );
    let _ = writeln!(out, "{REFUSAL_RULE}");
    out
}

fn render_all_projects(profile: &ProfileRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "**MODE DATA: SEMUA PROYEK**");
    let _ = writeln!(
        out,
        "Total: {} proyek. Sebutkan judul persis seperti di bawah.",
        profile.projects.items.len()
    );
    for (i, p) in profile.projects.items.iter().enumerate() {
        let _ = writeln!(out, "{}. {} — {}", i + 1, p.title, p.role);
    }
    let _ = writeln!(out, "\n{REFUSAL_RULE}");
    out
}
