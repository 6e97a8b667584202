//! The Profile Record — the assistant's single source of truth.
//!
//! Every fact the model is allowed to assert about the portfolio's subject
//! must be traceable to a field in this record. The concrete document ships
//! embedded in the binary and is parsed exactly once.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub hero: Hero,
    pub about: About,
    pub projects: Projects,
    pub timeline: Timeline,
    pub footer: Footer,
    pub cv: CvLink,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hero {
    pub name: String,
    pub role: String,
    pub tagline: String,
    pub button_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct About {
    pub title: String,
    pub story_title: String,
    pub story: Vec<String>,
    pub experience_title: String,
    pub experience: Vec<Experience>,
    pub soft_skills: Vec<SoftSkill>,
    pub education: Vec<Education>,
    pub tech_stack: TechStack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub id: u32,
    pub role: String,
    pub company: String,
    pub period: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftSkill {
    pub title: String,
    pub desc: String,
    pub icon_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub school: String,
    pub year: String,
    pub icon_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechStack {
    pub modeling: TechCategory,
    pub data: TechCategory,
    pub tools: TechCategory,
}

impl TechStack {
    /// The three categories in display order.
    pub fn categories(&self) -> [&TechCategory; 3] {
        [&self.modeling, &self.data, &self.tools]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechCategory {
    pub title: String,
    pub icon_name: String,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projects {
    pub title: String,
    pub items: Vec<Project>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u32,
    pub title: String,
    pub role: String,
    pub description: String,
    pub challenge: String,
    pub solution: String,
    pub technologies: Vec<String>,
    pub results: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub title: String,
    pub steps: Vec<TimelineStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineStep {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Footer {
    pub brand_name: String,
    pub mission: String,
    pub coordinates_title: String,
    pub coordinates: Vec<FooterLink>,
    pub connect_title: String,
    pub connect_text: String,
    pub copyright: String,
    pub socials: Vec<SocialLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FooterLink {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialLink {
    pub label: String,
    pub href: String,
    pub icon_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvLink {
    pub url: String,
    pub filename: String,
}

static EMBEDDED: LazyLock<ProfileRecord> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../../assets/profile.json"))
        .expect("embedded profile.json is valid")
});

impl ProfileRecord {
    /// The embedded source-of-truth document, parsed once.
    pub fn embedded() -> &'static ProfileRecord {
        &EMBEDDED
    }
}
