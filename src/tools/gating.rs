//! Tool gating.
//!
//! Biography questions about the portfolio's subject must be answered from
//! the Profile Record alone — a web search would let the model assert
//! whatever the internet says about a name. Tools stay available for
//! genuine technology questions, including ones that mention the subject
//! alongside an explicit trend or recency cue.

use regex::Regex;
use std::sync::LazyLock;

static IDENTITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^evi\s+itu\s+siapa\b",
        r"^siapa\s+evi\b",
        r"^evi\s+kerja\s+apa\b",
        r"^kerja\s+apa\s+evi\b",
        r"^profil\s+evi\b",
        r"^tentang\s+evi\b",
        r"^bio\s+evi\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("identity pattern compiles"))
    .collect()
});

static TREND_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(trend|terkini|terbaru|2024|2025|latest|current)").expect("trend cue compiles")
});

/// True when the message is about the subject's identity/biography and
/// carries no trend/recency signal.
pub fn should_disable_tools(user_message: &str) -> bool {
    let m = user_message.to_lowercase().trim().to_string();

    if IDENTITY_PATTERNS.iter().any(|r| r.is_match(&m)) {
        return true;
    }

    // Any mention of the subject without time-sensitive intent also blocks
    // tools. A stray tech word is NOT enough to re-enable them: searching
    // "Evi Kubernetes" invites the model to claim she used it.
    let has_trend_intent = TREND_CUE.is_match(&m);
    if m.contains("evi") && !has_trend_intent {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disables_tools_for_identity_questions() {
        assert!(should_disable_tools("Evi itu siapa?"));
        assert!(should_disable_tools("Evi kerja apa?"));
        assert!(should_disable_tools("Profil Evi"));
        assert!(should_disable_tools("siapa evi"));
        assert!(should_disable_tools("tentang evi dong"));
    }

    #[test]
    fn disables_tools_for_subject_plus_tech_without_trend_cue() {
        assert!(should_disable_tools("Evi pakai Kubernetes?"));
        assert!(should_disable_tools("Apa saja project yang pernah dikerjakan Evi?"));
    }

    #[test]
    fn allows_tools_when_trend_cue_is_present() {
        assert!(!should_disable_tools("Evi pakai React versi terbaru 2025?"));
        assert!(!should_disable_tools("Evi dan Kubernetes trend 2024 gimana?"));
    }

    #[test]
    fn allows_tools_for_pure_tech_questions() {
        assert!(!should_disable_tools("apa itu bigquery?"));
        assert!(!should_disable_tools("jelaskan microservices vs monolith"));
    }

    #[test]
    fn empty_message_keeps_tools_enabled() {
        assert!(!should_disable_tools(""));
        assert!(!should_disable_tools("   "));
    }
}
