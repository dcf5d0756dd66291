//! Rule-based candidate scoring.
//!
//! Rules add a signed modifier to a candidate's score when they trigger.
//! A plain rule triggers on a match; a negated rule triggers on a non-match.
//! Rule sets group rules by name and apply to libraries (or to the
//! `ALL_TV` / `ALL_MOVIES` sentinels).

use tracing::debug;

use crate::config::{
    IndexerFlagScoringRule, IndexersConfig, ScoringRuleSet, TitleScoringRule, ALL_MOVIES, ALL_TV,
};
use crate::release::{sort_best_first, CandidateRelease};

enum Rule<'a> {
    Title(&'a TitleScoringRule),
    Flag(&'a IndexerFlagScoringRule),
}

impl Rule<'_> {
    fn triggers(&self, candidate: &CandidateRelease) -> bool {
        match self {
            Rule::Title(rule) => {
                let title = candidate.title.to_lowercase();
                let matched = rule
                    .keywords
                    .iter()
                    .any(|keyword| title.contains(&keyword.to_lowercase()));
                matched != rule.negate
            }
            Rule::Flag(rule) => {
                let matched = rule.flags.iter().any(|flag| candidate.flags.contains(flag));
                matched != rule.negate
            }
        }
    }

    fn name(&self) -> &str {
        match self {
            Rule::Title(rule) => &rule.name,
            Rule::Flag(rule) => &rule.name,
        }
    }

    fn modifier(&self) -> i64 {
        match self {
            Rule::Title(rule) => rule.score_modifier,
            Rule::Flag(rule) => rule.score_modifier,
        }
    }
}

/// Applies the configured scoring rules to candidates.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    title_rules: Vec<TitleScoringRule>,
    flag_rules: Vec<IndexerFlagScoringRule>,
    rule_sets: Vec<ScoringRuleSet>,
}

impl ScoringEngine {
    pub fn new(
        title_rules: Vec<TitleScoringRule>,
        flag_rules: Vec<IndexerFlagScoringRule>,
        rule_sets: Vec<ScoringRuleSet>,
    ) -> Self {
        Self {
            title_rules,
            flag_rules,
            rule_sets,
        }
    }

    pub fn from_config(config: &IndexersConfig) -> Self {
        Self::new(
            config.title_scoring_rules.clone(),
            config.indexer_flag_scoring_rules.clone(),
            config.scoring_rule_sets.clone(),
        )
    }

    fn lookup(&self, name: &str) -> Option<Rule<'_>> {
        self.title_rules
            .iter()
            .find(|rule| rule.name == name)
            .map(Rule::Title)
            .or_else(|| {
                self.flag_rules
                    .iter()
                    .find(|rule| rule.name == name)
                    .map(Rule::Flag)
            })
    }

    /// Apply one rule set and report whether the candidate passed it (`score > 0`).
    ///
    /// Unknown rule names are skipped.
    pub fn evaluate(
        &self,
        mut candidate: CandidateRelease,
        rule_set: &ScoringRuleSet,
    ) -> (CandidateRelease, bool) {
        for name in &rule_set.rule_names {
            let Some(rule) = self.lookup(name) else {
                continue;
            };
            if rule.triggers(&candidate) {
                debug!(rule = %rule.name(), title = %candidate.title, modifier = rule.modifier(), "Scoring rule applied");
                candidate.score += rule.modifier();
            }
        }
        let passed = candidate.score > 0;
        (candidate, passed)
    }

    /// Rule sets that apply to a media item in `library`.
    pub fn rule_sets_for<'a>(
        &'a self,
        library: &'a str,
        is_tv: bool,
    ) -> impl Iterator<Item = &'a ScoringRuleSet> + 'a {
        self.rule_sets.iter().filter(move |set| {
            set.libraries.iter().any(|l| {
                l == library || (is_tv && l == ALL_TV) || (!is_tv && l == ALL_MOVIES)
            })
        })
    }

    /// Score every candidate with every applicable rule set, drop negative
    /// scores, and sort best first.
    ///
    /// Candidates left at score 0 are kept even though they pass no rule set.
    pub fn evaluate_all(
        &self,
        candidates: Vec<CandidateRelease>,
        library: &str,
        is_tv: bool,
    ) -> Vec<CandidateRelease> {
        let mut scored = candidates;
        for rule_set in self.rule_sets_for(library, is_tv) {
            debug!(rule_set = %rule_set.name, library = %library, "Applying scoring rule set");
            scored = scored
                .into_iter()
                .map(|candidate| {
                    let (candidate, passed) = self.evaluate(candidate, rule_set);
                    debug!(
                        title = %candidate.title,
                        score = candidate.score,
                        passed,
                        rule_set = %rule_set.name,
                        "Candidate evaluated"
                    );
                    candidate
                })
                .collect();
        }

        let mut retained: Vec<CandidateRelease> =
            scored.into_iter().filter(|c| c.score >= 0).collect();
        sort_best_first(&mut retained);
        retained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title_rule(name: &str, keywords: &[&str], modifier: i64, negate: bool) -> TitleScoringRule {
        TitleScoringRule {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            score_modifier: modifier,
            negate,
        }
    }

    fn flag_rule(name: &str, flags: &[&str], modifier: i64, negate: bool) -> IndexerFlagScoringRule {
        IndexerFlagScoringRule {
            name: name.to_string(),
            flags: flags.iter().map(|f| f.to_string()).collect(),
            score_modifier: modifier,
            negate,
        }
    }

    fn rule_set(name: &str, libraries: &[&str], rules: &[&str]) -> ScoringRuleSet {
        ScoringRuleSet {
            name: name.to_string(),
            libraries: libraries.iter().map(|l| l.to_string()).collect(),
            rule_names: rules.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn candidate(title: &str) -> CandidateRelease {
        CandidateRelease::torrent(title, "magnet:?xt=urn:btih:x", 10)
    }

    #[test]
    fn test_keyword_match_adds_once() {
        let engine = ScoringEngine::new(
            vec![title_rule("h265", &["x265"], 10, false)],
            vec![],
            vec![],
        );
        let set = rule_set("s", &["ALL_TV"], &["h265"]);
        let (scored, passed) = engine.evaluate(candidate("Show.x265.X265.x265"), &set);
        assert_eq!(scored.score, 10);
        assert!(passed);
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let engine = ScoringEngine::new(
            vec![title_rule("remux", &["REMUX"], 5, false)],
            vec![],
            vec![],
        );
        let set = rule_set("s", &["ALL_MOVIES"], &["remux"]);
        let (scored, _) = engine.evaluate(candidate("movie.2020.remux"), &set);
        assert_eq!(scored.score, 5);
    }

    #[test]
    fn test_negated_rule_triggers_on_non_match() {
        let engine = ScoringEngine::new(
            vec![title_rule("no_cam", &["cam"], -100, true)],
            vec![],
            vec![],
        );
        let set = rule_set("s", &["ALL_MOVIES"], &["no_cam"]);

        let (clean, _) = engine.evaluate(candidate("Movie.1080p.BluRay"), &set);
        assert_eq!(clean.score, -100);

        let (cam, _) = engine.evaluate(candidate("Movie.CAM"), &set);
        assert_eq!(cam.score, 0);
    }

    #[test]
    fn test_flag_rule_exact_membership() {
        let engine = ScoringEngine::new(
            vec![],
            vec![flag_rule("free", &["freeleech"], 20, false)],
            vec![],
        );
        let set = rule_set("s", &["ALL_TV"], &["free"]);

        let (free, passed) = engine.evaluate(
            candidate("Show").with_flags(vec!["freeleech".to_string()]),
            &set,
        );
        assert_eq!(free.score, 20);
        assert!(passed);

        let (other, passed) = engine.evaluate(
            candidate("Show").with_flags(vec!["Freeleech".to_string(), "freeleech75".to_string()]),
            &set,
        );
        assert_eq!(other.score, 0);
        assert!(!passed);
    }

    #[test]
    fn test_negated_flag_rule() {
        let engine = ScoringEngine::new(
            vec![],
            vec![flag_rule("not_free", &["freeleech"], 7, true)],
            vec![],
        );
        let set = rule_set("s", &["ALL_TV"], &["not_free"]);
        let (scored, _) = engine.evaluate(candidate("Show"), &set);
        assert_eq!(scored.score, 7);
    }

    #[test]
    fn test_unknown_rule_names_are_skipped() {
        let engine = ScoringEngine::default();
        let set = rule_set("s", &["ALL_TV"], &["does_not_exist"]);
        let (scored, passed) = engine.evaluate(candidate("Show"), &set);
        assert_eq!(scored.score, 0);
        assert!(!passed);
    }

    #[test]
    fn test_pass_threshold_differs_from_retain_threshold() {
        let engine = ScoringEngine::new(
            vec![
                title_rule("bonus", &["bonus"], 5, false),
                title_rule("penalty", &["bad"], -5, false),
            ],
            vec![],
            vec![rule_set("s", &["ALL_MOVIES"], &["bonus", "penalty"])],
        );
        let set = &engine.rule_sets[0];

        let (untouched, passed) = engine.evaluate(candidate("Movie.1080p"), set);
        assert_eq!(untouched.score, 0);
        assert!(!passed, "score 0 does not pass a rule set");

        let retained = engine.evaluate_all(
            vec![
                candidate("Movie.1080p"),
                candidate("Movie.1080p.bonus"),
                candidate("Movie.1080p.bad"),
            ],
            "Default",
            false,
        );
        let titles: Vec<&str> = retained.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Movie.1080p.bonus", "Movie.1080p"]);
    }

    #[test]
    fn test_rule_set_scope() {
        let engine = ScoringEngine::new(
            vec![title_rule("bonus", &["x"], 1, false)],
            vec![],
            vec![
                rule_set("tv", &["ALL_TV"], &["bonus"]),
                rule_set("movies", &["ALL_MOVIES"], &["bonus"]),
                rule_set("anime", &["Anime"], &["bonus"]),
            ],
        );

        let tv: Vec<&str> = engine
            .rule_sets_for("Default", true)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(tv, vec!["tv"]);

        let anime: Vec<&str> = engine
            .rule_sets_for("Anime", true)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(anime, vec!["tv", "anime"]);

        let movies: Vec<&str> = engine
            .rule_sets_for("Default", false)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(movies, vec!["movies"]);
    }

    #[test]
    fn test_scores_accumulate_across_rule_sets() {
        let engine = ScoringEngine::new(
            vec![title_rule("bonus", &["x265"], 3, false)],
            vec![],
            vec![
                rule_set("a", &["ALL_TV"], &["bonus"]),
                rule_set("b", &["Default"], &["bonus"]),
            ],
        );
        let scored = engine.evaluate_all(vec![candidate("Show.x265")], "Default", true);
        assert_eq!(scored[0].score, 6);
    }

    #[test]
    fn test_evaluate_all_sorts_best_first() {
        let engine = ScoringEngine::default();
        let result = engine.evaluate_all(
            vec![
                candidate("Show.S01.720p"),
                candidate("Show.S01.4k"),
                candidate("Show.S01.1080p"),
            ],
            "Default",
            true,
        );
        let titles: Vec<&str> = result.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Show.S01.4k", "Show.S01.1080p", "Show.S01.720p"]);
    }
}
