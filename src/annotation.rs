//! Annotations and the trial-label convention.
//!
//! The experiment runner writes one annotation per trial with a description
//! of the form `"<True|False>-<TrialType>[-<suffix>]"`, e.g. `"True-SSVEP-3"`
//! or `"False-LMI-i-12"`. Class selection is a glob match against that text.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A labelled interval on a recording's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Seconds from the first sample of the recording.
    pub onset: f64,
    /// Seconds.
    pub duration: f64,
    pub description: String,
}

impl Annotation {
    pub fn new(onset: f64, duration: f64, description: impl Into<String>) -> Self {
        Self { onset, duration, description: description.into() }
    }

    /// `onset + duration`.
    #[inline]
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }
}

// ── Trial vocabulary ─────────────────────────────────────────────────────

/// The subject's answer encoded in the leading `True`/`False` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Response {
    Yes,
    No,
}

impl Response {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "True",
            Self::No => "False",
        }
    }
}

/// Experiment paradigm of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialType {
    /// Steady-state visually evoked potential.
    Ssvep,
    /// Tongue motor imagery, executed.
    TmiActive,
    /// Tongue motor imagery, imagined.
    TmiImagined,
    /// Laryngeal motor imagery, executed.
    LmiActive,
    /// Laryngeal motor imagery, imagined.
    LmiImagined,
    /// Eyes-closed alpha.
    Alpha,
}

impl TrialType {
    pub const ALL: [TrialType; 6] = [
        Self::Ssvep,
        Self::TmiActive,
        Self::TmiImagined,
        Self::LmiActive,
        Self::LmiImagined,
        Self::Alpha,
    ];

    /// Label as written into annotation descriptions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssvep => "SSVEP",
            Self::TmiActive => "TMI-a",
            Self::TmiImagined => "TMI-i",
            Self::LmiActive => "LMI-a",
            Self::LmiImagined => "LMI-i",
            Self::Alpha => "alpha",
        }
    }
}

impl fmt::Display for TrialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrialType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrialType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = TrialType::ALL.iter().map(TrialType::as_str).collect();
                format!("unknown trial type '{s}' (expected one of {})", known.join(", "))
            })
    }
}

/// One side of a two-class comparison, e.g. "yes" answers to SSVEP trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrialClass {
    pub response: Response,
    pub trial_type: TrialType,
}

impl TrialClass {
    pub fn new(response: Response, trial_type: TrialType) -> Self {
        Self { response, trial_type }
    }

    /// Pattern selecting this class's annotations: `"<True|False>-<type>-*"`.
    pub fn pattern(&self) -> AnnotationPattern {
        AnnotationPattern::new(format!("{}-{}-*", self.response.as_str(), self.trial_type))
    }
}

impl fmt::Display for TrialClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.response.as_str(), self.trial_type)
    }
}

// ── Pattern matching ─────────────────────────────────────────────────────

/// Glob over annotation descriptions.
///
/// `*` matches any run of characters (including none), `?` exactly one.
/// Everything else is literal and the whole description must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationPattern(String);

impl AnnotationPattern {
    pub fn new(glob: impl Into<String>) -> Self {
        Self(glob.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, description: &str) -> bool {
        let p: Vec<char> = self.0.chars().collect();
        let s: Vec<char> = description.chars().collect();
        glob_match(&p, &s)
    }
}

impl fmt::Display for AnnotationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnnotationPattern {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Iterative wildcard match with single-star backtracking.
fn glob_match(p: &[char], s: &[char]) -> bool {
    let (mut pi, mut si) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while si < s.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == s[si]) {
            pi += 1;
            si += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, si));
            pi += 1;
        } else if let Some((sp, ss)) = star {
            // Let the last star absorb one more character.
            pi = sp + 1;
            si = ss + 1;
            star = Some((sp, ss + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Indices of `annotations` whose description matches `pattern`,
/// ordered by onset (ties keep list order).
pub fn select(annotations: &[Annotation], pattern: &AnnotationPattern) -> Vec<usize> {
    let mut idx: Vec<usize> = annotations
        .iter()
        .enumerate()
        .filter(|(_, a)| pattern.matches(&a.description))
        .map(|(i, _)| i)
        .collect();
    idx.sort_by(|&a, &b| annotations[a].onset.total_cmp(&annotations[b].onset));
    idx
}
