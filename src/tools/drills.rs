//! Drill lookup over an embedded drill library.

use serde::{Deserialize, Serialize};

/// Registry name of the drill lookup tool
pub const NAME: &str = "drill_lookup";

pub const DESCRIPTION: &str =
    "Returns targeted drills pulled from an embedded knowledge base for a given issue.";

/// Skill level assumed when the profile has none
pub const DEFAULT_SKILL_LEVEL: &str = "intermediate";

#[derive(Debug, Clone, Deserialize)]
pub struct DrillArgs {
    pub issue: String,
    #[serde(default)]
    pub skill_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drill {
    pub name: String,
    pub description: String,
    pub repetitions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillSuggestions {
    pub issue: String,
    pub skill_level: String,
    pub drills: Vec<Drill>,
}

struct LibraryEntry {
    keywords: &'static [&'static str],
    name: &'static str,
    description: &'static str,
    repetitions: &'static str,
}

impl LibraryEntry {
    fn to_drill(&self) -> Drill {
        Drill {
            name: self.name.to_string(),
            description: self.description.to_string(),
            repetitions: self.repetitions.to_string(),
        }
    }
}

const LIBRARY: &[LibraryEntry] = &[
    LibraryEntry {
        keywords: &["racket angle", "open face", "contact point"],
        name: "Open-Face Progression",
        description: "Feed multi-ball pushes focusing on keeping the racket between 45°-80°.",
        repetitions: "5 sets x 15 balls",
    },
    LibraryEntry {
        keywords: &["elbow", "alignment", "posture"],
        name: "Elbow Ladder Drill",
        description: "Shadow-swing forehands in front of a mirror keeping elbow below shoulder.",
        repetitions: "3 sets x 12 swings",
    },
    LibraryEntry {
        keywords: &["footwork", "timing", "rhythm"],
        name: "Two-Point Footwork",
        description: "FH from BH corner alternating wide/outside placements with quick recovery.",
        repetitions: "6 sets x 10 balls",
    },
];

const FALLBACK: LibraryEntry = LibraryEntry {
    keywords: &[],
    name: "Consistency Loop",
    description: "Alternate FH/BH control shots aiming for high rally count.",
    repetitions: "10 minutes continuous",
};

#[derive(Debug, Clone, Copy, Default)]
pub struct DrillLookupTool;

impl DrillLookupTool {
    /// Drills whose keywords appear in `issue` (case-insensitive), or the
    /// generic fallback when none match.
    pub fn run(&self, issue: &str, skill_level: Option<&str>) -> DrillSuggestions {
        let issue_lower = issue.to_lowercase();

        let mut drills: Vec<Drill> = LIBRARY
            .iter()
            .filter(|entry| entry.keywords.iter().any(|k| issue_lower.contains(k)))
            .map(LibraryEntry::to_drill)
            .collect();

        if drills.is_empty() {
            drills.push(FALLBACK.to_drill());
        }

        DrillSuggestions {
            issue: issue.to_string(),
            skill_level: skill_level
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_SKILL_LEVEL)
                .to_lowercase(),
            drills,
        }
    }
}
